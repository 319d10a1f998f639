use bytes::{Buf, BufMut, BytesMut};

use super::header::{split_blocks, S7ProtocolHeader};
use super::types::{MessageType, ACK_HEADER_LEN, SETUP_COMMUNICATION};
use crate::errors::{Error, Result};

/// Size of the setup communication parameter block
pub(crate) const SETUP_PARAM_LEN: usize = 8;

/// Parameters exchanged by the setup communication job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupParams {
    /// Parallel jobs the client may have outstanding
    pub max_amq_caller: u16,
    /// Parallel jobs the PLC accepts
    pub max_amq_callee: u16,
    /// Largest PDU either side will send
    pub pdu_length: u16,
}

impl SetupParams {
    /// Proposal with a single outstanding job in each direction
    pub fn proposal(pdu_length: u16) -> Self {
        Self {
            max_amq_caller: 1,
            max_amq_callee: 1,
            pdu_length,
        }
    }

    fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u8(SETUP_COMMUNICATION);
        bytes.put_u8(0);
        bytes.put_u16(self.max_amq_caller);
        bytes.put_u16(self.max_amq_callee);
        bytes.put_u16(self.pdu_length);
    }
}

/// Setup communication job proposing `proposal`
pub fn encode_setup(pdu_reference: u16, proposal: &SetupParams) -> Result<BytesMut> {
    let header = S7ProtocolHeader::build_request(pdu_reference, SETUP_PARAM_LEN, 0)?;
    let mut bytes = BytesMut::with_capacity(header.encoded_len() + SETUP_PARAM_LEN);
    header.encode(&mut bytes);
    proposal.encode(&mut bytes);
    Ok(bytes)
}

/// Negotiated parameters from the PLC's answer to a setup communication job.
///
/// # Errors
///
/// Fails with [`Error::Negotiation`] when the frame is short, is not an
/// acknowledgment with data, carries an error class or proposes a zero PDU length.
pub fn decode_setup_response(bytes: &[u8]) -> Result<SetupParams> {
    if bytes.len() < ACK_HEADER_LEN + SETUP_PARAM_LEN {
        return Err(Error::Negotiation(format!(
            "setup response needs {} bytes, got {}",
            ACK_HEADER_LEN + SETUP_PARAM_LEN,
            bytes.len()
        )));
    }
    let mut body = bytes;
    let header = S7ProtocolHeader::decode(&mut body).map_err(negotiation)?;
    if header.message_type != MessageType::AckData {
        return Err(Error::Negotiation(format!(
            "expected an ack with data, got {:?}",
            header.message_type
        )));
    }
    header.has_no_error().map_err(negotiation)?;
    let (mut parameters, _) = split_blocks(&header, body).map_err(negotiation)?;
    if parameters.remaining() < SETUP_PARAM_LEN {
        return Err(Error::Negotiation("setup parameters truncated".to_string()));
    }
    let function_code = parameters.get_u8();
    if function_code != SETUP_COMMUNICATION {
        return Err(Error::Negotiation(format!(
            "unexpected function 0x{function_code:02X} in setup response"
        )));
    }
    let _reserved = parameters.get_u8();
    let params = SetupParams {
        max_amq_caller: parameters.get_u16(),
        max_amq_callee: parameters.get_u16(),
        pdu_length: parameters.get_u16(),
    };
    if params.pdu_length == 0 {
        return Err(Error::Negotiation("PLC negotiated a zero PDU length".to_string()));
    }
    Ok(params)
}

fn negotiation(e: Error) -> Error {
    Error::Negotiation(e.to_string())
}
