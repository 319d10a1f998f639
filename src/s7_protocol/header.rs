use std::convert::TryFrom;

use bytes::{Buf, BufMut, BytesMut};

use super::types::{MessageType, ACK_HEADER_LEN, JOB_HEADER_LEN, PROTOCOL_ID};
use crate::errors::{Error, Result, S7ProtocolError};

/// S7 protocol header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S7ProtocolHeader {
    /// Message kind
    pub message_type: MessageType,
    /// Reference chosen by the client, echoed by the PLC
    pub pdu_reference: u16,
    /// Length of the parameter block
    pub parameter_length: u16,
    /// Length of the data block
    pub data_length: u16,
    /// Error class (acknowledgments only)
    pub error_class: Option<u8>,
    /// Error code (acknowledgments only)
    pub error_code: Option<u8>,
}

impl S7ProtocolHeader {
    pub(crate) fn build_request(
        pdu_reference: u16,
        parameter_length: usize,
        data_length: usize,
    ) -> Result<Self> {
        Ok(Self {
            message_type: MessageType::Job,
            pdu_reference,
            parameter_length: u16::try_from(parameter_length)
                .map_err(|_| Error::InvalidArgument("parameter block too large".to_string()))?,
            data_length: u16::try_from(data_length)
                .map_err(|_| Error::InvalidArgument("data block too large".to_string()))?,
            error_class: None,
            error_code: None,
        })
    }

    /// Encoded size of this header
    pub fn encoded_len(&self) -> usize {
        if self.message_type.has_error_fields() {
            ACK_HEADER_LEN
        } else {
            JOB_HEADER_LEN
        }
    }

    /// Decode a header from the front of `bytes`, advancing past it
    pub fn decode(bytes: &mut &[u8]) -> Result<Self> {
        if bytes.remaining() < JOB_HEADER_LEN {
            return Err(Error::framing(format!(
                "S7 header needs {JOB_HEADER_LEN} bytes, got {}",
                bytes.remaining()
            )));
        }
        let protocol_id = bytes.get_u8();
        if protocol_id != PROTOCOL_ID {
            return Err(Error::framing(format!(
                "unexpected protocol id 0x{protocol_id:02X}"
            )));
        }
        let message_type = MessageType::try_from(bytes.get_u8())?;
        let _reserved = bytes.get_u16();
        let pdu_reference = bytes.get_u16();
        let parameter_length = bytes.get_u16();
        let data_length = bytes.get_u16();
        let (error_class, error_code) = if message_type.has_error_fields() {
            if bytes.remaining() < 2 {
                return Err(Error::framing("acknowledgment header truncated"));
            }
            (Some(bytes.get_u8()), Some(bytes.get_u8()))
        } else {
            (None, None)
        };

        Ok(Self {
            message_type,
            pdu_reference,
            parameter_length,
            data_length,
            error_class,
            error_code,
        })
    }

    /// Append the encoded header to `bytes`
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u8(PROTOCOL_ID);
        bytes.put_u8(self.message_type as u8);
        bytes.put_u16(0);
        bytes.put_u16(self.pdu_reference);
        bytes.put_u16(self.parameter_length);
        bytes.put_u16(self.data_length);
        if self.message_type.has_error_fields() {
            bytes.put_u8(self.error_class.unwrap_or(0));
            bytes.put_u8(self.error_code.unwrap_or(0));
        }
    }

    pub(crate) fn is_ack_with_data(&self) -> Result<&Self> {
        if self.message_type != MessageType::AckData {
            return Err(Error::framing(format!(
                "expected an ack with data, got {:?}",
                self.message_type
            )));
        }
        Ok(self)
    }

    pub(crate) fn is_ack(&self) -> Result<&Self> {
        if !self.message_type.has_error_fields() {
            return Err(Error::framing(format!(
                "expected an acknowledgment, got {:?}",
                self.message_type
            )));
        }
        Ok(self)
    }

    pub(crate) fn is_current_pdu_response(&self, pdu_reference: u16) -> Result<&Self> {
        if self.pdu_reference != pdu_reference {
            return Err(Error::framing(format!(
                "response belongs to PDU {} instead of {pdu_reference}",
                self.pdu_reference
            )));
        }
        Ok(self)
    }

    /// Fails with [`Error::Protocol`] when the PLC reported an error class or code
    pub(crate) fn has_no_error(&self) -> Result<&Self> {
        let class = self.error_class.unwrap_or(0);
        let code = self.error_code.unwrap_or(0);
        if class != 0 || code != 0 {
            return Err(Error::Protocol(S7ProtocolError::from_codes(class, code)));
        }
        Ok(self)
    }
}

/// Split the parameter and data blocks declared by `header` off the remaining bytes
pub(crate) fn split_blocks<'a>(
    header: &S7ProtocolHeader,
    body: &'a [u8],
) -> Result<(&'a [u8], &'a [u8])> {
    let parameter_length = usize::from(header.parameter_length);
    let data_length = usize::from(header.data_length);
    if body.len() < parameter_length + data_length {
        return Err(Error::framing(format!(
            "header declares {} parameter and {} data bytes, only {} available",
            parameter_length,
            data_length,
            body.len()
        )));
    }
    let (parameters, rest) = body.split_at(parameter_length);
    Ok((parameters, &rest[..data_length]))
}
