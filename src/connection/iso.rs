//! ISO-on-TCP envelope (RFC 1006 TPKT + ISO 8073 COTP class 0).

use bytes::{Buf, BufMut, BytesMut};

use crate::errors::{IsoError, Result};

// PDU Type constants (Code + Credit)
pub(crate) const PDU_TYPE_CR: u8 = 0xE0; // Connection request
pub(crate) const PDU_TYPE_CC: u8 = 0xD0; // Connection confirm
pub(crate) const PDU_TYPE_DR: u8 = 0x80; // Disconnect request
pub(crate) const PDU_TYPE_DT: u8 = 0xF0; // Data transfer

const PDU_EOT: u8 = 0x80; // End of Transmission Packet (This packet is complete)

// RFC0983 states that SrcRef and DstRef should be 0 and are ignored anyway,
// S7 requires a non zero source reference.
const SRC_REF: u16 = 0x0100;
const DST_REF: u16 = 0x0000;

pub(crate) const ISO_TCP_VERSION: u8 = 3; // RFC 1006

/// TPDU size parameter value for 1024 byte TPDUs
const TPDU_SIZE_1024: u8 = 0x0A;

/// TPKT Header - ISO on TCP - RFC 1006 (4 bytes)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct TpktHeader {
    /// Packet length including this header: min 7, max 65535
    pub(crate) length: u16,
}

impl TpktHeader {
    pub(crate) const LEN: usize = 4;

    pub(crate) fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u8(ISO_TCP_VERSION);
        bytes.put_u8(0);
        bytes.put_u16(self.length);
    }

    pub(crate) fn decode(raw: [u8; 4]) -> Result<Self> {
        let mut bytes = &raw[..];
        let version = bytes.get_u8();
        let _reserved = bytes.get_u8();
        let length = bytes.get_u16();
        if version != ISO_TCP_VERSION {
            return Err(IsoError::InvalidPDU.into());
        }
        if usize::from(length) < Self::LEN + CotpData::LEN {
            return Err(IsoError::ShortPacket.into());
        }
        Ok(Self { length })
    }

    /// Bytes following the header
    pub(crate) fn payload_len(&self) -> usize {
        usize::from(self.length) - Self::LEN
    }
}

/// COTP header for DATA EXCHANGE
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CotpData {
    /// EOT (bit 7) + PDU Number (bits 0..6, always 0)
    eot_num: u8,
}

impl CotpData {
    pub(crate) const LEN: usize = 3;

    pub(crate) fn last() -> Self {
        Self { eot_num: PDU_EOT }
    }

    pub(crate) fn is_last(&self) -> bool {
        self.eot_num & PDU_EOT != 0
    }

    pub(crate) fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u8((Self::LEN - 1) as u8);
        bytes.put_u8(PDU_TYPE_DT);
        bytes.put_u8(self.eot_num);
    }

    /// Decode the header at the front of a TPKT payload, advancing past it
    pub(crate) fn decode(bytes: &mut &[u8]) -> Result<Self> {
        if bytes.remaining() < 2 {
            return Err(IsoError::ShortPacket.into());
        }
        let header_length = usize::from(bytes[0]);
        match bytes[1] {
            PDU_TYPE_DT => {}
            PDU_TYPE_DR => return Err(IsoError::Disconnect.into()),
            _ => return Err(IsoError::InvalidPDU.into()),
        }
        if header_length + 1 < Self::LEN || bytes.remaining() < header_length + 1 {
            return Err(IsoError::ShortPacket.into());
        }
        let eot_num = bytes[2];
        bytes.advance(header_length + 1);
        Ok(Self { eot_num })
    }
}

/// TPKT + COTP DT envelope around one S7 PDU
pub(crate) fn wrap_data(payload: &[u8]) -> Result<BytesMut> {
    let length = TpktHeader::LEN + CotpData::LEN + payload.len();
    let length = u16::try_from(length).map_err(|_| IsoError::InvalidPDU)?;
    let mut bytes = BytesMut::with_capacity(usize::from(length));
    TpktHeader { length }.encode(&mut bytes);
    CotpData::last().encode(&mut bytes);
    bytes.put_slice(payload);
    Ok(bytes)
}

/// TPKT + COTP connection request carrying both TSAPs and the TPDU size
pub(crate) fn connection_request(local_tsap: u16, remote_tsap: u16) -> BytesMut {
    // TPDU size (3) + calling TSAP (4) + called TSAP (4)
    let params_len = 11;
    // length field, type, dst ref, src ref, class/option
    let cotp_len = 7 + params_len;

    let mut bytes = BytesMut::with_capacity(TpktHeader::LEN + cotp_len);
    TpktHeader {
        length: (TpktHeader::LEN + cotp_len) as u16,
    }
    .encode(&mut bytes);
    bytes.put_u8((cotp_len - 1) as u8);
    bytes.put_u8(PDU_TYPE_CR);
    bytes.put_u16(DST_REF);
    bytes.put_u16(SRC_REF);
    // Class + Option: RFC0983 asks for 0x40, S7 equipment needs 0
    bytes.put_u8(0x00);
    bytes.put_u8(0xC0);
    bytes.put_u8(1);
    bytes.put_u8(TPDU_SIZE_1024);
    bytes.put_u8(0xC1);
    bytes.put_u8(2);
    bytes.put_u16(local_tsap);
    bytes.put_u8(0xC2);
    bytes.put_u8(2);
    bytes.put_u16(remote_tsap);
    bytes
}

/// Check the TPKT payload answering a connection request
pub(crate) fn check_connection_confirm(payload: &[u8]) -> Result<()> {
    if payload.len() < 7 {
        return Err(IsoError::ShortPacket.into());
    }
    match payload[1] {
        PDU_TYPE_CC => Ok(()),
        PDU_TYPE_DR => Err(IsoError::Connect.into()),
        _ => Err(IsoError::InvalidPDU.into()),
    }
}

/// TPKT + COTP disconnect request with reason "normal disconnect"
pub(crate) fn disconnect_request() -> BytesMut {
    let cotp_len = 7;
    let mut bytes = BytesMut::with_capacity(TpktHeader::LEN + cotp_len);
    TpktHeader {
        length: (TpktHeader::LEN + cotp_len) as u16,
    }
    .encode(&mut bytes);
    bytes.put_u8((cotp_len - 1) as u8);
    bytes.put_u8(PDU_TYPE_DR);
    bytes.put_u16(DST_REF);
    bytes.put_u16(SRC_REF);
    bytes.put_u8(0x80);
    bytes
}
