//! PLC control jobs (PI services).
//!
//! Each job is a fixed parameter block without data; the PLC answers with an
//! acknowledgment whose header error class/code tells whether it was accepted.

use bytes::{BufMut, BytesMut};

use super::header::S7ProtocolHeader;
use super::types::{PI_SERVICE, PLC_STOP};
use crate::errors::{Error, Result};

const P_PROGRAM: &[u8] = b"P_PROGRAM";

/// Block types accepted by the insert service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// Organization block
    OB,
    /// Data block
    DB,
    /// System data block
    SDB,
    /// Function
    FC,
    /// System function
    SFC,
    /// Function block
    FB,
    /// System function block
    SFB,
}

impl BlockType {
    fn code(self) -> &'static [u8; 2] {
        match self {
            Self::OB => b"08",
            Self::DB => b"0A",
            Self::SDB => b"0B",
            Self::FC => b"0C",
            Self::SFC => b"0D",
            Self::FB => b"0E",
            Self::SFB => b"0F",
        }
    }
}

/// Destination file system of an inserted block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileSystem {
    /// Passive file system
    #[default]
    P,
    /// Active file system
    A,
    /// Active embedded file system
    B,
}

impl FileSystem {
    fn code(self) -> u8 {
        match self {
            Self::P => b'P',
            Self::A => b'A',
            Self::B => b'B',
        }
    }
}

/// `PI_SERVICE` block: function, 5 reserved, parameter block, service name
fn pi_service(parameter: &[u8], service: &[u8]) -> BytesMut {
    let mut params = BytesMut::with_capacity(10 + parameter.len() + service.len());
    params.put_u8(PI_SERVICE);
    params.put_bytes(0, 6);
    params.put_u8(0xFD);
    params.put_u16(parameter.len() as u16);
    params.put_slice(parameter);
    params.put_u8(service.len() as u8);
    params.put_slice(service);
    params
}

fn job(pdu_reference: u16, params: &[u8]) -> Result<BytesMut> {
    let header = S7ProtocolHeader::build_request(pdu_reference, params.len(), 0)?;
    let mut bytes = BytesMut::with_capacity(header.encoded_len() + params.len());
    header.encode(&mut bytes);
    bytes.put_slice(params);
    Ok(bytes)
}

/// Warm restart of the CPU program
pub fn encode_hot_restart(pdu_reference: u16) -> Result<BytesMut> {
    job(pdu_reference, &pi_service(&[], P_PROGRAM))
}

/// Cold restart, resetting retentive data
pub fn encode_cold_restart(pdu_reference: u16) -> Result<BytesMut> {
    job(pdu_reference, &pi_service(b"C ", P_PROGRAM))
}

/// Switch the CPU to STOP
pub fn encode_stop(pdu_reference: u16) -> Result<BytesMut> {
    let mut params = BytesMut::with_capacity(7 + P_PROGRAM.len());
    params.put_u8(PLC_STOP);
    params.put_bytes(0, 5);
    params.put_u8(P_PROGRAM.len() as u8);
    params.put_slice(P_PROGRAM);
    job(pdu_reference, &params)
}

/// Copy the work memory to the load memory
pub fn encode_copy_ram_to_rom(pdu_reference: u16) -> Result<BytesMut> {
    job(pdu_reference, &pi_service(b"EP", b"_MODU"))
}

/// Compress the PLC memory
pub fn encode_compress(pdu_reference: u16) -> Result<BytesMut> {
    job(pdu_reference, &pi_service(&[], b"_GARB"))
}

/// Insert (activate) a block previously downloaded to the PLC.
///
/// # Errors
///
/// [`Error::InvalidArgument`] if `number` has more than 5 digits.
pub fn encode_insert_file(
    pdu_reference: u16,
    block_type: BlockType,
    number: u32,
    file_system: FileSystem,
) -> Result<BytesMut> {
    if number > 99_999 {
        return Err(Error::InvalidArgument(format!(
            "block number {number} is out of range [0..99999]"
        )));
    }
    let mut parameter = BytesMut::with_capacity(10);
    parameter.put_u8(0x01);
    parameter.put_u8(0x00);
    parameter.put_slice(block_type.code());
    parameter.put_slice(format!("{number:05}").as_bytes());
    parameter.put_u8(file_system.code());
    job(pdu_reference, &pi_service(&parameter, b"_INSE"))
}

/// Accept any acknowledgment for `pdu_reference` without an error class
pub fn validate_control_ack(bytes: &[u8], pdu_reference: u16) -> Result<S7ProtocolHeader> {
    let mut body = bytes;
    let header = S7ProtocolHeader::decode(&mut body)?;
    header
        .is_ack()?
        .is_current_pdu_response(pdu_reference)?
        .has_no_error()?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(bytes: &BytesMut) -> &[u8] {
        &bytes[10..]
    }

    #[test]
    fn stop_layout() {
        let bytes = encode_stop(3).unwrap();
        assert_eq!(&bytes[6..8], &[0x00, 0x10]);
        assert_eq!(params(&bytes)[..7], [0x29, 0, 0, 0, 0, 0, 0x09]);
        assert_eq!(&params(&bytes)[7..], b"P_PROGRAM");
    }

    #[test]
    fn restart_layouts() {
        let hot = encode_hot_restart(1).unwrap();
        assert_eq!(
            params(&hot),
            b"\x28\x00\x00\x00\x00\x00\x00\xFD\x00\x00\x09P_PROGRAM"
        );
        let cold = encode_cold_restart(1).unwrap();
        assert_eq!(
            params(&cold),
            b"\x28\x00\x00\x00\x00\x00\x00\xFD\x00\x02C \x09P_PROGRAM"
        );
        let copy = encode_copy_ram_to_rom(1).unwrap();
        assert_eq!(
            params(&copy),
            b"\x28\x00\x00\x00\x00\x00\x00\xFD\x00\x02EP\x05_MODU"
        );
        let compress = encode_compress(1).unwrap();
        assert_eq!(
            params(&compress),
            b"\x28\x00\x00\x00\x00\x00\x00\xFD\x00\x00\x05_GARB"
        );
    }

    #[test]
    fn insert_layout() {
        let bytes = encode_insert_file(1, BlockType::DB, 12, FileSystem::P).unwrap();
        assert_eq!(
            params(&bytes),
            b"\x28\x00\x00\x00\x00\x00\x00\xFD\x00\x0A\x01\x000A00012P\x05_INSE"
        );
        assert!(encode_insert_file(1, BlockType::OB, 100_000, FileSystem::A).is_err());
    }

    #[test]
    fn acknowledgments() {
        let ok: &[u8] = &[0x32, 0x03, 0, 0, 0x00, 0x04, 0, 0x01, 0, 0, 0, 0, 0x28];
        assert!(validate_control_ack(ok, 4).is_ok());
        assert!(matches!(
            validate_control_ack(ok, 5),
            Err(Error::Framing(_))
        ));
        let refused: &[u8] = &[0x32, 0x02, 0, 0, 0x00, 0x04, 0, 0, 0, 0, 0xD2, 0x01];
        assert!(matches!(
            validate_control_ack(refused, 4),
            Err(Error::Protocol(_))
        ));
        let job: &[u8] = &[0x32, 0x01, 0, 0, 0x00, 0x04, 0, 0, 0, 0];
        assert!(validate_control_ack(job, 4).is_err());
    }
}
