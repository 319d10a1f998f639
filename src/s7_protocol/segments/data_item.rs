use bytes::{Buf, BufMut, BytesMut};

use crate::{
    errors::{Error, Result, ReturnCode},
    s7_protocol::types::{DataVariableType, DATA_ITEM_HEADER_LEN},
};

/// One entry of the data block.
///
/// In responses it carries the item's return code and, on success, the payload.
/// In write requests the return code is always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    /// Status of the item (0xFF signals success in responses)
    pub return_code: ReturnCode,
    /// Transport size, decides the unit of the length field
    pub variable_type: DataVariableType,
    /// Payload bytes
    pub data: Vec<u8>,
}

impl DataItem {
    /// Payload of a write request for a byte oriented item
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            return_code: ReturnCode::Other(0),
            variable_type: DataVariableType::Byte,
            data: data.into(),
        }
    }

    /// Payload of a write request for a single bit
    pub fn from_bit(value: bool) -> Self {
        Self {
            return_code: ReturnCode::Other(0),
            variable_type: DataVariableType::Bit,
            data: vec![u8::from(value)],
        }
    }

    /// Payload with an explicit transport size
    pub fn with_type(variable_type: DataVariableType, data: impl Into<Vec<u8>>) -> Self {
        Self {
            return_code: ReturnCode::Other(0),
            variable_type,
            data: data.into(),
        }
    }

    /// Whether the PLC reported success for this item
    pub fn is_success(&self) -> bool {
        self.return_code.is_success()
    }

    /// Payload of a successful item, `None` otherwise
    pub fn payload(&self) -> Option<&[u8]> {
        self.is_success().then_some(self.data.as_slice())
    }

    /// Size of the item on the wire, without the alignment byte
    pub fn encoded_len(&self) -> usize {
        DATA_ITEM_HEADER_LEN + self.data.len()
    }

    /// Append the item; a fill byte follows an odd payload unless this is the last item
    pub fn encode(&self, bytes: &mut BytesMut, last: bool) {
        let length = self.variable_type.length_field(self.data.len());
        bytes.put_u8(self.return_code.code());
        bytes.put_u8(self.variable_type as u8);
        bytes.put_u16(length as u16);
        bytes.put_slice(&self.data);
        if !last && self.data.len() % 2 == 1 {
            bytes.put_u8(0);
        }
    }

    /// Decode one item from the front of `bytes`, consuming its fill byte when present
    pub fn decode(bytes: &mut &[u8]) -> Result<Self> {
        if bytes.remaining() < DATA_ITEM_HEADER_LEN {
            return Err(Error::framing(format!(
                "data item header needs {DATA_ITEM_HEADER_LEN} bytes, got {}",
                bytes.remaining()
            )));
        }
        let return_code = ReturnCode::from(bytes.get_u8());
        let variable_type = DataVariableType::from(bytes.get_u8());
        let length = bytes.get_u16();
        let payload_len = variable_type.payload_len(length);
        if bytes.remaining() < payload_len {
            return Err(Error::framing(format!(
                "data item declares {payload_len} bytes, only {} available",
                bytes.remaining()
            )));
        }
        let data = bytes[..payload_len].to_vec();
        bytes.advance(payload_len);
        if payload_len % 2 == 1 && bytes.has_remaining() {
            bytes.advance(1);
        }

        Ok(Self {
            return_code,
            variable_type,
            data,
        })
    }
}
