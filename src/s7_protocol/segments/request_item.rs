use std::convert::TryFrom;

use bytes::{Buf, BufMut, BytesMut};

use super::nck_item::NckItem;
use crate::{
    errors::{Error, Result},
    s7_protocol::{
        address::Address,
        types::{Area, VariableType, MAX_BYTE_OFFSET, SPEC_TYPE_READ_WRITE, SYNTAX_ID_ANY_TYPE},
    },
};

/// Request item using any-type addressing.
///
/// Wire layout (12 bytes):
/// specification type (0x12), length of the following bytes (10), syntax id (0x10),
/// variable type, count (2), db number (2), area, 3-byte packed address.
///
/// The packed address holds `byte * 8 + bit`; only timers and counters carry
/// their element number unshifted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StandardItem {
    /// Where the access starts
    pub address: Address,
    /// Type of each element
    pub variable_type: VariableType,
    /// Number of consecutive elements, > 0
    pub count: u16,
}

impl StandardItem {
    pub(crate) const LEN: usize = 12;

    /// Build an item, validating count and bit offset
    pub fn new(address: Address, variable_type: VariableType, count: u16) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidArgument("count must be > 0".to_string()));
        }
        if address.bit_offset > 7 {
            return Err(Error::InvalidArgument(
                "bit offset is out of range [0..7]".to_string(),
            ));
        }
        Ok(Self {
            address,
            variable_type,
            count,
        })
    }

    /// Single bit at `address`
    pub fn bit(address: Address) -> Self {
        Self {
            address,
            variable_type: VariableType::Bit,
            count: 1,
        }
    }

    /// `count` bytes starting at `address` (bit offset is ignored).
    ///
    /// Timer and counter areas are read as whole 2-byte elements.
    pub fn bytes(address: Address, count: u16) -> Result<Self> {
        let address = Address {
            bit_offset: 0,
            ..address
        };
        match address.area {
            Area::Timer => Self::new(address, VariableType::Timer, count.div_ceil(2)),
            Area::Counter => Self::new(address, VariableType::Counter, count.div_ceil(2)),
            _ => Self::new(address, VariableType::Byte, count),
        }
    }

    /// Number of payload bytes the PLC returns for this item
    pub fn data_len(&self) -> usize {
        usize::from(self.count) * self.variable_type.byte_size()
    }

    fn packed_address(&self) -> u32 {
        if self.variable_type.is_element_addressed() {
            self.address.byte_offset
        } else {
            (self.address.byte_offset << 3) | u32::from(self.address.bit_offset & 0x07)
        }
    }

    /// Append the 12-byte encoding
    pub fn encode(&self, bytes: &mut BytesMut) {
        let address = self.packed_address();
        bytes.put_u8(SPEC_TYPE_READ_WRITE);
        bytes.put_u8((Self::LEN - 2) as u8);
        bytes.put_u8(SYNTAX_ID_ANY_TYPE);
        bytes.put_u8(self.variable_type as u8);
        bytes.put_u16(self.count);
        bytes.put_u16(self.address.db_number);
        bytes.put_u8(self.address.area as u8);
        bytes.put_u8(((address >> 16) & 0xFF) as u8);
        bytes.put_u8(((address >> 8) & 0xFF) as u8);
        bytes.put_u8((address & 0xFF) as u8);
    }

    /// Decode a 12-byte encoding from the front of `bytes`
    pub fn decode(bytes: &mut &[u8]) -> Result<Self> {
        if bytes.remaining() < Self::LEN {
            return Err(Error::framing("request item truncated"));
        }
        let specification_type = bytes.get_u8();
        let length = bytes.get_u8();
        let syntax_id = bytes.get_u8();
        if specification_type != SPEC_TYPE_READ_WRITE
            || usize::from(length) != Self::LEN - 2
            || syntax_id != SYNTAX_ID_ANY_TYPE
        {
            return Err(Error::framing("not an any-type request item"));
        }
        let variable_type = VariableType::try_from(bytes.get_u8())?;
        let count = bytes.get_u16();
        let db_number = bytes.get_u16();
        let area = Area::try_from(bytes.get_u8())?;
        let packed = (u32::from(bytes.get_u8()) << 16)
            | (u32::from(bytes.get_u8()) << 8)
            | u32::from(bytes.get_u8());
        let (byte_offset, bit_offset) = if variable_type.is_element_addressed() {
            (packed, 0)
        } else {
            ((packed >> 3) & MAX_BYTE_OFFSET, (packed & 0x07) as u8)
        };

        Ok(Self {
            address: Address {
                area,
                db_number,
                byte_offset,
                bit_offset,
            },
            variable_type,
            count,
        })
    }
}

/// One addressed unit of a (possibly multi-item) read or write request
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RequestItem {
    /// Any-type addressing of the CPU memory areas
    Standard(StandardItem),
    /// NCK addressing of SINUMERIK controllers
    Nck(NckItem),
}

impl RequestItem {
    /// Size of the item inside the parameter block
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Standard(_) => StandardItem::LEN,
            Self::Nck(_) => NckItem::LEN,
        }
    }

    /// Payload bytes expected in the response, when known up front
    pub fn expected_data_len(&self) -> Option<usize> {
        match self {
            Self::Standard(item) => Some(item.data_len()),
            Self::Nck(_) => None,
        }
    }

    /// Append the encoding of this item
    pub fn encode(&self, bytes: &mut BytesMut) {
        match self {
            Self::Standard(item) => item.encode(bytes),
            Self::Nck(item) => item.encode(bytes),
        }
    }
}

impl From<StandardItem> for RequestItem {
    fn from(item: StandardItem) -> Self {
        Self::Standard(item)
    }
}

impl From<NckItem> for RequestItem {
    fn from(item: NckItem) -> Self {
        Self::Nck(item)
    }
}
