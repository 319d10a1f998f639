use std::convert::TryFrom;

use crate::errors::Error;

/// Protocol id at the start of every S7 PDU
pub(crate) const PROTOCOL_ID: u8 = 0x32;

pub(crate) const READ_OPERATION: u8 = 0x04;
pub(crate) const WRITE_OPERATION: u8 = 0x05;
pub(crate) const SETUP_COMMUNICATION: u8 = 0xF0;
pub(crate) const PI_SERVICE: u8 = 0x28;
pub(crate) const PLC_STOP: u8 = 0x29;

pub(crate) const SPEC_TYPE_READ_WRITE: u8 = 0x12;
pub(crate) const SYNTAX_ID_ANY_TYPE: u8 = 0x10;
pub(crate) const SYNTAX_ID_NCK: u8 = 0x82;

/// Header length of a job (no error class/code)
pub(crate) const JOB_HEADER_LEN: usize = 10;
/// Header length of an ack / ack-with-data (with error class/code)
pub(crate) const ACK_HEADER_LEN: usize = 12;
/// Function code + item count
pub(crate) const READ_WRITE_PARAM_LEN: usize = 2;
/// Return code, transport size, length
pub(crate) const DATA_ITEM_HEADER_LEN: usize = 4;

/// Largest byte offset the packed 3-byte address can carry
pub const MAX_BYTE_OFFSET: u32 = (1 << 21) - 1;

/// Memory areas of an S7 CPU
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Area {
    /// Process image of the inputs (I / E)
    Input = 0x81,
    /// Process image of the outputs (Q / A)
    Output = 0x82,
    /// Merkers are address registers within the CPU (M).
    /// The number of available flag bytes depends on the respective CPU.
    Marker = 0x83,
    /// Data blocks, addressed with an explicit block number
    DataBlock = 0x84,
    /// S7 counters
    Counter = 0x1C,
    /// S7 timers
    Timer = 0x1D,
}

impl TryFrom<u8> for Area {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x81 => Ok(Self::Input),
            0x82 => Ok(Self::Output),
            0x83 => Ok(Self::Marker),
            0x84 => Ok(Self::DataBlock),
            0x1C => Ok(Self::Counter),
            0x1D => Ok(Self::Timer),
            other => Err(Error::framing(format!("unknown area code 0x{other:02X}"))),
        }
    }
}

/// Variable type of a request item (parameter block)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VariableType {
    /// Bit (inside a byte)
    Bit = 0x01,
    /// Byte (8 bit)
    Byte = 0x02,
    /// Character
    Char = 0x03,
    /// Word (16 bit)
    Word = 0x04,
    /// Signed 16 bit integer
    Int = 0x05,
    /// Double word (32 bit)
    DWord = 0x06,
    /// Signed 32 bit integer
    DInt = 0x07,
    /// Real (32 bit float)
    Real = 0x08,
    /// IEC date
    Date = 0x09,
    /// IEC time of day
    TimeOfDay = 0x0A,
    /// IEC time
    Time = 0x0B,
    /// S5 time
    S5Time = 0x0C,
    /// Date and time (8 byte BCD)
    DateAndTime = 0x0F,
    /// Counter (16 bit)
    Counter = 0x1C,
    /// Timer (16 bit)
    Timer = 0x1D,
}

impl VariableType {
    /// Number of payload bytes per element
    pub fn byte_size(self) -> usize {
        match self {
            Self::Bit | Self::Byte | Self::Char => 1,
            Self::Word
            | Self::Int
            | Self::Date
            | Self::S5Time
            | Self::Counter
            | Self::Timer => 2,
            Self::DWord | Self::DInt | Self::Real | Self::TimeOfDay | Self::Time => 4,
            Self::DateAndTime => 8,
        }
    }

    /// Timers and counters are addressed by element number instead of a bit offset
    pub(crate) fn is_element_addressed(self) -> bool {
        matches!(self, Self::Counter | Self::Timer)
    }
}

impl TryFrom<u8> for VariableType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0x01 => Self::Bit,
            0x02 => Self::Byte,
            0x03 => Self::Char,
            0x04 => Self::Word,
            0x05 => Self::Int,
            0x06 => Self::DWord,
            0x07 => Self::DInt,
            0x08 => Self::Real,
            0x09 => Self::Date,
            0x0A => Self::TimeOfDay,
            0x0B => Self::Time,
            0x0C => Self::S5Time,
            0x0F => Self::DateAndTime,
            0x1C => Self::Counter,
            0x1D => Self::Timer,
            other => {
                return Err(Error::framing(format!(
                    "unknown variable type 0x{other:02X}"
                )))
            }
        })
    }
}

/// Transport size of a data item (data block)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DataVariableType {
    /// No data follows (used by failed items)
    Null = 0x00,
    /// Bit access, length in bits
    Bit = 0x03,
    /// Byte/Word/DWord access, length in bits
    Byte = 0x04,
    /// Integer access, length in bits
    Integer = 0x05,
    /// Real access, length in bytes
    Real = 0x07,
    /// Octet string, length in bytes
    OctetString = 0x09,
}

impl From<u8> for DataVariableType {
    fn from(val: u8) -> Self {
        match val {
            0x03 => Self::Bit,
            0x04 => Self::Byte,
            0x05 => Self::Integer,
            0x07 => Self::Real,
            0x09 => Self::OctetString,
            _ => Self::Null,
        }
    }
}

impl DataVariableType {
    /// Number of payload bytes described by the length field of a data item
    pub(crate) fn payload_len(self, length: u16) -> usize {
        let length = usize::from(length);
        match self {
            Self::Null => 0,
            Self::Bit => (length + 7) / 8,
            Self::Byte | Self::Integer => length / 8,
            Self::Real | Self::OctetString => length,
        }
    }

    /// Value of the length field for `payload_len` payload bytes
    pub(crate) fn length_field(self, payload_len: usize) -> usize {
        match self {
            Self::Null => 0,
            Self::Bit => payload_len.min(1),
            Self::Byte | Self::Integer => payload_len * 8,
            Self::Real | Self::OctetString => payload_len,
        }
    }
}

impl From<VariableType> for DataVariableType {
    fn from(data_type: VariableType) -> Self {
        match data_type {
            VariableType::Bit => Self::Bit,
            VariableType::Int => Self::Integer,
            VariableType::Real => Self::Real,
            VariableType::Counter | VariableType::Timer => Self::OctetString,
            _ => Self::Byte,
        }
    }
}

/// Message kind of an S7 header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// Request from the client
    Job = 0x01,
    /// Acknowledgment without data
    Ack = 0x02,
    /// Acknowledgment carrying parameters and/or data
    AckData = 0x03,
    /// Extended user data
    UserData = 0x07,
}

impl MessageType {
    pub(crate) fn has_error_fields(self) -> bool {
        matches!(self, Self::Ack | Self::AckData)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Self::Job),
            0x02 => Ok(Self::Ack),
            0x03 => Ok(Self::AckData),
            0x07 => Ok(Self::UserData),
            other => Err(Error::framing(format!(
                "unknown message type 0x{other:02X}"
            ))),
        }
    }
}
