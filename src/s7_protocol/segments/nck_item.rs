use std::convert::TryFrom;

use bytes::{Buf, BufMut, BytesMut};

use crate::{
    errors::{Error, Result},
    s7_protocol::types::{SPEC_TYPE_READ_WRITE, SYNTAX_ID_NCK},
};

/// NCK data areas
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NckArea {
    /// NCK wide data
    Nck = 0,
    /// Mode group
    ModeGroup = 1,
    /// Channel
    Channel = 2,
    /// Axis
    Axis = 3,
    /// Tool
    Tool = 4,
    /// Feed drive
    FeedDrive = 5,
    /// Main drive
    MainDrive = 6,
    /// MMC
    Mmc = 7,
}

impl TryFrom<u8> for NckArea {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => Self::Nck,
            1 => Self::ModeGroup,
            2 => Self::Channel,
            3 => Self::Axis,
            4 => Self::Tool,
            5 => Self::FeedDrive,
            6 => Self::MainDrive,
            7 => Self::Mmc,
            other => return Err(Error::framing(format!("unknown NCK area {other}"))),
        })
    }
}

/// NCK data modules (blocks)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NckModule {
    /// Global system data
    Y = 0x10,
    /// NCU global settable frames
    Fu = 0x12,
    /// Tool offset data
    To = 0x14,
    /// Global state data
    Se = 0x16,
    /// Machine data
    M = 0x1A,
    /// State data: geometry axes in tool offset memory (extended)
    Sega = 0x70,
    /// State data: machine axes (extended)
    Sema = 0x71,
    /// State data: spindle
    Ssp = 0x72,
    /// State data: geometry axes in tool offset memory
    Sga = 0x73,
    /// State data: machine axes
    Sma = 0x74,
    /// Alarm list sorted by time
    Salal = 0x75,
    /// Alarm list sorted by priority
    Salap = 0x76,
    /// Alarms
    Sala = 0x77,
    /// Synchronous actions
    Ssynac = 0x78,
    /// Program pointer on interruption (function)
    Sparpf = 0x79,
    /// Program pointer in automatic operation
    Sparpp = 0x7A,
    /// Active G functions
    Sncf = 0x7B,
    /// Part program information
    Sparp = 0x7D,
    /// Part program specific state data
    Sinf = 0x7E,
    /// State data
    S = 0x7F,
}

impl TryFrom<u8> for NckModule {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0x10 => Self::Y,
            0x12 => Self::Fu,
            0x14 => Self::To,
            0x16 => Self::Se,
            0x1A => Self::M,
            0x70 => Self::Sega,
            0x71 => Self::Sema,
            0x72 => Self::Ssp,
            0x73 => Self::Sga,
            0x74 => Self::Sma,
            0x75 => Self::Salal,
            0x76 => Self::Salap,
            0x77 => Self::Sala,
            0x78 => Self::Ssynac,
            0x79 => Self::Sparpf,
            0x7A => Self::Sparpp,
            0x7B => Self::Sncf,
            0x7D => Self::Sparp,
            0x7E => Self::Sinf,
            0x7F => Self::S,
            other => {
                return Err(Error::framing(format!(
                    "unknown NCK module 0x{other:02X}"
                )))
            }
        })
    }
}

/// Request item using NCK addressing.
///
/// Wire layout (10 bytes):
/// specification type (0x12), length of the following bytes (8), syntax id (0x82),
/// `area << 5 | unit`, column (2), line (2), module, line count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NckItem {
    /// Data area
    pub area: NckArea,
    /// Unit within the area (channel, axis, ...), 0..=31
    pub unit: u8,
    /// Column (parameter number)
    pub column: u16,
    /// Line (index within the parameter)
    pub line: u16,
    /// Data module
    pub module: NckModule,
    /// Number of lines to read
    pub line_count: u8,
}

impl NckItem {
    pub(crate) const LEN: usize = 10;

    /// Build an item, `unit` must fit into 5 bits
    pub fn new(
        area: NckArea,
        unit: u8,
        column: u16,
        line: u16,
        module: NckModule,
        line_count: u8,
    ) -> Result<Self> {
        if unit > 0x1F {
            return Err(Error::InvalidArgument(format!(
                "NCK unit {unit} is out of range [0..31]"
            )));
        }
        Ok(Self {
            area,
            unit,
            column,
            line,
            module,
            line_count,
        })
    }

    /// Append the 10-byte encoding
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u8(SPEC_TYPE_READ_WRITE);
        bytes.put_u8((Self::LEN - 2) as u8);
        bytes.put_u8(SYNTAX_ID_NCK);
        bytes.put_u8(((self.area as u8) << 5) | (self.unit & 0x1F));
        bytes.put_u16(self.column);
        bytes.put_u16(self.line);
        bytes.put_u8(self.module as u8);
        bytes.put_u8(self.line_count);
    }

    /// Decode a 10-byte encoding from the front of `bytes`
    pub fn decode(bytes: &mut &[u8]) -> Result<Self> {
        if bytes.remaining() < Self::LEN {
            return Err(Error::framing("NCK request item truncated"));
        }
        let specification_type = bytes.get_u8();
        let length = bytes.get_u8();
        let syntax_id = bytes.get_u8();
        if specification_type != SPEC_TYPE_READ_WRITE
            || usize::from(length) != Self::LEN - 2
            || syntax_id != SYNTAX_ID_NCK
        {
            return Err(Error::framing("not an NCK request item"));
        }
        let area_unit = bytes.get_u8();
        Ok(Self {
            area: NckArea::try_from(area_unit >> 5)?,
            unit: area_unit & 0x1F,
            column: bytes.get_u16(),
            line: bytes.get_u16(),
            module: NckModule::try_from(bytes.get_u8())?,
            line_count: bytes.get_u8(),
        })
    }
}
