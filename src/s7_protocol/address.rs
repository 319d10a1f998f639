use std::fmt;
use std::str::FromStr;

use super::types::{Area, MAX_BYTE_OFFSET};
use crate::errors::{Error, Result};

/// Data block used for the V memory of S7-200 CPUs
const V_AREA_DB: u16 = 1;

/// A parsed PLC address.
///
/// Built from text such as `DB1.DBX0.3`, `DB2.DBW10`, `M100.3`, `IB4`, `Q0.1`,
/// `V10.2`, `T5` or `C3`. The byte/bit part describes where the access starts;
/// how many bytes are read is decided by the typed operation using it.
///
/// ```
/// use s7link::{Address, Area};
///
/// let address: Address = "DB1.DBX40.3".parse().unwrap();
/// assert_eq!(address.area, Area::DataBlock);
/// assert_eq!((address.db_number, address.byte_offset, address.bit_offset), (1, 40, 3));
/// assert_eq!(address.to_string(), "DB1.DBX40.3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Memory area
    pub area: Area,
    /// Data block number, 0 for every other area
    pub db_number: u16,
    /// Byte offset (or timer/counter number) within the area
    pub byte_offset: u32,
    /// Bit within the byte, 0..=7
    pub bit_offset: u8,
}

impl Address {
    /// Address of a byte (bit 0) in an area
    pub fn new(area: Area, db_number: u16, byte_offset: u32, bit_offset: u8) -> Result<Self> {
        if bit_offset > 7 {
            return Err(Error::InvalidArgument(format!(
                "bit offset {bit_offset} is out of range [0..7]"
            )));
        }
        if byte_offset > MAX_BYTE_OFFSET {
            return Err(Error::InvalidArgument(format!(
                "byte offset {byte_offset} is out of range"
            )));
        }
        Ok(Self {
            area,
            db_number: if area == Area::DataBlock { db_number } else { 0 },
            byte_offset,
            bit_offset,
        })
    }

    /// Same address moved `bytes` further into the area, at bit 0
    pub(crate) fn offset_by(&self, bytes: u32) -> Result<Self> {
        Self::new(
            self.area,
            self.db_number,
            self.byte_offset.saturating_add(bytes),
            0,
        )
    }
}

/// Parse a textual address, see [`Address`] for the accepted forms
pub fn parse_address(input: &str) -> Result<Address> {
    let text = input.trim().to_ascii_uppercase();
    if text.is_empty() {
        return Err(Error::address(input, "empty address"));
    }

    if let Some(rest) = text.strip_prefix("DB") {
        return parse_db(input, rest);
    }

    let mut chars = text.chars();
    let Some(letter) = chars.next() else {
        return Err(Error::address(input, "empty address"));
    };
    let rest = chars.as_str();
    match letter {
        'I' | 'E' => parse_short_area(input, Area::Input, 0, rest),
        'Q' | 'A' => parse_short_area(input, Area::Output, 0, rest),
        'M' | 'F' => parse_short_area(input, Area::Marker, 0, rest),
        'V' => parse_short_area(input, Area::DataBlock, V_AREA_DB, rest),
        'T' => parse_element(input, Area::Timer, rest),
        'C' | 'Z' => parse_element(input, Area::Counter, rest),
        _ => Err(Error::address(input, "unrecognized area")),
    }
}

/// `DB<n>.DBX<byte>.<bit>`, `DB<n>.DBB<byte>`, `DB<n>.DBW<byte>`, `DB<n>.DBD<byte>` or `DB<n>.<byte>[.<bit>]`
fn parse_db(input: &str, rest: &str) -> Result<Address> {
    let (db, tail) = match rest.split_once('.') {
        Some(parts) => parts,
        None if rest.chars().all(|c| c.is_ascii_digit()) && !rest.is_empty() => {
            return Err(Error::address(input, "byte offset missing"))
        }
        None => (rest, ""),
    };
    if db.is_empty() {
        return Err(Error::address(input, "data block number missing"));
    }
    let db_number = db
        .parse::<u16>()
        .map_err(|_| Error::address(input, "data block number is not numeric"))?;
    let tail = tail.strip_prefix("DB").unwrap_or(tail);
    parse_short_area(input, Area::DataBlock, db_number, tail)
}

/// Optional size letter followed by `<byte>[.<bit>]`
fn parse_short_area(input: &str, area: Area, db_number: u16, rest: &str) -> Result<Address> {
    let (size_letter, offset) = match rest.chars().next() {
        Some(c @ ('X' | 'B' | 'W' | 'D')) => (Some(c), &rest[1..]),
        _ => (None, rest),
    };
    let (byte_offset, bit) = parse_byte_bit(input, offset)?;
    if bit.is_some() && matches!(size_letter, Some('B' | 'W' | 'D')) {
        return Err(Error::address(
            input,
            "bit offset is only allowed for bit access",
        ));
    }
    Ok(Address {
        area,
        db_number,
        byte_offset,
        bit_offset: bit.unwrap_or(0),
    })
}

/// `T<n>` / `C<n>`
fn parse_element(input: &str, area: Area, rest: &str) -> Result<Address> {
    if rest.contains('.') {
        return Err(Error::address(
            input,
            "timers and counters take no bit offset",
        ));
    }
    let (number, _) = parse_byte_bit(input, rest)?;
    Ok(Address {
        area,
        db_number: 0,
        byte_offset: number,
        bit_offset: 0,
    })
}

fn parse_byte_bit(input: &str, text: &str) -> Result<(u32, Option<u8>)> {
    let (byte_text, bit_text) = match text.split_once('.') {
        Some((byte, bit)) => (byte, Some(bit)),
        None => (text, None),
    };
    if byte_text.is_empty() || !byte_text.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::address(input, "byte offset missing or not numeric"));
    }
    let byte_offset = byte_text
        .parse::<u32>()
        .ok()
        .filter(|b| *b <= MAX_BYTE_OFFSET)
        .ok_or_else(|| Error::address(input, "byte offset out of range"))?;

    let bit = match bit_text {
        None => None,
        Some(bit) => {
            if bit.is_empty() || !bit.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::address(input, "bit offset missing or not numeric"));
            }
            Some(
                bit.parse::<u8>()
                    .ok()
                    .filter(|b| *b <= 7)
                    .ok_or_else(|| Error::address(input, "bit offset out of range [0..7]"))?,
            )
        }
    };
    Ok((byte_offset, bit))
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_address(s)
    }
}

/// Canonical form, accepted again by [`parse_address`]
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.area {
            Area::DataBlock => write!(
                f,
                "DB{}.DBX{}.{}",
                self.db_number, self.byte_offset, self.bit_offset
            ),
            Area::Input => write!(f, "I{}.{}", self.byte_offset, self.bit_offset),
            Area::Output => write!(f, "Q{}.{}", self.byte_offset, self.bit_offset),
            Area::Marker => write!(f, "M{}.{}", self.byte_offset, self.bit_offset),
            Area::Timer => write!(f, "T{}", self.byte_offset),
            Area::Counter => write!(f, "C{}", self.byte_offset),
        }
    }
}
