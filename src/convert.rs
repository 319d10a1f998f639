//! Byte order aware conversions between raw PLC payloads and Rust primitives.
//!
//! The S7 wire frame itself is always big-endian; these helpers only deal with
//! the payload bytes of a data item, whose byte order depends on the PLC family
//! (or, for NCK data, is little-endian).

use std::mem::size_of;

use bytes::{Buf, BufMut, BytesMut};
use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::errors::{Error, Result};

/// Byte order of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Most significant byte first (all S7 CPUs)
    #[default]
    Big,
    /// Least significant byte first (NCK data)
    Little,
}

fn ensure_len(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(Error::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

macro_rules! conversions {
    ($($ty:ty => $to:ident, $from:ident, $get_be:ident, $get_le:ident, $put_be:ident, $put_le:ident;)*) => {
        $(
            #[doc = concat!("Decode a `", stringify!($ty), "` from the start of `bytes`.")]
            pub fn $to(bytes: &[u8], endian: Endian) -> Result<$ty> {
                ensure_len(bytes, size_of::<$ty>())?;
                let mut buf = bytes;
                Ok(match endian {
                    Endian::Big => buf.$get_be(),
                    Endian::Little => buf.$get_le(),
                })
            }

            #[doc = concat!("Encode a `", stringify!($ty), "` into its payload bytes.")]
            pub fn $from(value: $ty, endian: Endian) -> Vec<u8> {
                let mut buf = BytesMut::with_capacity(size_of::<$ty>());
                match endian {
                    Endian::Big => buf.$put_be(value),
                    Endian::Little => buf.$put_le(value),
                }
                buf.to_vec()
            }
        )*
    };
}

conversions! {
    i16 => bytes_to_i16, i16_to_bytes, get_i16, get_i16_le, put_i16, put_i16_le;
    u16 => bytes_to_u16, u16_to_bytes, get_u16, get_u16_le, put_u16, put_u16_le;
    i32 => bytes_to_i32, i32_to_bytes, get_i32, get_i32_le, put_i32, put_i32_le;
    u32 => bytes_to_u32, u32_to_bytes, get_u32, get_u32_le, put_u32, put_u32_le;
    i64 => bytes_to_i64, i64_to_bytes, get_i64, get_i64_le, put_i64, put_i64_le;
    u64 => bytes_to_u64, u64_to_bytes, get_u64, get_u64_le, put_u64, put_u64_le;
    f32 => bytes_to_f32, f32_to_bytes, get_f32, get_f32_le, put_f32, put_f32_le;
    f64 => bytes_to_f64, f64_to_bytes, get_f64, get_f64_le, put_f64, put_f64_le;
}

/// Decode the first byte of `bytes`
pub fn bytes_to_u8(bytes: &[u8]) -> Result<u8> {
    ensure_len(bytes, 1)?;
    Ok(bytes[0])
}

/// Read bit `bit` (0..=7) of the first byte of `bytes`
pub fn bytes_to_bool(bytes: &[u8], bit: u8) -> Result<bool> {
    Ok(bytes_to_u8(bytes)? & (1 << (bit & 0x07)) != 0)
}

/// Decode Latin-1 text; every byte maps to the code point of the same value
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text as Latin-1, failing on characters outside U+0000..=U+00FF
pub fn string_to_latin1(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                Error::InvalidArgument(format!("character '{c}' cannot be encoded as Latin-1"))
            })
        })
        .collect()
}

/// Size of a DTL value
pub const DTL_LEN: usize = 12;

fn epoch_1990() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// DATE: days since 1990-01-01
pub fn bytes_to_date(bytes: &[u8]) -> Result<NaiveDate> {
    let days = bytes_to_u16(bytes, Endian::Big)?;
    epoch_1990()
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| Error::InvalidArgument(format!("{days} days exceed the date range")))
}

/// Encode a DATE, valid from 1990-01-01 to 2169-06-06
pub fn date_to_bytes(date: NaiveDate) -> Result<Vec<u8>> {
    let days = date.signed_duration_since(epoch_1990()).num_days();
    let days = u16::try_from(days)
        .map_err(|_| Error::InvalidArgument(format!("{date} is outside the DATE range")))?;
    Ok(u16_to_bytes(days, Endian::Big))
}

/// TIME_OF_DAY: milliseconds since midnight
pub fn bytes_to_time_of_day(bytes: &[u8]) -> Result<NaiveTime> {
    let ms = bytes_to_u32(bytes, Endian::Big)?;
    NaiveTime::from_num_seconds_from_midnight_opt(ms / 1000, (ms % 1000) * 1_000_000)
        .ok_or_else(|| Error::InvalidArgument(format!("{ms} ms is not a time of day")))
}

/// Encode a TIME_OF_DAY, sub-millisecond precision is dropped
pub fn time_of_day_to_bytes(time: NaiveTime) -> Vec<u8> {
    let ms = time.num_seconds_from_midnight() * 1000 + (time.nanosecond() % 1_000_000_000) / 1_000_000;
    u32_to_bytes(ms, Endian::Big)
}

/// TIME: signed milliseconds
pub fn bytes_to_time(bytes: &[u8]) -> Result<Duration> {
    Ok(Duration::milliseconds(i64::from(bytes_to_i32(bytes, Endian::Big)?)))
}

/// Encode a TIME, which must fit into an `i32` of milliseconds
pub fn time_to_bytes(duration: Duration) -> Result<Vec<u8>> {
    let ms = i32::try_from(duration.num_milliseconds()).map_err(|_| {
        Error::InvalidArgument(format!("{duration} is outside the TIME range"))
    })?;
    Ok(i32_to_bytes(ms, Endian::Big))
}

/// DTL: year (2), month, day, weekday, hour, minute, second, nanoseconds (4)
pub fn bytes_to_dtl(bytes: &[u8]) -> Result<NaiveDateTime> {
    ensure_len(bytes, DTL_LEN)?;
    let mut buf = bytes;
    let year = buf.get_u16();
    let month = buf.get_u8();
    let day = buf.get_u8();
    let _weekday = buf.get_u8();
    let hour = buf.get_u8();
    let minute = buf.get_u8();
    let second = buf.get_u8();
    let nanos = buf.get_u32();

    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| {
            date.and_hms_nano_opt(u32::from(hour), u32::from(minute), u32::from(second), nanos)
        })
        .ok_or_else(|| Error::InvalidArgument("invalid DTL value".to_string()))
}

/// Encode a DTL; the weekday counts from 1 = Sunday
pub fn dtl_to_bytes(value: NaiveDateTime) -> Result<Vec<u8>> {
    let year = u16::try_from(value.year())
        .ok()
        .filter(|y| (1970..=2262).contains(y))
        .ok_or_else(|| Error::InvalidArgument(format!("{value} is outside the DTL range")))?;
    let mut buf = BytesMut::with_capacity(DTL_LEN);
    buf.put_u16(year);
    buf.put_u8(value.month() as u8);
    buf.put_u8(value.day() as u8);
    buf.put_u8(value.weekday().number_from_sunday() as u8);
    buf.put_u8(value.hour() as u8);
    buf.put_u8(value.minute() as u8);
    buf.put_u8(value.second() as u8);
    buf.put_u32(value.nanosecond() % 1_000_000_000);
    Ok(buf.to_vec())
}
