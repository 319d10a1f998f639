use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::{
    batch::write_batch, create::S7Client, item_len, read::MAX_STRING_LEN, MultiAddressWrite,
};
use crate::{
    connection::Exchange,
    convert::{
        date_to_bytes, dtl_to_bytes, f32_to_bytes, f64_to_bytes, i16_to_bytes, i32_to_bytes,
        i64_to_bytes, string_to_latin1, time_of_day_to_bytes, time_to_bytes, u16_to_bytes,
        u32_to_bytes, u64_to_bytes,
    },
    errors::{Error, Result, ReturnCode},
    s7_protocol::{
        address::{parse_address, Address},
        segments::{data_item::DataItem, request_item::StandardItem},
        types::{Area, DataVariableType, VariableType},
    },
};

/// Request header, item descriptor and data item header
const WRITE_CHUNK_OVERHEAD: u16 = 28;

/// Largest byte item a write request can carry for `budget`
pub(crate) fn write_chunk_len(budget: u16) -> u16 {
    budget.saturating_sub(WRITE_CHUNK_OVERHEAD).max(1)
}

/// Timers and counters are written as whole 2-byte elements
fn element_write(address: Address, data: &[u8]) -> Result<(StandardItem, DataItem)> {
    if data.len() % 2 == 1 {
        return Err(Error::InvalidArgument(format!(
            "{} bytes are not whole timer/counter elements",
            data.len()
        )));
    }
    let item = StandardItem::bytes(address, item_len(data.len())?)?;
    Ok((item, DataItem::with_type(DataVariableType::OctetString, data)))
}

macro_rules! typed_writes {
    ($($ty:ty => $write:ident, $convert:ident;)*) => {
        $(
            #[doc = concat!("Write a `", stringify!($ty), "` to `address`")]
            ///
            /// # Errors
            ///
            /// Will return `Error` if the address is invalid or the PLC rejects the write.
            pub async fn $write(&mut self, address: &str, value: $ty) -> Result<()> {
                let data = $convert(value, self.endian());
                self.write_bytes(address, &data).await
            }
        )*
    };
}

/// *Methods for writing data into the PLC device*
impl S7Client {
    async fn write_item(&mut self, item: StandardItem, data: DataItem) -> Result<()> {
        write_batch(&mut self.session, &[item.into()], &[data], true)
            .await
            .map(|_| ())
    }

    pub(crate) async fn write_bytes_at(&mut self, address: Address, data: &[u8]) -> Result<()> {
        if matches!(address.area, Area::Timer | Area::Counter) {
            let (item, data) = element_write(address, data)?;
            return self.write_item(item, data).await;
        }
        if data.is_empty() {
            return Err(Error::InvalidArgument("data must not be empty".to_string()));
        }

        self.session.ensure_ready()?;
        let chunk = usize::from(write_chunk_len(self.session.pdu_budget()));
        let mut items = Vec::with_capacity(data.len().div_ceil(chunk));
        let mut payloads = Vec::with_capacity(items.capacity());
        for (i, part) in data.chunks(chunk).enumerate() {
            let start = address.offset_by((i * chunk) as u32)?;
            items.push(StandardItem::bytes(start, part.len() as u16)?.into());
            payloads.push(DataItem::from_bytes(part));
        }
        write_batch(&mut self.session, &items, &payloads, true)
            .await
            .map(|_| ())
    }

    /// Write `count` elements of `variable_type` to a fully specified location
    ///
    /// # Example
    /// ```rust, ignore
    /// use s7link::{Area, DataVariableType, VariableType};
    ///
    /// client.write_raw(VariableType::Byte, 2, Area::DataBlock, 100, 0, 0, DataVariableType::Byte, &[1, 2])
    ///     .await
    ///     .expect("Could not write to S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if the arguments are invalid, `data` is empty or the PLC rejects the write.
    #[allow(clippy::too_many_arguments)]
    pub async fn write_raw(
        &mut self,
        variable_type: VariableType,
        count: u16,
        area: Area,
        db_number: u16,
        byte_offset: u32,
        bit_offset: u8,
        data_variable_type: DataVariableType,
        data: &[u8],
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("data must not be empty".to_string()));
        }
        let address = Address::new(area, db_number, byte_offset, bit_offset)?;
        let item = StandardItem::new(address, variable_type, count)?;
        self.write_item(item, DataItem::with_type(data_variable_type, data))
            .await
    }

    /// Write bytes starting at `address`.
    ///
    /// Data larger than one PDU is written with several items, in as few
    /// requests as the negotiated PDU length allows.
    ///
    /// # Example
    /// ```rust, ignore
    /// client.write_bytes("DB100.DBB0", &[0, 1, 2, 3])
    ///     .await
    ///     .expect("Could not write to S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn write_bytes(&mut self, address: &str, data: &[u8]) -> Result<()> {
        let address = parse_address(address)?;
        self.write_bytes_at(address, data).await
    }

    /// Write a single byte
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn write_byte(&mut self, address: &str, value: u8) -> Result<()> {
        self.write_bytes(address, &[value]).await
    }

    /// Write a specific bit
    ///
    /// # Example
    /// ```rust, ignore
    /// client.write_bool("DB100.DBX0.3", true)
    ///     .await
    ///     .expect("Could not write to S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn write_bool(&mut self, address: &str, value: bool) -> Result<()> {
        let address = parse_address(address)?;
        self.write_item(StandardItem::bit(address), DataItem::from_bit(value))
            .await
    }

    typed_writes! {
        i16 => write_i16, i16_to_bytes;
        u16 => write_u16, u16_to_bytes;
        i32 => write_i32, i32_to_bytes;
        u32 => write_u32, u32_to_bytes;
        i64 => write_i64, i64_to_bytes;
        u64 => write_u64, u64_to_bytes;
        f32 => write_f32, f32_to_bytes;
        f64 => write_f64, f64_to_bytes;
    }

    /// Write a PLC string.
    ///
    /// Only the actual-length byte and the characters are written, the
    /// maximum length configured in the PLC stays untouched.
    ///
    /// # Errors
    ///
    /// Will return `Error` if `text` has more than 254 characters, contains
    /// characters outside Latin-1 or the write fails.
    pub async fn write_string(&mut self, address: &str, text: &str) -> Result<()> {
        let address = parse_address(address)?;
        let payload = string_to_latin1(text)?;
        if payload.len() > MAX_STRING_LEN {
            return Err(Error::InvalidArgument(format!(
                "string of {} characters exceeds {MAX_STRING_LEN}",
                payload.len()
            )));
        }
        let mut data = Vec::with_capacity(payload.len() + 1);
        data.push(payload.len() as u8);
        data.extend(payload);

        let length_byte = u32::from(self.profile().string_header_len) - 1;
        let start = address.offset_by(length_byte)?;
        self.write_bytes_at(start, &data).await
    }

    /// Write a DATE
    ///
    /// # Errors
    ///
    /// Will return `Error` if the date is before 1990-01-01, too far in the future or the write fails.
    pub async fn write_date(&mut self, address: &str, date: NaiveDate) -> Result<()> {
        self.write_bytes(address, &date_to_bytes(date)?).await
    }

    /// Write a TIME_OF_DAY
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during writing.
    pub async fn write_time_of_day(&mut self, address: &str, time: NaiveTime) -> Result<()> {
        self.write_bytes(address, &time_of_day_to_bytes(time)).await
    }

    /// Write a TIME
    ///
    /// # Errors
    ///
    /// Will return `Error` if the duration does not fit into 32 bit milliseconds or the write fails.
    pub async fn write_time(&mut self, address: &str, duration: Duration) -> Result<()> {
        self.write_bytes(address, &time_to_bytes(duration)?).await
    }

    /// Write a DTL date and time
    ///
    /// # Errors
    ///
    /// Will return `Error` if the year cannot be expressed or the write fails.
    pub async fn write_dtl(&mut self, address: &str, value: NaiveDateTime) -> Result<()> {
        self.write_bytes(address, &dtl_to_bytes(value)?).await
    }

    /// Write every item of `request`, failing if any of them failed
    ///
    /// # Errors
    ///
    /// Will return [`Error::Item`] naming every item the PLC rejected.
    pub async fn write_multi(&mut self, request: &MultiAddressWrite) -> Result<()> {
        let (items, data) = request.parts();
        write_batch(&mut self.session, items, data, true)
            .await
            .map(|_| ())
    }

    /// Write every item of `request`, returning the PLC's verdict per item
    ///
    /// # Errors
    ///
    /// Will return `Error` only if the exchange as a whole failed.
    pub async fn write_multi_unsafe(
        &mut self,
        request: &MultiAddressWrite,
    ) -> Result<Vec<ReturnCode>> {
        let (items, data) = request.parts();
        write_batch(&mut self.session, items, data, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_chunks_fill_the_request() {
        assert_eq!(write_chunk_len(240), 212);
        assert_eq!(write_chunk_len(960), 932);
        assert_eq!(write_chunk_len(0), 1);
    }

    #[test]
    fn timers_are_written_as_octet_strings() {
        let address = Address::new(Area::Timer, 0, 5, 0).unwrap();
        let (item, data) = element_write(address, &[0x12, 0x34, 0x56, 0x78]).unwrap();
        assert_eq!(item.variable_type, VariableType::Timer);
        assert_eq!(item.count, 2);
        assert_eq!(data.variable_type, DataVariableType::OctetString);
        assert_eq!(data.data, vec![0x12, 0x34, 0x56, 0x78]);

        let mut bytes = bytes::BytesMut::new();
        data.encode(&mut bytes, true);
        assert_eq!(&bytes[..4], &[0x00, 0x09, 0x00, 0x04]);
    }

    #[test]
    fn partial_elements_are_rejected() {
        let address = Address::new(Area::Counter, 0, 1, 0).unwrap();
        assert!(matches!(
            element_write(address, &[1, 2, 3]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            element_write(address, &[]),
            Err(Error::InvalidArgument(_))
        ));
    }
}
