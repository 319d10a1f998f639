use std::mem::size_of;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::{batch::read_batch, create::S7Client, MultiAddressRead};
use crate::{
    connection::Exchange,
    convert::{
        bytes_to_date, bytes_to_dtl, bytes_to_f32, bytes_to_f64, bytes_to_i16, bytes_to_i32,
        bytes_to_i64, bytes_to_time, bytes_to_time_of_day, bytes_to_u16, bytes_to_u32,
        bytes_to_u64, bytes_to_u8, latin1_to_string, DTL_LEN,
    },
    errors::{Error, Result},
    s7_protocol::{
        address::{parse_address, Address},
        segments::{
            data_item::DataItem,
            request_item::{RequestItem, StandardItem},
        },
        types::{Area, VariableType},
    },
};

/// Response header, data item header and the alignment byte of a previous item
const READ_CHUNK_OVERHEAD: u16 = 18;
/// Longest string a PLC string variable can hold
pub(crate) const MAX_STRING_LEN: usize = 254;

/// Largest byte item a read response can carry for `budget`; even, at least 2
pub(crate) fn read_chunk_len(budget: u16) -> u16 {
    (budget.saturating_sub(READ_CHUNK_OVERHEAD) & !1).max(2)
}

fn byte_items(addresses: &[&str], len: usize) -> Result<Vec<RequestItem>> {
    let count = u16::try_from(len)
        .map_err(|_| Error::InvalidArgument(format!("{len} bytes do not fit into an item")))?;
    addresses
        .iter()
        .map(|address| Ok(StandardItem::bytes(parse_address(address)?, count)?.into()))
        .collect()
}

macro_rules! typed_reads {
    ($($ty:ty => $read:ident, $read_list:ident, $convert:ident;)*) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` at `address`")]
            ///
            /// # Errors
            ///
            /// Will return `Error` if the address is invalid or the PLC rejects the read.
            pub async fn $read(&mut self, address: &str) -> Result<$ty> {
                let address = parse_address(address)?;
                let data = self
                    .read_item(StandardItem::bytes(address, size_of::<$ty>() as u16)?)
                    .await?;
                $convert(&data, self.endian())
            }

            #[doc = concat!("Read one `", stringify!($ty), "` per address in a single batch")]
            ///
            /// # Errors
            ///
            /// Will return [`Error::Item`] naming every address the PLC could not read.
            pub async fn $read_list(&mut self, addresses: &[&str]) -> Result<Vec<$ty>> {
                let items = byte_items(addresses, size_of::<$ty>())?;
                let endian = self.endian();
                read_batch(&mut self.session, &items, true)
                    .await?
                    .iter()
                    .map(|item| $convert(&item.data, endian))
                    .collect()
            }
        )*
    };
}

/// *Methods for reading from the PLC device*
impl S7Client {
    async fn read_item(&mut self, item: StandardItem) -> Result<Vec<u8>> {
        read_batch(&mut self.session, &[item.into()], true)
            .await?
            .pop()
            .map(|item| item.data)
            .ok_or_else(|| Error::framing("response carries no data item"))
    }

    pub(crate) async fn read_bytes_at(&mut self, address: Address, count: usize) -> Result<Vec<u8>> {
        if count == 0 {
            return Err(Error::InvalidArgument("count must be > 0".to_string()));
        }
        if matches!(address.area, Area::Timer | Area::Counter) {
            let count = u16::try_from(count).map_err(|_| {
                Error::InvalidArgument(format!("{count} bytes of timers/counters in one read"))
            })?;
            return self.read_item(StandardItem::bytes(address, count)?).await;
        }

        self.session.ensure_ready()?;
        let chunk = usize::from(read_chunk_len(self.session.pdu_budget()));
        let mut items = Vec::with_capacity(count.div_ceil(chunk));
        let mut offset = 0;
        while offset < count {
            let len = chunk.min(count - offset);
            let start = address.offset_by(offset as u32)?;
            items.push(StandardItem::bytes(start, len as u16)?.into());
            offset += len;
        }

        let mut data = Vec::with_capacity(count);
        for item in read_batch(&mut self.session, &items, true).await? {
            data.extend(item.data);
        }
        Ok(data)
    }

    /// Read `count` elements of `variable_type` from a fully specified location
    ///
    /// # Example
    /// ```rust, ignore
    /// use s7link::{Area, VariableType};
    ///
    /// let data = client.read_raw(VariableType::Byte, 4, Area::DataBlock, 100, 0, 0)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if `count` is 0, `bit_offset` exceeds 7 or the PLC rejects the read.
    pub async fn read_raw(
        &mut self,
        variable_type: VariableType,
        count: u16,
        area: Area,
        db_number: u16,
        byte_offset: u32,
        bit_offset: u8,
    ) -> Result<Vec<u8>> {
        let address = Address::new(area, db_number, byte_offset, bit_offset)?;
        self.read_item(StandardItem::new(address, variable_type, count)?)
            .await
    }

    /// Read `count` bytes starting at `address`.
    ///
    /// Ranges larger than one PDU are read with several items, in as few
    /// requests as the negotiated PDU length allows.
    ///
    /// # Example
    /// ```rust, ignore
    /// let data = client.read_bytes("DB100.DBB0", 4)
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_bytes(&mut self, address: &str, count: usize) -> Result<Vec<u8>> {
        let address = parse_address(address)?;
        self.read_bytes_at(address, count).await
    }

    /// Read a single byte
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_byte(&mut self, address: &str) -> Result<u8> {
        let address = parse_address(address)?;
        bytes_to_u8(&self.read_item(StandardItem::bytes(address, 1)?).await?)
    }

    /// Read a specific bit
    ///
    /// # Example
    /// ```rust, ignore
    /// let bit = client.read_bool("DB100.DBX0.3")
    ///     .await
    ///     .expect("Could not read from S7 PLC");
    /// ```
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_bool(&mut self, address: &str) -> Result<bool> {
        let address = parse_address(address)?;
        Ok(bytes_to_u8(&self.read_item(StandardItem::bit(address)).await?)? != 0)
    }

    /// Read several bits in a single batch
    ///
    /// # Errors
    ///
    /// Will return [`Error::Item`] naming every address the PLC could not read.
    pub async fn read_bools(&mut self, addresses: &[&str]) -> Result<Vec<bool>> {
        let items = bit_items(addresses)?;
        read_batch(&mut self.session, &items, true)
            .await?
            .iter()
            .map(|item| Ok(bytes_to_u8(&item.data)? != 0))
            .collect()
    }

    /// Read several bits, `None` marking each bit the PLC could not read
    ///
    /// # Example
    /// ```rust, ignore
    /// let bits = client.read_bools_unsafe(&["DB1.DBX0.0", "DB1.DBX9999.0"]).await?;
    /// assert_eq!(bits[1], None);
    /// ```
    /// # Errors
    ///
    /// Will return `Error` only if the exchange as a whole failed.
    pub async fn read_bools_unsafe(&mut self, addresses: &[&str]) -> Result<Vec<Option<bool>>> {
        let items = bit_items(addresses)?;
        read_batch(&mut self.session, &items, false)
            .await?
            .iter()
            .map(|item| {
                item.payload()
                    .map(|data| Ok(bytes_to_u8(data)? != 0))
                    .transpose()
            })
            .collect()
    }

    typed_reads! {
        i16 => read_i16, read_i16s, bytes_to_i16;
        u16 => read_u16, read_u16s, bytes_to_u16;
        i32 => read_i32, read_i32s, bytes_to_i32;
        u32 => read_u32, read_u32s, bytes_to_u32;
        i64 => read_i64, read_i64s, bytes_to_i64;
        u64 => read_u64, read_u64s, bytes_to_u64;
        f32 => read_f32, read_f32s, bytes_to_f32;
        f64 => read_f64, read_f64s, bytes_to_f64;
    }

    /// Read every item of `request`, failing if any of them failed
    ///
    /// # Errors
    ///
    /// Will return [`Error::Item`] naming every item the PLC could not read.
    pub async fn read_multi(&mut self, request: &MultiAddressRead) -> Result<Vec<DataItem>> {
        read_batch(&mut self.session, request.items(), true).await
    }

    /// Read every item of `request`, `None` marking each item the PLC could not read
    ///
    /// # Errors
    ///
    /// Will return `Error` only if the exchange as a whole failed.
    pub async fn read_multi_unsafe(
        &mut self,
        request: &MultiAddressRead,
    ) -> Result<Vec<Option<Vec<u8>>>> {
        Ok(read_batch(&mut self.session, request.items(), false)
            .await?
            .into_iter()
            .map(|item| item.is_success().then_some(item.data))
            .collect())
    }

    /// Read a PLC string.
    ///
    /// The header in front of the characters is read first to learn the
    /// actual length, then the characters themselves.
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_string(&mut self, address: &str) -> Result<String> {
        let address = parse_address(address)?;
        let header = usize::from(self.profile().string_header_len);
        let head = self.read_bytes_at(address, header).await?;
        let len = string_length(&head, header)?;
        if len == 0 {
            return Ok(String::new());
        }
        let data = self.read_bytes_at(address, header + len).await?;
        string_payload(&data, header, len)
    }

    /// Read a PLC string of at most `length` characters with a single read
    ///
    /// # Errors
    ///
    /// Will return `Error` if `length` is not within 1..=254 or the read fails.
    pub async fn read_string_with_length(&mut self, address: &str, length: usize) -> Result<String> {
        if !(1..=MAX_STRING_LEN).contains(&length) {
            return Err(Error::InvalidArgument(format!(
                "string length {length} is out of range [1..{MAX_STRING_LEN}]"
            )));
        }
        let address = parse_address(address)?;
        let header = usize::from(self.profile().string_header_len);
        let data = self.read_bytes_at(address, header + length).await?;
        let actual = string_length(&data, header)?;
        string_payload(&data, header, actual.min(length))
    }

    /// Read a DATE (days since 1990-01-01)
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_date(&mut self, address: &str) -> Result<NaiveDate> {
        bytes_to_date(&self.read_bytes(address, 2).await?)
    }

    /// Read a TIME_OF_DAY (milliseconds since midnight)
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_time_of_day(&mut self, address: &str) -> Result<NaiveTime> {
        bytes_to_time_of_day(&self.read_bytes(address, 4).await?)
    }

    /// Read a TIME (signed milliseconds)
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_time(&mut self, address: &str) -> Result<Duration> {
        bytes_to_time(&self.read_bytes(address, 4).await?)
    }

    /// Read a DTL date and time
    ///
    /// # Errors
    ///
    /// Will return `Error` if any errors occurred during reading.
    pub async fn read_dtl(&mut self, address: &str) -> Result<NaiveDateTime> {
        bytes_to_dtl(&self.read_bytes(address, DTL_LEN).await?)
    }
}

fn bit_items(addresses: &[&str]) -> Result<Vec<RequestItem>> {
    addresses
        .iter()
        .map(|address| Ok(StandardItem::bit(parse_address(address)?).into()))
        .collect()
}

/// Actual length, stored in the last byte of the string header
fn string_length(data: &[u8], header: usize) -> Result<usize> {
    let len = header
        .checked_sub(1)
        .and_then(|index| data.get(index))
        .ok_or(Error::InsufficientData {
            needed: header,
            available: data.len(),
        })?;
    Ok(usize::from(*len))
}

fn string_payload(data: &[u8], header: usize, len: usize) -> Result<String> {
    let text = data
        .get(header..header + len)
        .ok_or(Error::InsufficientData {
            needed: header + len,
            available: data.len(),
        })?;
    Ok(latin1_to_string(text))
}
