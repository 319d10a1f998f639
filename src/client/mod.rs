use crate::{
    convert::{
        f32_to_bytes, f64_to_bytes, i16_to_bytes, i32_to_bytes, u16_to_bytes, u32_to_bytes,
        Endian,
    },
    errors::{Error, Result},
    s7_protocol::{
        address::{parse_address, Address},
        segments::{
            data_item::DataItem,
            request_item::{RequestItem, StandardItem},
        },
    },
};

pub(crate) mod batch;
pub(crate) mod control;
pub(crate) mod create;
pub(crate) mod nck;
pub(crate) mod read;
pub(crate) mod write;

/// Byte count of a payload as carried by a request item
pub(crate) fn item_len(len: usize) -> Result<u16> {
    match u16::try_from(len) {
        Ok(0) => Err(Error::InvalidArgument("data must not be empty".to_string())),
        Ok(len) => Ok(len),
        Err(_) => Err(Error::InvalidArgument(format!(
            "{len} bytes do not fit into a single item"
        ))),
    }
}

/// Addresses read together with [`S7Client::read_multi`](crate::S7Client::read_multi).
///
/// The items are sent in the order they were added, split over as many
/// requests as the negotiated PDU length requires.
///
/// ```
/// use s7link::MultiAddressRead;
///
/// let mut read = MultiAddressRead::new();
/// read.add_bool("DB1.DBX0.0")?.add_bytes("M10", 4)?.add_bytes("DB3.DBB0", 2)?;
/// assert_eq!(read.len(), 3);
/// # Ok::<(), s7link::errors::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MultiAddressRead {
    items: Vec<RequestItem>,
}

impl MultiAddressRead {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single bit
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_bool(&mut self, address: &str) -> Result<&mut Self> {
        let address = parse_address(address)?;
        Ok(self.add_item(StandardItem::bit(address)))
    }

    /// Add `count` bytes starting at `address`
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed or `count` is 0.
    pub fn add_bytes(&mut self, address: &str, count: u16) -> Result<&mut Self> {
        let address = parse_address(address)?;
        Ok(self.add_item(StandardItem::bytes(address, count)?))
    }

    /// Add a prebuilt item, standard or NCK
    pub fn add_item(&mut self, item: impl Into<RequestItem>) -> &mut Self {
        self.items.push(item.into());
        self
    }

    /// Items in the order they were added
    pub fn items(&self) -> &[RequestItem] {
        &self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no item was added
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Values written together with [`S7Client::write_multi`](crate::S7Client::write_multi).
///
/// Numbers are encoded with the builder's byte order, big-endian unless
/// changed with [`MultiAddressWrite::with_endian`].
#[derive(Debug, Clone, Default)]
pub struct MultiAddressWrite {
    endian: Endian,
    items: Vec<RequestItem>,
    data: Vec<DataItem>,
}

impl MultiAddressWrite {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty list encoding numbers with `endian`
    pub fn with_endian(endian: Endian) -> Self {
        Self {
            endian,
            ..Self::default()
        }
    }

    fn push(&mut self, item: StandardItem, data: DataItem) -> &mut Self {
        self.items.push(item.into());
        self.data.push(data);
        self
    }

    fn push_bytes(&mut self, address: Address, data: Vec<u8>) -> Result<&mut Self> {
        let item = StandardItem::bytes(address, item_len(data.len())?)?;
        Ok(self.push(item, DataItem::from_bytes(data)))
    }

    /// Add a single bit
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_bool(&mut self, address: &str, value: bool) -> Result<&mut Self> {
        let address = parse_address(address)?;
        Ok(self.push(StandardItem::bit(address), DataItem::from_bit(value)))
    }

    /// Add raw bytes
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed or `data` is empty.
    pub fn add_bytes(&mut self, address: &str, data: &[u8]) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, data.to_vec())
    }

    /// Add a single byte
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_u8(&mut self, address: &str, value: u8) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, vec![value])
    }

    /// Add an `i16`
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_i16(&mut self, address: &str, value: i16) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, i16_to_bytes(value, self.endian))
    }

    /// Add a `u16`
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_u16(&mut self, address: &str, value: u16) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, u16_to_bytes(value, self.endian))
    }

    /// Add an `i32`
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_i32(&mut self, address: &str, value: i32) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, i32_to_bytes(value, self.endian))
    }

    /// Add a `u32`
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_u32(&mut self, address: &str, value: u32) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, u32_to_bytes(value, self.endian))
    }

    /// Add an `f32`
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_f32(&mut self, address: &str, value: f32) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, f32_to_bytes(value, self.endian))
    }

    /// Add an `f64`
    ///
    /// # Errors
    ///
    /// Will return `Error` if the address cannot be parsed.
    pub fn add_f64(&mut self, address: &str, value: f64) -> Result<&mut Self> {
        self.push_bytes(parse_address(address)?, f64_to_bytes(value, self.endian))
    }

    /// Add a prebuilt item with its payload
    pub fn add_item(&mut self, item: StandardItem, data: DataItem) -> &mut Self {
        self.push(item, data)
    }

    pub(crate) fn parts(&self) -> (&[RequestItem], &[DataItem]) {
        (&self.items, &self.data)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no item was added
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
