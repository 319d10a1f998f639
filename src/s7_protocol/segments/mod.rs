pub mod data_item;
pub mod nck_item;
pub(crate) mod parameters;
pub mod request_item;
