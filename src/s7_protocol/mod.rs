//! S7 frame codec: protocol header, parameter blocks and data items.
//!
//! Encoders return the S7 PDU only; the ISO-on-TCP envelope (TPKT + COTP) is
//! added by the transport.

pub mod address;
pub mod control;
pub mod header;
pub mod negotiate;
pub mod read_area;
pub mod segments;
pub mod types;
pub mod write_area;

pub use address::{parse_address, Address};
pub use control::{BlockType, FileSystem};
pub use header::S7ProtocolHeader;
pub use negotiate::{decode_setup_response, encode_setup, SetupParams};
pub use read_area::{decode_read_response, encode_nck_read_request, encode_read_request};
pub use segments::{
    data_item::DataItem,
    nck_item::{NckArea, NckItem, NckModule},
    request_item::{RequestItem, StandardItem},
};
pub use types::{Area, DataVariableType, MessageType, VariableType};
pub use write_area::{decode_write_response, encode_write_request};
