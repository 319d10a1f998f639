use bytes::{Buf, BufMut, BytesMut};

use super::request_item::RequestItem;
use crate::{
    errors::{Error, Result},
    s7_protocol::types::READ_WRITE_PARAM_LEN,
};

/// Parameter block of a read or write job and of its acknowledgment.
///
/// Requests carry the item descriptors; acknowledgments only echo the
/// function code and item count.
#[derive(Debug)]
pub(crate) struct ReadWriteParams<'a> {
    pub(crate) function_code: u8,
    pub(crate) item_count: u8,
    pub(crate) items: &'a [RequestItem],
}

impl<'a> ReadWriteParams<'a> {
    pub(crate) fn request(function_code: u8, items: &'a [RequestItem]) -> Result<Self> {
        let item_count = u8::try_from(items.len()).map_err(|_| {
            Error::InvalidArgument(format!("{} items do not fit in one request", items.len()))
        })?;
        if item_count == 0 {
            return Err(Error::InvalidArgument(
                "a request needs at least one item".to_string(),
            ));
        }
        Ok(Self {
            function_code,
            item_count,
            items,
        })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        READ_WRITE_PARAM_LEN + self.items.iter().map(RequestItem::encoded_len).sum::<usize>()
    }

    pub(crate) fn encode(&self, bytes: &mut BytesMut) {
        bytes.put_u8(self.function_code);
        bytes.put_u8(self.item_count);
        for item in self.items {
            item.encode(bytes);
        }
    }
}

/// Function code and item count echoed by an acknowledgment
pub(crate) fn decode_ack_params(mut parameters: &[u8], function_code: u8) -> Result<u8> {
    if parameters.remaining() < READ_WRITE_PARAM_LEN {
        return Err(Error::framing("parameter block truncated"));
    }
    let code = parameters.get_u8();
    if code != function_code {
        return Err(Error::framing(format!(
            "expected function 0x{function_code:02X}, got 0x{code:02X}"
        )));
    }
    Ok(parameters.get_u8())
}
