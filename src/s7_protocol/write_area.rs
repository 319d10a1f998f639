use bytes::{Buf, BytesMut};

use super::header::{split_blocks, S7ProtocolHeader};
use super::segments::{
    data_item::DataItem,
    parameters::{decode_ack_params, ReadWriteParams},
    request_item::RequestItem,
};
use super::types::WRITE_OPERATION;
use crate::errors::{Error, Result, ReturnCode};

/// Size of the data block carrying `data`, fill bytes included
pub(crate) fn data_block_len(data: &[DataItem]) -> usize {
    let last = data.len().saturating_sub(1);
    data.iter()
        .enumerate()
        .map(|(i, item)| item.encoded_len() + usize::from(i != last && item.data.len() % 2 == 1))
        .sum()
}

/// Write job storing `data[i]` at `items[i]`
pub fn encode_write_request(
    pdu_reference: u16,
    items: &[RequestItem],
    data: &[DataItem],
) -> Result<BytesMut> {
    if items.len() != data.len() {
        return Err(Error::InvalidArgument(format!(
            "{} request items but {} data items",
            items.len(),
            data.len()
        )));
    }
    let params = ReadWriteParams::request(WRITE_OPERATION, items)?;
    let data_len = data_block_len(data);
    let header = S7ProtocolHeader::build_request(pdu_reference, params.encoded_len(), data_len)?;

    let mut bytes =
        BytesMut::with_capacity(header.encoded_len() + params.encoded_len() + data_len);
    header.encode(&mut bytes);
    params.encode(&mut bytes);
    let last = data.len() - 1;
    for (i, item) in data.iter().enumerate() {
        item.encode(&mut bytes, i == last);
    }
    Ok(bytes)
}

/// Header and per-item return codes of the response to a write job
pub fn decode_write_response(bytes: &[u8]) -> Result<(S7ProtocolHeader, Vec<ReturnCode>)> {
    let mut body = bytes;
    let header = S7ProtocolHeader::decode(&mut body)?;
    header.is_ack()?.has_no_error()?.is_ack_with_data()?;
    let (parameters, mut data) = split_blocks(&header, body)?;
    let item_count = usize::from(decode_ack_params(parameters, WRITE_OPERATION)?);
    if data.remaining() != item_count {
        return Err(Error::framing(format!(
            "write response declares {item_count} items but carries {} return codes",
            data.remaining()
        )));
    }
    let codes = (0..item_count)
        .map(|_| ReturnCode::from(data.get_u8()))
        .collect();
    Ok((header, codes))
}
