use bytes::BytesMut;

use super::header::{split_blocks, S7ProtocolHeader};
use super::segments::{
    data_item::DataItem,
    nck_item::NckItem,
    parameters::{decode_ack_params, ReadWriteParams},
    request_item::RequestItem,
};
use super::types::READ_OPERATION;
use crate::errors::{Error, Result};

/// Read job for `items`, which may mix standard and NCK addressing
pub fn encode_read_request(pdu_reference: u16, items: &[RequestItem]) -> Result<BytesMut> {
    let params = ReadWriteParams::request(READ_OPERATION, items)?;
    let header = S7ProtocolHeader::build_request(pdu_reference, params.encoded_len(), 0)?;

    let mut bytes = BytesMut::with_capacity(header.encoded_len() + params.encoded_len());
    header.encode(&mut bytes);
    params.encode(&mut bytes);
    Ok(bytes)
}

/// Read job for NCK addressed items
pub fn encode_nck_read_request(pdu_reference: u16, items: &[NckItem]) -> Result<BytesMut> {
    let items: Vec<RequestItem> = items.iter().copied().map(RequestItem::from).collect();
    encode_read_request(pdu_reference, &items)
}

/// Header and data items of the response to a read job.
///
/// Failed items are returned like any other item, carrying their return code;
/// whether that is an error is up to the caller.
///
/// # Errors
///
/// [`Error::Protocol`] when the header carries an error class, [`Error::Framing`]
/// when the frame is not an ack with data or its declared lengths do not hold.
pub fn decode_read_response(bytes: &[u8]) -> Result<(S7ProtocolHeader, Vec<DataItem>)> {
    let mut body = bytes;
    let header = S7ProtocolHeader::decode(&mut body)?;
    header.is_ack()?.has_no_error()?.is_ack_with_data()?;
    let (parameters, mut data) = split_blocks(&header, body)?;
    let item_count = decode_ack_params(parameters, READ_OPERATION)?;

    let mut items = Vec::with_capacity(usize::from(item_count));
    for index in 0..item_count {
        let item = DataItem::decode(&mut data)
            .map_err(|e| Error::framing(format!("data item {index}: {e}")))?;
        items.push(item);
    }
    if !data.is_empty() {
        return Err(Error::framing(format!(
            "{} unexpected bytes after {item_count} data items",
            data.len()
        )));
    }
    Ok((header, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReturnCode;
    use crate::s7_protocol::{
        address::Address,
        segments::{
            nck_item::{NckArea, NckModule},
            request_item::StandardItem,
        },
        types::Area,
    };

    #[test]
    fn request_layout() {
        let item = StandardItem::bytes(Address::new(Area::DataBlock, 1, 0, 0).unwrap(), 4).unwrap();
        let bytes = encode_read_request(5, &[item.into()]).unwrap();
        assert_eq!(bytes.len(), 10 + 2 + 12);
        assert_eq!(&bytes[..10], &[0x32, 0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x0E, 0x00, 0x00]);
        assert_eq!(&bytes[10..12], &[0x04, 0x01]);
    }

    #[test]
    fn nck_request_layout() {
        let item = NckItem::new(NckArea::Nck, 1, 18030, 1, NckModule::M, 1).unwrap();
        let bytes = encode_nck_read_request(1, &[item]).unwrap();
        assert_eq!(bytes.len(), 10 + 2 + 10);
        assert_eq!(
            &bytes[12..],
            &[0x12, 0x08, 0x82, 0x01, 0x46, 0x6E, 0x00, 0x01, 0x1A, 0x01]
        );
    }

    #[test]
    fn empty_requests_are_rejected() {
        assert!(matches!(
            encode_read_request(1, &[]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn response_walks_every_item() {
        let raw: &[u8] = &[
            0x32, 0x03, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02, 0x00, 0x0B, 0x00, 0x00, // header
            0x04, 0x02, // read, two items
            0xFF, 0x04, 0x00, 0x08, 0x2A, 0x00, // one byte + fill
            0x05, 0x00, 0x00, 0x00, // address out of range
            0x00,
        ];
        // header declares 11 data bytes, one more than the two items use
        assert!(matches!(decode_read_response(raw), Err(Error::Framing(_))));

        let mut raw = raw.to_vec();
        raw.pop();
        raw[9] = 0x0A;
        let (header, items) = decode_read_response(&raw).unwrap();
        assert_eq!(header.pdu_reference, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].data, vec![0x2A]);
        assert_eq!(items[1].return_code, ReturnCode::AddressOutOfRange);
    }

    #[test]
    fn header_errors_surface_as_protocol_errors() {
        let raw: &[u8] = &[0x32, 0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x85, 0x00];
        assert!(matches!(decode_read_response(raw), Err(Error::Protocol(_))));
    }

    #[test]
    fn missing_items_are_framing_errors() {
        let raw: &[u8] = &[
            0x32, 0x03, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02, 0x00, 0x06, 0x00, 0x00, 0x04, 0x02,
            0xFF, 0x04, 0x00, 0x08, 0x2A, 0x00,
        ];
        assert!(matches!(decode_read_response(raw), Err(Error::Framing(_))));
    }
}
