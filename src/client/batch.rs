//! Splits multi-item requests into frames that fit the negotiated PDU length.
//!
//! Items are packed greedily in input order: a new frame starts as soon as the
//! next item would push either the request or its response over the budget.
//! Results are reassembled in input order.

use std::ops::Range;

use tracing::{debug, trace};

use crate::{
    connection::Exchange,
    errors::{Error, Result, ReturnCode},
    s7_protocol::{
        read_area::{decode_read_response, encode_read_request},
        segments::{data_item::DataItem, request_item::RequestItem},
        types::{ACK_HEADER_LEN, DATA_ITEM_HEADER_LEN, JOB_HEADER_LEN, READ_WRITE_PARAM_LEN},
        write_area::{decode_write_response, encode_write_request},
    },
};

/// Job header + function code + item count
pub(crate) const REQUEST_OVERHEAD: usize = JOB_HEADER_LEN + READ_WRITE_PARAM_LEN;
/// Ack header + function code + item count
pub(crate) const RESPONSE_OVERHEAD: usize = ACK_HEADER_LEN + READ_WRITE_PARAM_LEN;
/// The item count is a single byte
const MAX_ITEMS_PER_FRAME: usize = u8::MAX as usize;

/// What one item adds to one side (request or response) of a frame
#[derive(Debug, Clone, Copy)]
struct ItemCost {
    /// Bytes added as is (item descriptor, return code)
    fixed: usize,
    /// Data item payload, added with its header and the previous item's fill byte
    payload: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Side {
    total: usize,
    odd_tail: bool,
}

impl Side {
    fn new(overhead: usize) -> Self {
        Self {
            total: overhead,
            odd_tail: false,
        }
    }

    fn add(self, cost: ItemCost) -> Self {
        match cost.payload {
            None => Self {
                total: self.total + cost.fixed,
                ..self
            },
            Some(len) => Self {
                total: self.total
                    + cost.fixed
                    + usize::from(self.odd_tail)
                    + DATA_ITEM_HEADER_LEN
                    + len,
                odd_tail: len % 2 == 1,
            },
        }
    }
}

/// Group consecutive items into frames; `costs` yields (request, response) costs per item
fn plan(
    costs: impl Iterator<Item = (ItemCost, ItemCost)>,
    budget: u16,
) -> Result<Vec<Range<usize>>> {
    let limit = usize::from(budget);
    let empty = (Side::new(REQUEST_OVERHEAD), Side::new(RESPONSE_OVERHEAD));

    let mut frames = Vec::new();
    let mut start = 0;
    let mut current = empty;
    let mut len = 0;
    for (index, (request, response)) in costs.enumerate() {
        let alone = (empty.0.add(request), empty.1.add(response));
        if alone.0.total > limit || alone.1.total > limit {
            return Err(Error::ItemTooLarge {
                index,
                size: alone.0.total.max(alone.1.total),
                budget,
            });
        }

        let next = (current.0.add(request), current.1.add(response));
        if index > start
            && (next.0.total > limit || next.1.total > limit || index - start == MAX_ITEMS_PER_FRAME)
        {
            frames.push(start..index);
            start = index;
            current = alone;
        } else {
            current = next;
        }
        len = index + 1;
    }
    if start < len {
        frames.push(start..len);
    }
    Ok(frames)
}

/// Frames for reading `items`; NCK items only count on the request side
pub(crate) fn plan_reads(items: &[RequestItem], budget: u16) -> Result<Vec<Range<usize>>> {
    plan(
        items.iter().map(|item| {
            (
                ItemCost {
                    fixed: item.encoded_len(),
                    payload: None,
                },
                ItemCost {
                    fixed: 0,
                    payload: item.expected_data_len(),
                },
            )
        }),
        budget,
    )
}

/// Frames for writing `data` to `items`
pub(crate) fn plan_writes(
    items: &[RequestItem],
    data: &[DataItem],
    budget: u16,
) -> Result<Vec<Range<usize>>> {
    plan(
        items.iter().zip(data).map(|(item, data)| {
            (
                ItemCost {
                    fixed: item.encoded_len(),
                    payload: Some(data.data.len()),
                },
                ItemCost {
                    fixed: 1,
                    payload: None,
                },
            )
        }),
        budget,
    )
}

/// Fails with [`Error::Item`] naming every unsuccessful position
pub(crate) fn check_return_codes(codes: impl IntoIterator<Item = ReturnCode>) -> Result<()> {
    let failed: Vec<(usize, ReturnCode)> = codes
        .into_iter()
        .enumerate()
        .filter(|(_, code)| !code.is_success())
        .collect();
    match failed.first() {
        None => Ok(()),
        Some(&(index, code)) => Err(Error::Item {
            index,
            code,
            failed: failed.iter().map(|(index, _)| *index).collect(),
        }),
    }
}

fn check_read_response(
    response: &[u8],
    pdu_reference: u16,
    requested: &[RequestItem],
) -> Result<Vec<DataItem>> {
    let (header, items) = decode_read_response(response)?;
    header.is_current_pdu_response(pdu_reference)?;
    if items.len() != requested.len() {
        return Err(Error::framing(format!(
            "item count mismatch: requested {}, received {}",
            requested.len(),
            items.len()
        )));
    }
    // successful items must carry exactly the requested payload
    for (index, (request, item)) in requested.iter().zip(&items).enumerate() {
        match request.expected_data_len() {
            Some(len) if item.is_success() && item.data.len() != len => {
                return Err(Error::framing(format!(
                    "item {index}: requested {len} bytes, received {}",
                    item.data.len()
                )));
            }
            _ => {}
        }
    }
    Ok(items)
}

fn check_write_response(
    response: &[u8],
    pdu_reference: u16,
    expected: usize,
) -> Result<Vec<ReturnCode>> {
    let (header, codes) = decode_write_response(response)?;
    header.is_current_pdu_response(pdu_reference)?;
    if codes.len() != expected {
        return Err(Error::framing(format!(
            "item count mismatch: wrote {expected}, received {} return codes",
            codes.len()
        )));
    }
    Ok(codes)
}

/// Read `items`, one data item per request item in the same order.
///
/// With `strict` any unsuccessful item fails the whole call with [`Error::Item`];
/// otherwise failed items are returned with their return code and no payload.
pub(crate) async fn read_batch<E>(
    session: &mut E,
    items: &[RequestItem],
    strict: bool,
) -> Result<Vec<DataItem>>
where
    E: Exchange + ?Sized,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    session.ensure_ready()?;
    let frames = plan_reads(items, session.pdu_budget())?;
    debug!(items = items.len(), frames = frames.len(), "reading");

    let mut results = Vec::with_capacity(items.len());
    for range in frames {
        let group = &items[range];
        let pdu_reference = session.next_pdu_reference();
        let request = encode_read_request(pdu_reference, group)?;
        trace!(pdu_reference, items = group.len(), bytes = request.len(), "read frame");
        let response = session.exchange(request).await?;
        let data = check_read_response(&response, pdu_reference, group)
            .map_err(|e| session.poison(e))?;
        results.extend(data);
    }

    if strict {
        check_return_codes(results.iter().map(|item| item.return_code))?;
    }
    Ok(results)
}

/// Write `data[i]` to `items[i]`, returning one return code per item.
///
/// With `strict` any unsuccessful item fails the whole call with [`Error::Item`].
pub(crate) async fn write_batch<E>(
    session: &mut E,
    items: &[RequestItem],
    data: &[DataItem],
    strict: bool,
) -> Result<Vec<ReturnCode>>
where
    E: Exchange + ?Sized,
{
    if items.len() != data.len() {
        return Err(Error::InvalidArgument(format!(
            "{} request items but {} data items",
            items.len(),
            data.len()
        )));
    }
    if items.is_empty() {
        return Ok(Vec::new());
    }
    session.ensure_ready()?;
    let frames = plan_writes(items, data, session.pdu_budget())?;
    debug!(items = items.len(), frames = frames.len(), "writing");

    let mut codes = Vec::with_capacity(items.len());
    for range in frames {
        let pdu_reference = session.next_pdu_reference();
        let request =
            encode_write_request(pdu_reference, &items[range.clone()], &data[range.clone()])?;
        trace!(pdu_reference, items = range.len(), bytes = request.len(), "write frame");
        let response = session.exchange(request).await?;
        let frame_codes = check_write_response(&response, pdu_reference, range.len())
            .map_err(|e| session.poison(e))?;
        codes.extend(frame_codes);
    }

    if strict {
        check_return_codes(codes.iter().copied())?;
    }
    Ok(codes)
}
