//! COM_QUERY payload decoding.
//!
//! MySQL 8.0.23 clients may prefix the query text with a length-encoded
//! `parameter_count` and `parameter_set_count` (query attributes). Older
//! clients send the text directly. SQL text starts with a printable byte,
//! so a first byte below 0x20 or in the length-encoded marker range is
//! taken to mean the newer form.

use crate::error::{DecodeError, Result};
use crate::wire::read_lenc_int;

/// Extract the SQL text from a COM_QUERY payload (the bytes after the
/// command byte).
pub fn decode_com_query(payload: &[u8]) -> Result<&[u8]> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    let first = payload[0];
    if first >= 0x20 && !(0xfb..=0xfe).contains(&first) {
        // Legacy form, the whole payload is the query text.
        return Ok(payload);
    }

    let (param_count, n) = read_lenc_int(payload)?;
    let Some(param_count) = param_count else {
        // NULL parameter_count: not a valid attribute block, assume the
        // payload is legacy query text after all.
        return Ok(payload);
    };
    let mut offset = n;

    if offset >= payload.len() {
        return Err(DecodeError::Incomplete);
    }
    let (param_set_count, n) = read_lenc_int(&payload[offset..])?;
    if param_set_count.is_none() {
        return Err(DecodeError::Malformed("parameter_set_count is NULL"));
    }
    offset += n;

    // Skipping parameter metadata and values would require decoding the
    // binary protocol; the flow logic skips such commands instead.
    if param_count > 0 {
        return Err(DecodeError::ParameterizedQuery(param_count));
    }

    if offset >= payload.len() {
        return Err(DecodeError::Incomplete);
    }
    Ok(&payload[offset..])
}
