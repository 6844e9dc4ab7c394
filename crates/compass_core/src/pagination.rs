//! Opaque offset cursors and page metadata.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{CompassError, Result};

const CURSOR_PREFIX: &str = "DpKtJ4j9jDq";

/// Upper bound accepted by the paged listing operations.
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub start_cursor: String,
    pub end_cursor: String,
    pub has_next_page: bool,
}

impl Page {
    /// Page info for `returned` items read at `offset` out of `total`.
    pub fn at_offset(cursor: &str, offset: i64, page_size: i64, returned: usize, total: i64) -> Self {
        let has_next_page = total > offset + returned as i64;
        Self {
            start_cursor: cursor.to_string(),
            end_cursor: if has_next_page {
                encode_next_offset_cursor(offset, page_size)
            } else {
                String::new()
            },
            has_next_page,
        }
    }
}

pub fn encode_next_offset_cursor(offset: i64, page_size: i64) -> String {
    STANDARD.encode(format!("{CURSOR_PREFIX}{}", offset + page_size))
}

/// Empty cursor means the first page.
pub fn decode_offset_cursor(cursor: &str) -> Result<i64> {
    if cursor.is_empty() {
        return Ok(0);
    }
    let raw = STANDARD
        .decode(cursor)
        .map_err(|e| CompassError::InvalidData(format!("cursor is not correct: {e}")))?;
    let raw = String::from_utf8(raw)
        .map_err(|_| CompassError::InvalidData("cursor is not correct".into()))?;
    let offset = raw
        .strip_prefix(CURSOR_PREFIX)
        .ok_or_else(|| CompassError::InvalidData("cursor is not correct".into()))?
        .parse::<i64>()
        .map_err(|e| CompassError::InvalidData(format!("cursor is not correct: {e}")))?;
    if offset < 0 {
        return Err(CompassError::InvalidData(
            "cursor is not correct: offset cannot be negative".into(),
        ));
    }
    Ok(offset)
}

pub fn validate_page_size(page_size: i64) -> Result<()> {
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(CompassError::InvalidData(format!(
            "page size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}
