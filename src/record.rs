//! Fortune record delimiter protocol.
//!
//! A record is the text between two lines containing only `%`. A lookahead
//! chunk read from an arbitrary offset usually starts mid-record, so the first
//! complete record is the one opened by the first `\n%\n` in the chunk. The
//! exception is a chunk read from the very start of a file, which may open
//! directly with `%\n`.

use std::ops::Range;

use crate::constants::picker::{LEADING_DELIMITER, RECORD_DELIMITER};

/// Why a chunk yielded no record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordMiss {
    /// No opening delimiter in the chunk.
    NoStart,
    /// An opening delimiter but no terminating one within the chunk.
    NoEnd,
}

/// Locate the first complete record in `chunk`.
///
/// `at_file_start` must be true only when `chunk` was read from byte 0 of the
/// file. The returned range excludes both delimiters.
pub fn record_bounds(chunk: &[u8], at_file_start: bool) -> Result<Range<usize>, RecordMiss> {
    let start = if at_file_start && chunk.starts_with(LEADING_DELIMITER) {
        LEADING_DELIMITER.len()
    } else {
        find(chunk, RECORD_DELIMITER, 0).ok_or(RecordMiss::NoStart)? + RECORD_DELIMITER.len()
    };
    let end = find(chunk, RECORD_DELIMITER, start).ok_or(RecordMiss::NoEnd)?;
    Ok(start..end)
}

/// Byte offset of the first `needle` in `haystack` at or after `from`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
