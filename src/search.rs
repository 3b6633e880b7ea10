//! Range index search.
//!
//! The index is a table of 7-byte records sorted by range start. The search
//! below narrows asymmetrically and, when the upper bound cannot move, steps
//! back one whole record. That tie-break decides which of two adjacent
//! ranges owns a boundary address and must stay exactly as written.

use crate::bytes::{read_offset24, read_u32_le, INDEX_RECORD_LEN};

/// Find the data record for `target` in the index table `[start, end)`.
///
/// Returns the offset of the data record whose range contains `target`, or
/// `None` when the address falls after the end of the candidate range or the
/// index points outside the buffer.
pub(crate) fn search(buf: &[u8], start: usize, end: usize, target: u32) -> Option<usize> {
    let record = candidate(buf, start, end, target)?;
    let data = read_offset24(buf, record + 4)?;
    let range_end = read_u32_le(buf, data)?;
    if target > range_end {
        return None;
    }
    Some(data)
}

/// Locate the last index record whose range start is not above `target`.
fn candidate(buf: &[u8], start: usize, end: usize, target: u32) -> Option<usize> {
    if start >= end {
        return None;
    }
    let (mut lo, mut hi) = (start, end);
    let mut mid = lo;
    while lo < hi {
        mid = middle(lo, hi);
        match probe(buf, mid) {
            Some(addr) if target > addr => lo = mid,
            Some(addr) if target == addr => break,
            _ => {
                if hi == mid {
                    hi -= INDEX_RECORD_LEN;
                    mid = hi;
                } else {
                    hi = mid;
                }
            }
        }
    }
    Some(mid)
}

/// Offset of the record halfway between `lo` and `hi`, at least one record past `lo`.
#[inline]
fn middle(lo: usize, hi: usize) -> usize {
    let records = ((hi - lo) / INDEX_RECORD_LEN / 2).max(1);
    lo + records * INDEX_RECORD_LEN
}

/// Range start of the index record at `offset`.
///
/// A record lying past the end of the buffer reads as `None`, which orders
/// after every address. Any other offset is read as a record. That is right
/// for files whose header index end points at the final record. With an
/// exclusive index end followed by more data, the bytes at `end` are read
/// as a record too.
#[inline]
fn probe(buf: &[u8], offset: usize) -> Option<u32> {
    if offset.checked_add(INDEX_RECORD_LEN)? > buf.len() {
        return None;
    }
    read_u32_le(buf, offset)
}
