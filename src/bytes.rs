//! Bounds-checked little-endian reads over the raw database buffer.
//!
//! Every multi-byte field on disk is little-endian. Each reader returns `None`
//! when the field would extend past the end of the buffer, so callers can
//! fail closed instead of indexing out of bounds.

/// Length of one index record: a 4-byte range start and a 24-bit pointer.
pub const INDEX_RECORD_LEN: usize = 7;

/// Maximum number of bytes scanned when looking for a string terminator.
pub const MAX_STRING_LEN: usize = 1024;

/// Read a little-endian `u32` at `offset`.
#[inline]
pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes: [u8; 4] = buf.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Read a 24-bit little-endian offset at `offset`.
///
/// This is the on-disk pointer encoding: the low three bytes of a
/// little-endian `u32` with the high byte forced to zero. Only the three
/// pointer bytes need to be in bounds.
#[inline]
pub fn read_offset24(buf: &[u8], offset: usize) -> Option<usize> {
    let end = offset.checked_add(3)?;
    let [b0, b1, b2]: [u8; 3] = buf.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes([b0, b1, b2, 0]) as usize)
}

/// Read a zero-terminated string starting at `offset`.
///
/// The terminator must appear within [`MAX_STRING_LEN`] bytes and inside the
/// buffer. The returned slice excludes the terminator.
#[inline]
pub fn read_cstr(buf: &[u8], offset: usize) -> Option<&[u8]> {
    let rest = buf.get(offset..)?;
    let window = &rest[..rest.len().min(MAX_STRING_LEN)];
    let len = memchr::memchr(0, window)?;
    Some(&rest[..len])
}
