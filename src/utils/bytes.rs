//! Byte-slice utilities for bounds-oriented parsing and patching.
//!
//! Every read takes the buffer and an explicit offset, nothing here tracks a cursor.
//!
//! There are two layers:
//! - **Option layer** (`read_*`): zero-cost helpers that return `Option<T>`.
//! - **Result layer** (`*_r`): wrappers that map `None` to `CasError::Truncated`.
//!
//! Design notes:
//! - All numeric reads and writes are **little-endian** (CAS/CANM data is LE).
//! - Offsets are `usize` and are interpreted relative to the slice you pass in.
//! - On-disk offsets are 32-bit. Use [`resolve`] to add a signed on-disk offset to a base
//!   position; it never wraps and rejects results outside the buffer.
//!
//! Example (fixed-size header parsing):
//!
//! ```ignore
//! use crate::utils::bytes;
//!
//! let _ = bytes::slice_r(buf, 0, 0x2C, "CAS header")?;
//! let magic = bytes::read_sig_r(buf, 0, "CAS magic")?;
//! let start = bytes::read_u32_le_r(buf, 0x08, "CANM start")?;
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::err::{CasError, Result};

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read a 4-byte signature at `offset`.
pub(crate) fn read_sig(buf: &[u8], offset: usize) -> Option<[u8; 4]> {
    read_array::<4>(buf, offset)
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    Some(LittleEndian::read_u16(&read_array::<2>(buf, offset)?))
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(LittleEndian::read_u32(&read_array::<4>(buf, offset)?))
}

/// Read an `i32` (little-endian) at `offset`.
pub(crate) fn read_i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    Some(LittleEndian::read_i32(&read_array::<4>(buf, offset)?))
}

#[inline]
fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> CasError {
    CasError::Truncated {
        what,
        offset: offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read a 4-byte signature at `offset`, or return `CasError::Truncated`.
pub(crate) fn read_sig_r(buf: &[u8], offset: usize, what: &'static str) -> Result<[u8; 4]> {
    read_sig(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

/// Read a `u32` (little-endian) at `offset`, or return `CasError::Truncated`.
pub(crate) fn read_u32_le_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u32> {
    read_u32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

/// Read an `i32` (little-endian) at `offset`, or return `CasError::Truncated`.
pub(crate) fn read_i32_le_r(buf: &[u8], offset: usize, what: &'static str) -> Result<i32> {
    read_i32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

/// Overwrite the `u32` (little-endian) at `offset`, or return `CasError::Truncated`.
pub(crate) fn write_u32_le_r(
    buf: &mut [u8],
    offset: usize,
    value: u32,
    what: &'static str,
) -> Result<()> {
    let len = buf.len();
    let end = offset
        .checked_add(4)
        .ok_or_else(|| truncated(what, offset, 4, len))?;
    let dst = buf
        .get_mut(offset..end)
        .ok_or_else(|| truncated(what, offset, 4, len))?;
    LittleEndian::write_u32(dst, value);
    Ok(())
}

/// Convert an on-disk `u32` offset or count into a `usize`.
pub(crate) fn u32_to_usize(value: u32, what: &'static str, len: usize) -> Result<usize> {
    usize::try_from(value).map_err(|_| CasError::OffsetOutOfBounds {
        what,
        offset: i64::from(value),
        len,
    })
}

/// Add a signed on-disk offset to `base`, requiring the result to land inside `buf`.
pub(crate) fn resolve(buf: &[u8], base: usize, relative: i64, what: &'static str) -> Result<usize> {
    let out_of_bounds = || CasError::OffsetOutOfBounds {
        what,
        offset: (base as i64).saturating_add(relative),
        len: buf.len(),
    };

    let base = i64::try_from(base).map_err(|_| out_of_bounds())?;
    let target = base.checked_add(relative).ok_or_else(out_of_bounds)?;
    let target = usize::try_from(target).map_err(|_| out_of_bounds())?;
    if target > buf.len() {
        return Err(out_of_bounds());
    }
    Ok(target)
}

/// Position of entry `index` in a table of `stride`-sized entries starting at `start`.
pub(crate) fn entry_offset(
    start: usize,
    index: usize,
    stride: usize,
    what: &'static str,
) -> Result<usize> {
    index
        .checked_mul(stride)
        .and_then(|rel| start.checked_add(rel))
        .ok_or(CasError::EntryOffsetOverflow {
            what,
            start,
            index,
            stride,
        })
}
