use std::char::{REPLACEMENT_CHARACTER, decode_utf16};

use log::trace;

use crate::err::{CasError, Result};
use crate::utils::bytes;

/// Reads a NUL (0x0000) terminated UTF-16LE string starting at `offset`.
///
/// Returns the decoded text and the offset just past the terminator.
/// A string that runs into the end of `buf` without a terminator is an
/// [`CasError::UnterminatedString`] error, the string does not end at the end of the buffer.
/// Unpaired surrogates are replaced with U+FFFD rather than failing, names are only
/// walked to find where they end.
pub fn read_terminated_utf16(buf: &[u8], offset: usize) -> Result<(String, usize)> {
    let mut units = Vec::new();
    let mut pos = offset;

    loop {
        let unit = bytes::read_u16_le(buf, pos).ok_or(CasError::UnterminatedString {
            offset: offset as u64,
        })?;
        pos += 2;

        if unit == 0 {
            break;
        }
        units.push(unit);
    }

    let s: String = decode_utf16(units)
        .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
        .collect();

    trace!(
        "Offset `0x{offset:08x} ({offset})` read utf16 string {s:?}, next offset 0x{pos:08x}"
    );

    Ok((s, pos))
}
