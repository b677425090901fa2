//! Shifting stored 32-bit offsets after the embedded resource changed size.
//!
//! Every entry of the relocated tables starts with a stored 32-bit offset.
//!
//! [`RelocationMode::PastBoundary`] reads that value as a container-absolute position and
//! only shifts it when it points at or past the old end of the resource. That is only right
//! for absolute fields. If a container stores these offsets relative to their entry (as the
//! CANM name offsets and the nested MC-animation offsets are), use
//! [`RelocationMode::Unconditional`], which shifts every entry by `delta`.

use log::trace;
use serde::Serialize;

use crate::cas_header::TableSpan;
use crate::err::{CasError, Result};
use crate::utils::bytes;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RelocationMode {
    /// Shift only values `>= boundary` (the old end of the resource). Assumes the stored
    /// values are container-absolute.
    PastBoundary { boundary: u32 },
    /// Shift every entry, wherever it points. Correct for entry-relative values too.
    Unconditional,
}

impl RelocationMode {
    fn applies_to(self, value: u32) -> bool {
        match self {
            RelocationMode::PastBoundary { boundary } => value >= boundary,
            RelocationMode::Unconditional => true,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct RelocationStats {
    pub shifted: usize,
    pub skipped: usize,
}

impl RelocationStats {
    pub fn merge(&mut self, other: RelocationStats) {
        self.shifted += other.shifted;
        self.skipped += other.skipped;
    }
}

/// Adds `delta` to the `u32` stored at the start of every entry of `table`.
///
/// Fails without touching the offending entry if a position falls outside `buf` or the
/// adjusted value does not fit in 32 bits. Entries before it have already been written.
pub fn relocate(
    buf: &mut [u8],
    table: TableSpan,
    delta: i64,
    mode: RelocationMode,
) -> Result<RelocationStats> {
    let mut stats = RelocationStats::default();

    for index in 0..table.count {
        let position = bytes::entry_offset(table.start, index, table.stride, "relocated entry")?;
        let value = bytes::read_u32_le_r(buf, position, "relocated entry")?;

        if delta == 0 || !mode.applies_to(value) {
            stats.skipped += 1;
            continue;
        }

        let adjusted = i64::from(value)
            .checked_add(delta)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(CasError::RelocationOverflow {
                position: position as u64,
                value,
                delta,
            })?;

        trace!(
            "0x{:08x}: 0x{:08x} -> 0x{:08x}",
            position, value, adjusted
        );
        bytes::write_u32_le_r(buf, position, adjusted, "relocated entry")?;
        stats.shifted += 1;
    }

    Ok(stats)
}
