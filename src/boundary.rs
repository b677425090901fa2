use log::debug;

use crate::canm_resource::walk_name_refs;
use crate::err::{CasError, Result};

/// Decides where an embedded CANM resource ends.
pub trait BoundaryStrategy {
    /// Returns the absolute offset one past the last byte of the resource at `start`.
    fn resource_end(&self, buf: &[u8], start: usize) -> Result<usize>;
}

/// The resource ends where its furthest referenced name ends.
///
/// Walks the animation table and then the bone table, reading every referenced name and
/// keeping the highest offset reached. This only holds while no other trailing data of the
/// resource extends past all of its names.
#[derive(Debug, Default, Copy, Clone)]
pub struct StringReferenceScan;

impl StringReferenceScan {
    /// Like [`BoundaryStrategy::resource_end`], also reporting the running maximum after each
    /// visited name.
    pub fn scan_with(
        &self,
        buf: &[u8],
        start: usize,
        mut on_step: impl FnMut(usize),
    ) -> Result<usize> {
        let mut end = start;
        walk_name_refs(buf, start, |name_ref| {
            end = end.max(name_ref.string_end);
            on_step(end);
        })?;
        Ok(end)
    }
}

impl BoundaryStrategy for StringReferenceScan {
    fn resource_end(&self, buf: &[u8], start: usize) -> Result<usize> {
        let end = self.scan_with(buf, start, |_| {})?;
        debug!(
            "CANM at 0x{:08x} ends at 0x{:08x} (furthest name reference)",
            start, end
        );
        Ok(end)
    }
}

/// A known, authoritative end offset.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FixedEnd(pub usize);

impl BoundaryStrategy for FixedEnd {
    fn resource_end(&self, buf: &[u8], start: usize) -> Result<usize> {
        if self.0 < start || self.0 > buf.len() {
            return Err(CasError::OffsetOutOfBounds {
                what: "fixed CANM end",
                offset: self.0 as i64,
                len: buf.len(),
            });
        }
        Ok(self.0)
    }
}

impl<T: BoundaryStrategy + ?Sized> BoundaryStrategy for &T {
    fn resource_end(&self, buf: &[u8], start: usize) -> Result<usize> {
        (**self).resource_end(buf, start)
    }
}

impl<T: BoundaryStrategy + ?Sized> BoundaryStrategy for Box<T> {
    fn resource_end(&self, buf: &[u8], start: usize) -> Result<usize> {
        (**self).resource_end(buf, start)
    }
}
