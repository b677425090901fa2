//! Name tables of an embedded CANM resource.
//!
//! A CANM resource carries no length field. What can be read without understanding the
//! animation data itself are two tables whose entries point (relative to the entry) at
//! NUL-terminated UTF-16LE names:
//!
//! | table     | (count, offset) at | stride | name offset field |
//! |-----------|--------------------|--------|-------------------|
//! | animation | +0x08 / +0x0C      | 0x1C   | +0x04             |
//! | bone      | +0x18 / +0x1C      | 0x04   | +0x00             |

use log::trace;
use serde::Serialize;

use crate::err::Result;
use crate::utils::{bytes, read_terminated_utf16};

pub const ANIMATION_TABLE_HEADER: usize = 0x08;
pub const ANIMATION_ENTRY_SIZE: usize = 0x1C;
pub const ANIMATION_NAME_FIELD: usize = 0x04;

pub const BONE_TABLE_HEADER: usize = 0x18;
pub const BONE_ENTRY_SIZE: usize = 0x04;
pub const BONE_NAME_FIELD: usize = 0x00;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameTable {
    Animation,
    Bone,
}

impl NameTable {
    fn layout(self) -> (usize, usize, usize) {
        match self {
            NameTable::Animation => (
                ANIMATION_TABLE_HEADER,
                ANIMATION_ENTRY_SIZE,
                ANIMATION_NAME_FIELD,
            ),
            NameTable::Bone => (BONE_TABLE_HEADER, BONE_ENTRY_SIZE, BONE_NAME_FIELD),
        }
    }
}

/// A single name referenced from a CANM table entry. All offsets are absolute.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct NameRef {
    pub table: NameTable,
    pub index: usize,
    pub entry_offset: usize,
    pub string_offset: usize,
    /// Offset just past the string's terminator.
    pub string_end: usize,
    pub name: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CanmResource {
    pub start: usize,
    pub animations: Vec<NameRef>,
    pub bones: Vec<NameRef>,
}

impl CanmResource {
    /// Reads both name tables of the resource starting at `start`.
    pub fn parse(buf: &[u8], start: usize) -> Result<CanmResource> {
        let mut animations = vec![];
        let mut bones = vec![];

        walk_name_refs(buf, start, |name_ref| match name_ref.table {
            NameTable::Animation => animations.push(name_ref),
            NameTable::Bone => bones.push(name_ref),
        })?;

        Ok(CanmResource {
            start,
            animations,
            bones,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &NameRef> {
        self.animations.iter().chain(self.bones.iter())
    }
}

/// Visits every name reference, animation table first, then bones, in entry order.
pub fn walk_name_refs(
    buf: &[u8],
    start: usize,
    mut visit: impl FnMut(NameRef),
) -> Result<()> {
    for table in [NameTable::Animation, NameTable::Bone] {
        let (header, stride, name_field) = table.layout();

        let count = bytes::read_u32_le_r(buf, start + header, "CANM table count")?;
        let count = bytes::u32_to_usize(count, "CANM table count", buf.len())?;
        let offset = bytes::read_i32_le_r(buf, start + header + 4, "CANM table offset")?;
        let table_start = bytes::resolve(buf, start, i64::from(offset), "CANM table offset")?;

        trace!(
            "CANM {:?} table: {} entries at 0x{:08x}",
            table, count, table_start
        );

        for index in 0..count {
            let entry_offset = bytes::entry_offset(table_start, index, stride, "CANM entry")?;
            let relative =
                bytes::read_i32_le_r(buf, entry_offset + name_field, "CANM name offset")?;
            let string_offset =
                bytes::resolve(buf, entry_offset, i64::from(relative), "CANM name offset")?;
            let (name, string_end) = read_terminated_utf16(buf, string_offset)?;

            visit(NameRef {
                table,
                index,
                entry_offset,
                string_offset,
                string_end,
                name,
            });
        }
    }

    Ok(())
}
