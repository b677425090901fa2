use serde::Serialize;

use crate::err::Result;
use crate::utils::bytes;

pub const CAS_HEADER_SIZE: usize = 0x2C;
pub const RESOURCE_START_FIELD: usize = 0x08;
pub const TABLES_FIELD: usize = 0x0C;

/// Animation group entries describe their MC-animation table at these offsets,
/// relative to the entry.
pub const ANIMATION_GROUP_NESTED_FIELD: usize = 0x04;
pub const MC_ANIMATION_ENTRY_SIZE: usize = 0x24;

/// Top level tables listed in the CAS header, in header order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CasTable {
    TControl,
    VControl,
    AnimationGroup,
    Bone,
}

impl CasTable {
    pub const ALL: [CasTable; 4] = [
        CasTable::TControl,
        CasTable::VControl,
        CasTable::AnimationGroup,
        CasTable::Bone,
    ];

    pub fn entry_size(self) -> usize {
        match self {
            CasTable::TControl => 0x0C,
            CasTable::VControl => 0x14,
            CasTable::AnimationGroup => 0x0C,
            CasTable::Bone => 0x04,
        }
    }

    fn header_index(self) -> usize {
        match self {
            CasTable::TControl => 0,
            CasTable::VControl => 1,
            CasTable::AnimationGroup => 2,
            CasTable::Bone => 3,
        }
    }
}

/// `count` entries of `stride` bytes each, starting at the absolute offset `start`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct TableSpan {
    pub count: usize,
    pub start: usize,
    pub stride: usize,
}

impl TableSpan {
    /// Absolute offset of every entry. Does not check the entries against any buffer.
    pub fn entries(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).map(move |i| self.start + i * self.stride)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CasHeader {
    pub version: i32,
    pub resource_start: usize,
    pub t_control: TableSpan,
    pub v_control: TableSpan,
    pub animation_groups: TableSpan,
    pub bones: TableSpan,
}

impl CasHeader {
    /// Reads the fixed header. The signature is not checked here, see
    /// [`crate::validate_container`].
    pub fn from_bytes(buf: &[u8]) -> Result<CasHeader> {
        let _ = bytes::slice_r(buf, 0, CAS_HEADER_SIZE, "CAS header")?;

        let version = bytes::read_i32_le_r(buf, 4, "CAS version")?;
        let resource_start = read_resource_start(buf)?;

        let table = |kind: CasTable| -> Result<TableSpan> {
            let at = TABLES_FIELD + kind.header_index() * 8;
            read_table_span(buf, at, kind.entry_size())
        };

        Ok(CasHeader {
            version,
            resource_start,
            t_control: table(CasTable::TControl)?,
            v_control: table(CasTable::VControl)?,
            animation_groups: table(CasTable::AnimationGroup)?,
            bones: table(CasTable::Bone)?,
        })
    }

    pub fn table(&self, kind: CasTable) -> TableSpan {
        match kind {
            CasTable::TControl => self.t_control,
            CasTable::VControl => self.v_control,
            CasTable::AnimationGroup => self.animation_groups,
            CasTable::Bone => self.bones,
        }
    }

    /// The MC-animation table of every animation group, in group order.
    pub fn mc_animation_tables(&self, buf: &[u8]) -> Result<Vec<TableSpan>> {
        // The count comes from disk, a corrupted one must fail on the first missing entry.
        let mut tables = Vec::new();
        for index in 0..self.animation_groups.count {
            let group = bytes::entry_offset(
                self.animation_groups.start,
                index,
                self.animation_groups.stride,
                "animation group",
            )?;
            let count =
                bytes::read_u32_le_r(buf, group + ANIMATION_GROUP_NESTED_FIELD, "MC-animation count")?;
            let offset = bytes::read_u32_le_r(
                buf,
                group + ANIMATION_GROUP_NESTED_FIELD + 4,
                "MC-animation offset",
            )?;
            let start = bytes::resolve(buf, group, i64::from(offset), "MC-animation offset")?;

            tables.push(TableSpan {
                count: bytes::u32_to_usize(count, "MC-animation count", buf.len())?,
                start,
                stride: MC_ANIMATION_ENTRY_SIZE,
            });
        }
        Ok(tables)
    }
}

/// Absolute offset of the embedded CANM resource.
pub fn read_resource_start(buf: &[u8]) -> Result<usize> {
    let start = bytes::read_u32_le_r(buf, RESOURCE_START_FIELD, "CANM start offset")?;
    bytes::u32_to_usize(start, "CANM start offset", buf.len())
}

fn read_table_span(buf: &[u8], at: usize, stride: usize) -> Result<TableSpan> {
    let count = bytes::read_u32_le_r(buf, at, "CAS table count")?;
    let offset = bytes::read_u32_le_r(buf, at + 4, "CAS table offset")?;

    Ok(TableSpan {
        count: bytes::u32_to_usize(count, "CAS table count", buf.len())?,
        start: bytes::u32_to_usize(offset, "CAS table offset", buf.len())?,
        stride,
    })
}
