use log::{debug, info, warn};
use serde::Serialize;

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::boundary::{BoundaryStrategy, StringReferenceScan};
use crate::canm_resource::CanmResource;
use crate::cas_header::{CasHeader, CasTable, TableSpan, read_resource_start};
use crate::err::{CasError, Result};
use crate::relocate::{RelocationMode, RelocationStats, relocate};
use crate::signature::{CANM_MAGIC, validate_container, validate_embedded};

pub const CANM_EXTENSION: &str = "CANM";
pub const CAS_EXTENSION: &str = "CAS";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProcessorSettings {
    relocate_all: bool,
    canm_extension: String,
    cas_extension: String,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        ProcessorSettings {
            relocate_all: false,
            canm_extension: CANM_EXTENSION.to_owned(),
            cas_extension: CAS_EXTENSION.to_owned(),
        }
    }
}

impl ProcessorSettings {
    pub fn new() -> Self {
        ProcessorSettings::default()
    }

    /// When set, every entry of the relocated tables is shifted, not only the ones pointing
    /// at or past the old end of the resource.
    pub fn relocate_all(mut self, relocate_all: bool) -> Self {
        self.relocate_all = relocate_all;
        self
    }

    /// Extension given to extracted resources.
    pub fn canm_extension(mut self, extension: impl Into<String>) -> Self {
        self.canm_extension = extension.into();
        self
    }

    /// Extension of the container a resource is packed back into.
    pub fn cas_extension(mut self, extension: impl Into<String>) -> Self {
        self.cas_extension = extension.into();
        self
    }

    pub fn should_relocate_all(&self) -> bool {
        self.relocate_all
    }

    pub fn get_canm_extension(&self) -> &str {
        &self.canm_extension
    }

    pub fn get_cas_extension(&self) -> &str {
        &self.cas_extension
    }
}

/// Absolute byte range `[start, end)` of the embedded resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct ResourceSpan {
    pub start: usize,
    pub end: usize,
}

impl ResourceSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocatedTable {
    Header(CasTable),
    McAnimation { group: usize },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct TableRelocation {
    pub table: RelocatedTable,
    pub span: TableSpan,
    pub stats: RelocationStats,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RepackReport {
    pub resource_start: usize,
    pub old_len: usize,
    pub new_len: usize,
    pub delta: i64,
    pub mode: RelocationMode,
    pub tables: Vec<TableRelocation>,
}

impl RepackReport {
    pub fn total(&self) -> RelocationStats {
        let mut total = RelocationStats::default();
        for table in &self.tables {
            total.merge(table.stats);
        }
        total
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Repacked {
    pub data: Vec<u8>,
    pub report: RepackReport,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct UnpackReport {
    pub container: PathBuf,
    pub output: PathBuf,
    pub span: ResourceSpan,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct PackReport {
    pub container: PathBuf,
    pub replacement: PathBuf,
    pub repack: RepackReport,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ContainerInfo {
    pub header: CasHeader,
    pub mc_animation_tables: Vec<TableSpan>,
    pub resource: ResourceSpan,
    pub canm: CanmResource,
}

/// Extracts the CANM resource embedded in a CAS container and puts replacements back.
#[derive(Debug, Clone)]
pub struct CasProcessor<B = StringReferenceScan> {
    settings: ProcessorSettings,
    boundary: B,
}

impl Default for CasProcessor {
    fn default() -> Self {
        CasProcessor::new()
    }
}

impl CasProcessor {
    pub fn new() -> Self {
        CasProcessor {
            settings: ProcessorSettings::default(),
            boundary: StringReferenceScan,
        }
    }
}

impl<B: BoundaryStrategy> CasProcessor<B> {
    pub fn with_configuration(mut self, settings: ProcessorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces how the end of the embedded resource is found.
    pub fn with_boundary_strategy<C: BoundaryStrategy>(self, boundary: C) -> CasProcessor<C> {
        CasProcessor {
            settings: self.settings,
            boundary,
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Validates both signatures and locates the embedded resource.
    ///
    /// The span always covers at least the resource's magic.
    pub fn extract(&self, container: &[u8]) -> Result<ResourceSpan> {
        validate_container(container)?;
        let start = read_resource_start(container)?;
        validate_embedded(container, start)?;

        let end = self
            .boundary
            .resource_end(container, start)?
            .max(start + CANM_MAGIC.len());
        if end > container.len() {
            return Err(CasError::OffsetOutOfBounds {
                what: "CANM end",
                offset: end as i64,
                len: container.len(),
            });
        }

        Ok(ResourceSpan { start, end })
    }

    /// Builds a new container image with `replacement` in place of the current resource.
    ///
    /// Nothing is returned unless every table was relocated.
    pub fn repack(&self, container: &[u8], replacement: &[u8]) -> Result<Repacked> {
        let span = self.extract(container)?;
        validate_embedded(replacement, 0)?;

        let old_len = span.len();
        let new_len = replacement.len();
        let delta = signed_len(new_len)? - signed_len(old_len)?;

        let mode = if self.settings.relocate_all {
            RelocationMode::Unconditional
        } else {
            let boundary = u32::try_from(span.end).map_err(|_| CasError::OffsetOutOfBounds {
                what: "CANM end",
                offset: span.end as i64,
                len: container.len(),
            })?;
            RelocationMode::PastBoundary { boundary }
        };

        info!(
            "Cropping CAS file and adjusting for new length by {} ({} -> {} bytes)",
            delta, old_len, new_len
        );

        let trailing = &container[span.end..];
        let mut data = Vec::with_capacity(span.start + new_len + trailing.len());
        data.extend_from_slice(&container[..span.start]);
        data.extend_from_slice(replacement);
        data.extend_from_slice(trailing);

        let header = CasHeader::from_bytes(&data)?;
        let nested = header.mc_animation_tables(&data)?;

        let mut plan: Vec<(RelocatedTable, TableSpan)> = vec![
            (RelocatedTable::Header(CasTable::TControl), header.t_control),
            (RelocatedTable::Header(CasTable::VControl), header.v_control),
            (
                RelocatedTable::Header(CasTable::AnimationGroup),
                header.animation_groups,
            ),
        ];
        plan.extend(
            nested
                .into_iter()
                .enumerate()
                .map(|(group, span)| (RelocatedTable::McAnimation { group }, span)),
        );
        plan.push((RelocatedTable::Header(CasTable::Bone), header.bones));

        debug!("Updating CAS string pointers by {}", delta);
        let mut tables = Vec::with_capacity(plan.len());
        for (table, table_span) in plan {
            if table_span.count > 0 && table_span.start >= span.start {
                warn!(
                    "{:?} table at 0x{:08x} does not lie before the CANM resource, \
                     its own header offset is not adjusted",
                    table, table_span.start
                );
            }

            let stats = relocate(&mut data, table_span, delta, mode)?;
            debug!(
                "{:?}: {} entries at 0x{:08x}, {} shifted",
                table, table_span.count, table_span.start, stats.shifted
            );
            tables.push(TableRelocation {
                table,
                span: table_span,
                stats,
            });
        }

        Ok(Repacked {
            data,
            report: RepackReport {
                resource_start: span.start,
                old_len,
                new_len,
                delta,
                mode,
                tables,
            },
        })
    }

    /// Summarizes the container header, its tables and the resource's names.
    pub fn inspect(&self, container: &[u8]) -> Result<ContainerInfo> {
        let resource = self.extract(container)?;
        let header = CasHeader::from_bytes(container)?;
        let mc_animation_tables = header.mc_animation_tables(container)?;
        let canm = CanmResource::parse(container, resource.start)?;

        Ok(ContainerInfo {
            header,
            mc_animation_tables,
            resource,
            canm,
        })
    }

    /// Writes the resource embedded in the container at `path` next to it.
    ///
    /// The output has the container's name with the CANM extension and is overwritten if it
    /// exists. The container is only read.
    pub fn unpack(&self, path: impl AsRef<Path>) -> Result<UnpackReport> {
        let path = path.as_ref();
        debug!("Unpacking {}", path.display());

        let container = fs::read(path).map_err(|source| CasError::FailedToOpenFile {
            source,
            path: path.to_path_buf(),
        })?;

        let span = self.extract(&container)?;
        let output = path.with_extension(&self.settings.canm_extension);

        debug!(
            "Exporting {} byte CANM file to {}",
            span.len(),
            output.display()
        );
        fs::write(&output, &container[span.start..span.end]).map_err(|source| {
            CasError::FailedToWriteFile {
                source,
                path: output.clone(),
            }
        })?;

        Ok(UnpackReport {
            container: path.to_path_buf(),
            output,
            span,
        })
    }

    /// Packs the resource at `replacement_path` back into its sibling container.
    ///
    /// The container is only written once the new image has been fully built. If writing
    /// fails midway the container is left partially rewritten.
    pub fn pack(&self, replacement_path: impl AsRef<Path>) -> Result<PackReport> {
        let replacement_path = replacement_path.as_ref();
        debug!("Packing {}", replacement_path.display());

        let container_path = self.find_container(replacement_path)?;
        info!("Opening CAS file for wrapping {}", container_path.display());

        let write_err = |source| CasError::FailedToWriteFile {
            source,
            path: container_path.clone(),
        };

        let mut file = File::options()
            .read(true)
            .write(true)
            .open(&container_path)
            .map_err(|e| open_err(e, container_path.as_path()))?;
        let mut container = Vec::new();
        file.read_to_end(&mut container)
            .map_err(|e| open_err(e, container_path.as_path()))?;

        let replacement = fs::read(replacement_path).map_err(|e| open_err(e, replacement_path))?;

        let Repacked { data, report } = self.repack(&container, &replacement)?;

        file.seek(SeekFrom::Start(0)).map_err(write_err)?;
        file.write_all(&data).map_err(write_err)?;
        file.set_len(data.len() as u64).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        debug!("Updating CAS Complete!");

        Ok(PackReport {
            container: container_path,
            replacement: replacement_path.to_path_buf(),
            repack: report,
        })
    }

    /// `<stem>.<cas extension>` if it exists, otherwise a sibling with the same stem whose
    /// extension matches ignoring case.
    fn find_container(&self, replacement_path: &Path) -> Result<PathBuf> {
        let wanted = &self.settings.cas_extension;
        let candidate = replacement_path.with_extension(wanted);
        if candidate.is_file() {
            return Ok(candidate);
        }

        let dir = match replacement_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let stem = replacement_path.file_stem();

        let mut matches: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| CasError::FailedToOpenFile {
                source,
                path: dir.to_path_buf(),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.file_stem() == stem)
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
            })
            .collect();
        matches.sort();

        matches
            .into_iter()
            .next()
            .ok_or(CasError::ContainerNotFound { path: candidate })
    }
}

fn open_err(source: std::io::Error, path: &Path) -> CasError {
    CasError::FailedToOpenFile {
        source,
        path: path.to_path_buf(),
    }
}

fn signed_len(len: usize) -> Result<i64> {
    i64::try_from(len).map_err(|_| CasError::OffsetOutOfBounds {
        what: "resource length",
        offset: i64::MAX,
        len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::FixedEnd;
    use pretty_assertions::assert_eq;

    /// Container from the format notes: CAS header pointing at a bare CANM header at 0x20.
    fn minimal_container() -> Vec<u8> {
        let mut buf = vec![0_u8; 0x20];
        buf[..4].copy_from_slice(&[0x43, 0x41, 0x53, 0x00]);
        buf[4..8].copy_from_slice(&515_i32.to_le_bytes());
        buf[8..12].copy_from_slice(&0x20_u32.to_le_bytes());
        buf.extend_from_slice(&[0x43, 0x41, 0x4E, 0x4D]);
        buf.resize(0x40, 0);
        buf
    }

    #[test]
    fn test_minimal_container_extracts_only_the_magic() {
        let buf = minimal_container();
        assert_eq!(
            StringReferenceScan.resource_end(&buf, 0x20).unwrap(),
            0x20
        );

        let span = CasProcessor::new().extract(&buf).unwrap();
        assert_eq!(span, ResourceSpan { start: 0x20, end: 0x24 });
        assert_eq!(&buf[span.start..span.end], b"CANM");
    }

    #[test]
    fn test_extract_refuses_wrong_resource_magic() {
        let mut buf = minimal_container();
        buf[0x23] = b'X';
        let err = CasProcessor::new().extract(&buf).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_custom_boundary_strategy() {
        let buf = minimal_container();
        let processor = CasProcessor::new().with_boundary_strategy(FixedEnd(0x30));
        assert_eq!(
            processor.extract(&buf).unwrap(),
            ResourceSpan { start: 0x20, end: 0x30 }
        );
    }

    #[test]
    fn test_repack_same_resource_is_identity() {
        let buf = minimal_container();
        let repacked = CasProcessor::new().repack(&buf, b"CANM").unwrap();
        assert_eq!(repacked.data, buf);
        assert_eq!(repacked.report.delta, 0);
        assert_eq!(repacked.report.total().shifted, 0);
    }

    #[test]
    fn test_repack_rejects_replacement_without_magic() {
        let buf = minimal_container();
        let err = CasProcessor::new().repack(&buf, b"NOPE1234").unwrap_err();
        assert!(matches!(err, CasError::InvalidEmbeddedMagic { offset: 0, .. }));
    }

    #[test]
    fn test_repack_grows_container() {
        let buf = minimal_container();
        let replacement = b"CANM\x00\x00\x00\x00";
        let repacked = CasProcessor::new().repack(&buf, replacement).unwrap();

        assert_eq!(repacked.report.delta, 4);
        assert_eq!(repacked.data.len(), buf.len() + 4);
        assert_eq!(&repacked.data[0x20..0x28], replacement);
        assert_eq!(&repacked.data[0x28..], &buf[0x24..]);
    }

    #[test]
    fn test_settings_builder() {
        let settings = ProcessorSettings::new()
            .relocate_all(true)
            .canm_extension("canm")
            .cas_extension("cas");
        assert!(settings.should_relocate_all());
        assert_eq!(settings.get_canm_extension(), "canm");
        assert_eq!(settings.get_cas_extension(), "cas");
        assert_eq!(ProcessorSettings::default().get_cas_extension(), "CAS");
    }
}
