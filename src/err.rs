use thiserror::Error;

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CasError>;

#[derive(Debug, Error)]
pub enum CasError {
    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open file {}: {}", .path.display(), .source)]
    FailedToOpenFile { source: io::Error, path: PathBuf },

    #[error("Failed to write file {}: {}", .path.display(), .source)]
    FailedToWriteFile { source: io::Error, path: PathBuf },

    #[error("No CAS container found next to {}", .path.display())]
    ContainerNotFound { path: PathBuf },

    /// Errors related to the container and resource signatures.

    #[error("Invalid CAS file signature, expected `{expected:02X?}`, found `{found:02X?}`")]
    InvalidContainerMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("Unsupported CAS version {found}, only version {supported} is supported")]
    UnsupportedVersion { found: i32, supported: i32 },

    #[error(
        "Invalid CANM signature at offset 0x{offset:08x}, expected `{expected:02X?}`, found `{found:02X?}`"
    )]
    InvalidEmbeddedMagic {
        offset: u64,
        expected: [u8; 4],
        found: [u8; 4],
    },

    /// Errors related to walking tables.

    #[error("buffer too small for {what} at offset 0x{offset:x} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("offset {offset} out of bounds for {what} (len={len})")]
    OffsetOutOfBounds {
        what: &'static str,
        offset: i64,
        len: usize,
    },

    #[error("entry {index} of {what} at 0x{start:x} with stride 0x{stride:x} overflows the address space")]
    EntryOffsetOverflow {
        what: &'static str,
        start: usize,
        index: usize,
        stride: usize,
    },

    #[error("string at offset 0x{offset:x} runs past the end of the buffer without a terminator")]
    UnterminatedString { offset: u64 },

    #[error(
        "relocating the value {value:#x} at offset 0x{position:x} by {delta} does not fit in 32 bits"
    )]
    RelocationOverflow { position: u64, value: u32, delta: i64 },
}

impl CasError {
    /// Signature and version mismatches, raised before anything is written.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CasError::InvalidContainerMagic { .. }
                | CasError::UnsupportedVersion { .. }
                | CasError::InvalidEmbeddedMagic { .. }
        )
    }
}
