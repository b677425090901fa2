//! Extracts the CANM animation resource embedded in a CAS container and packs a (possibly
//! resized) replacement back, shifting the container's string offsets by the size change.
//!
//! ```no_run
//! use cas::CasProcessor;
//!
//! let processor = CasProcessor::new();
//! let unpacked = processor.unpack("hero.CAS")?;
//! // ... edit `hero.CANM` ...
//! let packed = processor.pack(&unpacked.output)?;
//! println!("shifted {} offsets", packed.repack.total().shifted);
//! # Ok::<(), cas::CasError>(())
//! ```

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

pub use boundary::{BoundaryStrategy, FixedEnd, StringReferenceScan};
pub use canm_resource::{CanmResource, NameRef, NameTable};
pub use cas_header::{CasHeader, CasTable, TableSpan};
pub use cas_processor::{
    CANM_EXTENSION, CAS_EXTENSION, CasProcessor, ContainerInfo, PackReport, ProcessorSettings,
    RelocatedTable, RepackReport, Repacked, ResourceSpan, TableRelocation, UnpackReport,
};
pub use err::{CasError, Result};
pub use relocate::{RelocationMode, RelocationStats, relocate};
pub use signature::{
    CANM_MAGIC, CAS_MAGIC, SUPPORTED_VERSION, validate_container, validate_embedded,
};
pub use utils::read_terminated_utf16;

pub mod boundary;
pub mod canm_resource;
pub mod cas_header;
mod cas_processor;
pub mod err;
pub mod relocate;
pub mod signature;

mod utils;
