use log::error;

use crate::err::{CasError, Result};
use crate::utils::bytes;

pub const CAS_MAGIC: [u8; 4] = *b"CAS\x00";
pub const CANM_MAGIC: [u8; 4] = *b"CANM";
pub const SUPPORTED_VERSION: i32 = 515;

/// Checks the CAS magic at offset 0 and the version that follows it.
pub fn validate_container(buf: &[u8]) -> Result<()> {
    let found = bytes::read_sig_r(buf, 0, "CAS magic")?;
    if found != CAS_MAGIC {
        error!("CAS invalid file signature: {:02X?}", found);
        return Err(CasError::InvalidContainerMagic {
            expected: CAS_MAGIC,
            found,
        });
    }

    let version = bytes::read_i32_le_r(buf, 4, "CAS version")?;
    if version != SUPPORTED_VERSION {
        error!("Unsupported game version: {}", version);
        return Err(CasError::UnsupportedVersion {
            found: version,
            supported: SUPPORTED_VERSION,
        });
    }

    Ok(())
}

/// Checks that a CANM resource starts at `position`.
pub fn validate_embedded(buf: &[u8], position: usize) -> Result<()> {
    let found = bytes::read_sig_r(buf, position, "CANM magic")?;
    if found != CANM_MAGIC {
        error!(
            "CANM invalid file signature at 0x{:08x}: {:02X?}",
            position, found
        );
        return Err(CasError::InvalidEmbeddedMagic {
            offset: position as u64,
            expected: CANM_MAGIC,
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(magic: &[u8; 4], version: i32) -> Vec<u8> {
        let mut buf = magic.to_vec();
        buf.extend_from_slice(&version.to_le_bytes());
        buf
    }

    #[test]
    fn test_accepts_supported_container() {
        assert!(validate_container(&header(&CAS_MAGIC, 515)).is_ok());
    }

    #[test]
    fn test_rejects_bad_magic_before_reading_version() {
        let err = validate_container(&header(b"CAS1", 515)).unwrap_err();
        assert!(matches!(
            err,
            CasError::InvalidContainerMagic { found, .. } if &found == b"CAS1"
        ));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_rejects_other_versions() {
        let err = validate_container(&header(&CAS_MAGIC, 514)).unwrap_err();
        assert!(matches!(err, CasError::UnsupportedVersion { found: 514, .. }));
    }

    #[test]
    fn test_short_container_is_truncated_not_format_error() {
        let err = validate_container(b"CA").unwrap_err();
        assert!(matches!(err, CasError::Truncated { .. }));
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_embedded_magic_at_position() {
        let mut buf = vec![0_u8; 8];
        buf.extend_from_slice(&CANM_MAGIC);
        assert!(validate_embedded(&buf, 8).is_ok());

        let err = validate_embedded(&buf, 4).unwrap_err();
        assert!(matches!(err, CasError::InvalidEmbeddedMagic { offset: 4, .. }));
    }
}
