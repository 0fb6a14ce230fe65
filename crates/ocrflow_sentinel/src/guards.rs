//! Input guards (spec.md §4.2): size cap, magic-signature check, free-disk
//! precheck. Evaluated in order; the first failure short-circuits the rest.

use ocrflow_protocol::defaults::{MAX_PAYLOAD_PEEK, RAR4_MAGIC, RAR5_MAGIC, ZIP_MAGIC};
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardFailure {
    /// `input_rejected_size`
    Size,
    /// `input_rejected_signature`
    Signature,
    /// `disk_error`
    DiskError,
}

impl GuardFailure {
    pub fn error_tag(self) -> &'static str {
        match self {
            GuardFailure::Size => ocrflow_protocol::types::error_tag::INPUT_REJECTED_SIZE,
            GuardFailure::Signature => ocrflow_protocol::types::error_tag::INPUT_REJECTED_SIGNATURE,
            GuardFailure::DiskError => ocrflow_protocol::types::error_tag::DISK_ERROR,
        }
    }
}

/// Size check: `sizeBytes <= maxInputSizeMB * 1_048_576`.
pub fn check_size(size_bytes: u64, max_bytes: u64) -> Result<(), GuardFailure> {
    if size_bytes <= max_bytes {
        Ok(())
    } else {
        Err(GuardFailure::Size)
    }
}

/// Magic-signature check: first bytes match ZIP, RAR4, or RAR5.
pub fn check_signature(path: &Path) -> Result<(), GuardFailure> {
    let mut file = File::open(path).map_err(|_| GuardFailure::Signature)?;
    let mut buf = [0u8; MAX_PAYLOAD_PEEK];
    let n = file.read(&mut buf).map_err(|_| GuardFailure::Signature)?;
    let head = &buf[..n];
    if head.starts_with(ZIP_MAGIC) || head.starts_with(RAR4_MAGIC) || head.starts_with(RAR5_MAGIC) {
        Ok(())
    } else {
        Err(GuardFailure::Signature)
    }
}

/// Free-disk precheck at the work-directory mount: `free >= size *
/// diskFreeFactor`. Fails open (admits the file) if probing itself errors.
pub fn check_free_disk(mount_path: &Path, size_bytes: u64, disk_free_factor: f64) -> Result<(), GuardFailure> {
    let required = (size_bytes as f64 * disk_free_factor) as u64;
    match fs2::available_space(mount_path) {
        Ok(free) => {
            if free >= required {
                Ok(())
            } else {
                Err(GuardFailure::DiskError)
            }
        }
        Err(_) => Ok(()),
    }
}

/// Runs all three guards in spec order, returning the first failure.
pub fn check_all(
    path: &Path,
    size_bytes: u64,
    max_bytes: u64,
    mount_path: &Path,
    disk_free_factor: f64,
) -> Result<(), GuardFailure> {
    check_size(size_bytes, max_bytes)?;
    check_signature(path)?;
    check_free_disk(mount_path, size_bytes, disk_free_factor)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn size_exactly_at_cap_is_accepted() {
        assert!(check_size(1_048_576, 1_048_576).is_ok());
    }

    #[test]
    fn size_one_byte_over_cap_is_rejected() {
        assert_eq!(check_size(1_048_577, 1_048_576), Err(GuardFailure::Size));
    }

    #[test]
    fn zip_signature_is_accepted() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&[0x50, 0x4B, 0x03, 0x04, 0, 0, 0]).unwrap();
        f.flush().unwrap();
        assert!(check_signature(f.path()).is_ok());
    }

    #[test]
    fn rar5_signature_is_accepted() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01, 0x00]).unwrap();
        f.flush().unwrap();
        assert!(check_signature(f.path()).is_ok());
    }

    #[test]
    fn unrecognized_signature_is_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"not an archive").unwrap();
        f.flush().unwrap();
        assert_eq!(check_signature(f.path()), Err(GuardFailure::Signature));
    }

    #[test]
    fn free_disk_fails_open_on_probe_error() {
        let bogus = Path::new("/this/path/does/not/exist/at/all");
        assert!(check_free_disk(bogus, 100, 2.0).is_ok());
    }
}
