//! Final-PDF validation (spec.md §4.7): a candidate output is valid iff it
//! exists, is at least `minPdfSizeBytes` long, and starts with `%PDF-`. Any
//! I/O error while checking counts as invalid.

use ocrflow_protocol::defaults::PDF_MAGIC;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub fn is_valid_pdf(path: &Path, min_size_bytes: u64) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if meta.len() < min_size_bytes {
        return false;
    }
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut head = [0u8; 5];
    match file.read_exact(&mut head) {
        Ok(()) => head == *PDF_MAGIC,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn valid_pdf_passes() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7 rest of file padding to satisfy min size.........").unwrap();
        f.flush().unwrap();
        assert!(is_valid_pdf(f.path(), 10));
    }

    #[test]
    fn too_small_fails() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-").unwrap();
        f.flush().unwrap();
        assert!(!is_valid_pdf(f.path(), 1024));
    }

    #[test]
    fn wrong_magic_fails() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"not a pdf at all, padded out long enough.........").unwrap();
        f.flush().unwrap();
        assert!(!is_valid_pdf(f.path(), 10));
    }

    #[test]
    fn missing_file_fails() {
        assert!(!is_valid_pdf(Path::new("/does/not/exist.pdf"), 0));
    }
}
