//! Fingerprinting (spec.md §4.1): `fileHash`, `canonicalProfile`,
//! `stableJSON`, `makeJobKey`. All four are pure/side-effect-free apart from
//! `file_hash`'s file read.

use crate::error::ProtocolError;
use crate::http_types::ServiceInfo;
use crate::types::{OcrProfile, PrepProfile, Profile};
use ocrflow_ids::{FileHash, JobKey, ProfileHash};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Streamed SHA-256 of a file's bytes, hex-encoded.
pub fn file_hash(path: &Path) -> Result<FileHash, ProtocolError> {
    let file = File::open(path).map_err(|e| ProtocolError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; STREAM_CHUNK_BYTES];
    loop {
        let n = reader.read(&mut buf).map_err(|e| ProtocolError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(FileHash::from_trusted(hex_lower(&digest)))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// Splits a language spec on `+`, dedupes, sorts lexicographically, and
/// rejoins, so `"fra+eng"` and `"eng+fra"` produce byte-identical output.
pub fn normalize_lang(lang: &str) -> String {
    let mut parts: Vec<&str> = lang
        .split('+')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    parts.sort_unstable();
    parts.dedup();
    parts.join("+")
}

/// Builds the canonical profile mapping from the two workers' `/info`
/// payloads, the configured OCR language set, and the configured OCR flags.
/// `versions` is copied verbatim from each service's info payload.
pub fn canonical_profile(
    prep_info: &ServiceInfo,
    ocr_info: &ServiceInfo,
    ocr_lang: &str,
    rotate_pages: bool,
    deskew: bool,
    optimize: u8,
) -> Profile {
    Profile {
        ocr: OcrProfile {
            lang: normalize_lang(ocr_lang),
            rotate_pages,
            deskew,
            optimize,
            versions: ocr_info.versions.clone(),
        },
        prep: PrepProfile {
            versions: prep_info.versions.clone(),
        },
    }
}

/// Canonical JSON: sorted keys, compact separators, UTF-8, non-ASCII
/// left unescaped. Achieved by routing through `serde_json::Value`, whose
/// default (non-`preserve_order`) `Map` is key-sorted, before re-serializing
/// compactly — `serde_json::to_vec` never inserts the pretty-printer's
/// whitespace.
pub fn stable_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let as_value = serde_json::to_value(value).map_err(|e| ProtocolError::Json {
        path: "<in-memory value>".to_string(),
        source: e,
    })?;
    serde_json::to_vec(&as_value).map_err(|e| ProtocolError::Json {
        path: "<in-memory value>".to_string(),
        source: e,
    })
}

/// SHA-256 of a profile's canonical JSON.
pub fn profile_hash(profile: &Profile) -> Result<ProfileHash, ProtocolError> {
    let bytes = stable_json(profile)?;
    let digest = Sha256::digest(&bytes);
    Ok(ProfileHash::from_trusted(hex_lower(&digest)))
}

/// `(profileHash, jobKey)` for a given `(fileHash, profile)` pair.
pub fn make_job_key(
    file_hash: &FileHash,
    profile: &Profile,
) -> Result<(ProfileHash, JobKey), ProtocolError> {
    let p_hash = profile_hash(profile)?;
    let job_key = JobKey::new(file_hash, &p_hash);
    Ok((p_hash, job_key))
}
