//! Domain types for the job record, profile, and on-disk index (spec.md §3).

use chrono::{DateTime, Utc};
use ocrflow_ids::{FileHash, JobKey, ProfileHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Persisted job state. Variant names serialize `SCREAMING_SNAKE_CASE`,
/// matching spec.md §3's `{DISCOVERED, PREP_SUBMITTED, ...}` enumeration
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Discovered,
    PrepSubmitted,
    PrepRunning,
    PrepTimeout,
    PrepError,
    PrepDone,
    OcrSubmitted,
    OcrRunning,
    OcrTimeout,
    OcrError,
    Done,
    ErrorPrep,
    ErrorOcr,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::ErrorPrep | JobState::ErrorOcr)
    }
}

/// `ocr` sub-mapping of a profile (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrProfile {
    /// Normalized `+`-joined, deduped, sorted language set (e.g. `"eng+fra"`).
    pub lang: String,
    pub rotate_pages: bool,
    pub deskew: bool,
    pub optimize: u8,
    /// Copied verbatim from the OCR worker's `/info` payload.
    pub versions: BTreeMap<String, String>,
}

/// `prep` sub-mapping of a profile (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepProfile {
    /// Copied verbatim from the PREP worker's `/info` payload.
    pub versions: BTreeMap<String, String>,
}

/// Processing parameters and tool-version fingerprints snapshotted at job
/// creation time. `profileHash` is the SHA-256 of this value's canonical
/// JSON (see `fingerprint::stable_json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub ocr: OcrProfile,
    pub prep: PrepProfile,
}

/// The on-disk `work/<jobKey>/state.json` record. Every field spec.md §3
/// lists is represented; fields that are "not always present" (`rawPdf`,
/// `finalPdf`, `message`, `error`) are `Option`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateJob {
    pub job_key: JobKey,
    pub file_hash: FileHash,
    pub profile_hash: ProfileHash,
    pub profile: Profile,
    pub input_name: String,
    pub input_path: PathBuf,
    pub state: JobState,
    #[serde(default)]
    pub attempt_prep: u32,
    #[serde(default)]
    pub attempt_ocr: u32,
    #[serde(default)]
    pub raw_pdf: Option<PathBuf>,
    #[serde(default)]
    pub final_pdf: Option<PathBuf>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StateJob {
    /// Merge a sparse patch into this record, stamping `updatedAt`. Mirrors
    /// the "merge-then-atomic-write" contract of spec.md §4.3; since the
    /// Rust rendering is a total record rather than a dynamic mapping, the
    /// patch is itself a `StateJobPatch` with only the mutated fields set.
    pub fn apply_patch(&mut self, patch: StateJobPatch, now: DateTime<Utc>) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(v) = patch.attempt_prep {
            self.attempt_prep = v;
        }
        if let Some(v) = patch.attempt_ocr {
            self.attempt_ocr = v;
        }
        if let Some(v) = patch.raw_pdf {
            self.raw_pdf = v;
        }
        if let Some(v) = patch.final_pdf {
            self.final_pdf = v;
        }
        if let Some(v) = patch.message {
            self.message = v;
        }
        if let Some(v) = patch.error {
            self.error = v;
        }
        self.updated_at = now;
    }
}

/// A sparse update to a `StateJob`. `Some(None)` clears an optional field;
/// `None` leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct StateJobPatch {
    pub state: Option<JobState>,
    pub attempt_prep: Option<u32>,
    pub attempt_ocr: Option<u32>,
    pub raw_pdf: Option<Option<PathBuf>>,
    pub final_pdf: Option<Option<PathBuf>>,
    pub message: Option<Option<String>>,
    pub error: Option<Option<String>>,
}

impl StateJobPatch {
    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(Some(message.into()));
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn with_attempt_prep(mut self, attempt: u32) -> Self {
        self.attempt_prep = Some(attempt);
        self
    }

    pub fn with_attempt_ocr(mut self, attempt: u32) -> Self {
        self.attempt_ocr = Some(attempt);
        self
    }

    pub fn with_raw_pdf(mut self, path: PathBuf) -> Self {
        self.raw_pdf = Some(Some(path));
        self
    }

    pub fn with_final_pdf(mut self, path: PathBuf) -> Self {
        self.final_pdf = Some(Some(path));
        self
    }
}

/// One entry of the global `index.json` (spec.md §3): `jobKey → summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub job_key: JobKey,
    pub state: JobState,
    pub input_name: String,
    #[serde(default)]
    pub out_pdf: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
}

/// `jobKey → IndexEntry`. A `BTreeMap` keyed by the string form of `JobKey`
/// gives byte-stable key ordering on every atomic rewrite, which keeps
/// `index.json` diffs small and deterministic across restarts.
pub type Index = BTreeMap<String, IndexEntry>;

/// Outcome of `safeLoadJSON` (spec.md §4.3): never propagates a decode
/// failure as a hard error, so the tick can log-and-continue.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Absent,
    Corrupt(String),
    Loaded(T),
}

impl<T> LoadOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(v) => Some(v),
            LoadOutcome::Absent | LoadOutcome::Corrupt(_) => None,
        }
    }
}

/// Decisions a human can write to `hold/duplicates/<jobKey>/decision.json`
/// (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateAction {
    UseExistingResult,
    Discard,
    ForceReprocess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateDecision {
    pub action: DuplicateAction,
    /// Required for `FORCE_REPROCESS`; truncated to its first 8 hex chars
    /// when building the `__force-<nonce[:8]>` suffix.
    #[serde(default)]
    pub nonce: Option<String>,
}

/// The `status.json` written alongside a quarantined duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateState {
    DuplicatePending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateStatus {
    pub state: DuplicateState,
    pub job_key: JobKey,
    pub created_at: DateTime<Utc>,
}

/// Metadata about the incoming (colliding) file, embedded in the duplicate
/// report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingFileMeta {
    pub input_name: String,
    pub size_bytes: u64,
    pub discovered_at: DateTime<Utc>,
}

/// `reports/duplicates/<jobKey>.json` (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub job_key: JobKey,
    pub incoming: IncomingFileMeta,
    pub existing: IndexEntry,
    pub profile: Profile,
    pub actions: Vec<DuplicateAction>,
}

/// Error taxonomy tags recorded in `state.json`/`error` (spec.md §7).
pub mod error_tag {
    pub const INPUT_REJECTED_SIZE: &str = "input_rejected_size";
    pub const INPUT_REJECTED_SIGNATURE: &str = "input_rejected_signature";
    pub const DISK_ERROR: &str = "disk_error";
    pub const PDF_INVALID: &str = "pdf_invalid";
    pub const MAX_ATTEMPTS_AFTER_RESTART: &str = "max_attempts_after_restart";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&JobState::ErrorPrep).unwrap();
        assert_eq!(json, "\"ERROR_PREP\"");
        let json = serde_json::to_string(&JobState::PrepRunning).unwrap();
        assert_eq!(json, "\"PREP_RUNNING\"");
    }

    #[test]
    fn duplicate_action_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&DuplicateAction::ForceReprocess).unwrap();
        assert_eq!(json, "\"FORCE_REPROCESS\"");
    }
}
