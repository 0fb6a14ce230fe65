//! Stage-worker HTTP contract (spec.md §6). These are the request/response
//! bodies the orchestrator's stage client sends to/receives from the PREP
//! and OCR worker processes; a future stage-worker implementation would
//! depend on this crate to speak the same wire format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// `GET /info` response from either worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub versions: BTreeMap<String, String>,
}

impl ServiceInfo {
    /// Fallback used when `/info` itself fails (spec.md §6): the orchestrator
    /// proceeds rather than blocking startup on a worker's health.
    pub fn unknown(service: &str) -> Self {
        let mut versions = BTreeMap::new();
        versions.insert("unknown".to_string(), "unknown".to_string());
        Self {
            service: service.to_string(),
            versions,
        }
    }
}

/// `POST /jobs/prep` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepSubmitRequest {
    pub job_id: String,
    pub input_path: PathBuf,
    pub work_dir: PathBuf,
}

/// `POST /jobs/ocr` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrSubmitRequest {
    pub job_id: String,
    pub raw_pdf_path: PathBuf,
    pub work_dir: PathBuf,
    pub lang: String,
    pub rotate_pages: bool,
    pub deskew: bool,
    pub optimize: u8,
}

/// A worker's view of job progress, independent of the orchestrator's own
/// persisted `JobState` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Queued,
    Running,
    Done,
    Error,
}

/// Paths into the shared work directory, populated once a stage finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    #[serde(default)]
    pub raw_pdf: Option<PathBuf>,
    #[serde(default)]
    pub final_pdf: Option<PathBuf>,
}

/// `GET /jobs/{jobId}` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub state: WorkerState,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub artifacts: Option<Artifacts>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_state_round_trips_screaming_snake_case() {
        let json = serde_json::to_string(&WorkerState::Done).unwrap();
        assert_eq!(json, "\"DONE\"");
        let back: WorkerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, WorkerState::Done);
    }

    #[test]
    fn job_status_response_parses_minimal_payload() {
        let raw = r#"{"state":"RUNNING"}"#;
        let resp: JobStatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.state, WorkerState::Running);
        assert!(resp.artifacts.is_none());
    }
}
