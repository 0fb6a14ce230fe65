//! Shared state between the scheduler (sole writer) and the observability
//! server (reader, plus the sole writer of `RuntimeConfig`). Spec.md §5:
//! "one mutex; critical sections are copy or patch only."
//!
//! The scheduler never holds this lock during I/O: it builds its tick's
//! results in local variables and publishes a snapshot once, at the end of
//! the tick (step 8). `Metrics` itself is a set of atomics and is read
//! without the lock by either side, matching the spec's carve-out for
//! single-writer fields.

use chrono::{DateTime, Utc};
use ocrflow_ids::JobKey;
use ocrflow_protocol::{Index, Metrics, RuntimeConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// The scheduler's internal pseudo-state (spec.md §4.6), distinct from the
/// persisted `JobState`. `*_Retry` stages never appear in `state.json`
/// except via the error state that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovered,
    PrepSubmitted,
    PrepRunning,
    PrepRetry,
    PrepDone,
    OcrSubmitted,
    OcrRunning,
    OcrRetry,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Discovered => "DISCOVERED",
            Stage::PrepSubmitted => "PREP_SUBMITTED",
            Stage::PrepRunning => "PREP_RUNNING",
            Stage::PrepRetry => "PREP_RETRY",
            Stage::PrepDone => "PREP_DONE",
            Stage::OcrSubmitted => "OCR_SUBMITTED",
            Stage::OcrRunning => "OCR_RUNNING",
            Stage::OcrRetry => "OCR_RETRY",
        }
    }
}

/// One entry of the in-memory `inFlight` map (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct InFlightEntry {
    pub stage: Stage,
    pub input_name: String,
    pub input_path: PathBuf,
    pub attempt_prep: u32,
    pub attempt_ocr: u32,
    pub raw_pdf: Option<PathBuf>,
    /// When `stage` last entered `PrepRunning`/`OcrRunning`. Used by the
    /// heartbeat check as the staleness reference before the worker's first
    /// heartbeat write exists, so a worker that never writes one still times
    /// out once `jobTimeoutSec` has elapsed since submission (spec.md §8
    /// scenario 5) rather than being treated as permanently fresh.
    pub running_since: DateTime<Utc>,
}

pub type InFlightMap = HashMap<JobKey, InFlightEntry>;

/// `GET /jobs` row: an index entry merged with any in-flight metadata
/// (spec.md §4.9).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListRow {
    pub job_key: JobKey,
    pub state: ocrflow_protocol::JobState,
    pub input_name: String,
    pub out_pdf: Option<PathBuf>,
    pub updated_at: DateTime<Utc>,
    pub stage: Option<String>,
    pub max_attempt: Option<u32>,
}

/// The snapshot the scheduler publishes once per tick.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub in_flight: InFlightMap,
    pub index: Index,
}

/// Shared, mutex-guarded state reachable from both the scheduler thread and
/// the observability HTTP server.
pub struct Shared {
    snapshot: Mutex<Snapshot>,
    runtime_config: Mutex<RuntimeConfig>,
    pub metrics: Metrics,
    ready: std::sync::atomic::AtomicBool,
}

impl Shared {
    pub fn new(runtime_config: RuntimeConfig) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(Snapshot::default()),
            runtime_config: Mutex::new(runtime_config),
            metrics: Metrics::new(),
            ready: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Called by the scheduler at the end of every tick (step 8).
    pub fn publish(&self, snapshot: Snapshot) {
        let mut guard = self.snapshot.lock().expect("snapshot mutex poisoned");
        *guard = snapshot;
    }

    /// Deep-copies the snapshot for a reader; the lock is held only for the
    /// clone, never across I/O (spec.md §5).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().expect("snapshot mutex poisoned").clone()
    }

    pub fn job_rows(&self) -> Vec<JobListRow> {
        let snap = self.snapshot();
        snap.index
            .values()
            .map(|entry| {
                let in_flight = snap.in_flight.get(&entry.job_key);
                JobListRow {
                    job_key: entry.job_key.clone(),
                    state: entry.state,
                    input_name: entry.input_name.clone(),
                    out_pdf: entry.out_pdf.clone(),
                    updated_at: entry.updated_at,
                    stage: in_flight.map(|f| f.stage.as_str().to_string()),
                    max_attempt: in_flight.map(|f| f.attempt_prep.max(f.attempt_ocr)),
                }
            })
            .collect()
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        self.runtime_config.lock().expect("config mutex poisoned").clone()
    }

    /// Applied by the observability server's `POST /config` handler; read by
    /// the scheduler once at the start of each tick (spec.md §5).
    pub fn patch_runtime_config(&self, f: impl FnOnce(&mut RuntimeConfig)) -> RuntimeConfig {
        let mut guard = self.runtime_config.lock().expect("config mutex poisoned");
        f(&mut guard);
        guard.clone()
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }
}
