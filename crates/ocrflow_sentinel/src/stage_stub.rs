//! In-process stub PREP/OCR worker (SPEC_FULL.md §1): implements
//! [`StageClient`] against an in-memory job table instead of real sockets,
//! so the scheduler, recovery, and duplicate-detection behavior can be
//! exercised end-to-end in integration tests without a real OCR toolchain.
//!
//! Gated behind the `test-support` feature; only linked into the crate's own
//! test builds and the integration tests under `tests/`.

use crate::stage_client::{PollOutcome, StageClient, SubmitOutcome};
use ocrflow_protocol::{Artifacts, JobStatusResponse, OcrSubmitRequest, PrepSubmitRequest, ServiceInfo, WorkerState};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

struct StubJob {
    polls_seen: u32,
    matures_after: u32,
    raw_pdf_path: Option<PathBuf>,
    final_pdf_path: Option<PathBuf>,
    heartbeat_path: PathBuf,
    should_error: bool,
    write_heartbeat: bool,
}

/// A fake worker: submissions "run" for `matures_after` polls before
/// reporting `DONE`, writing a heartbeat on every poll (unless configured
/// not to, for the heartbeat-stall scenario) and a real PDF-shaped artifact
/// file when it matures.
pub struct StubStageClient {
    jobs: Mutex<HashMap<String, StubJob>>,
    matures_after: u32,
    write_heartbeats: bool,
    fail_submissions: bool,
}

impl StubStageClient {
    pub fn new(matures_after: u32) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            matures_after,
            write_heartbeats: true,
            fail_submissions: false,
        }
    }

    /// A worker that accepts submissions but never writes a heartbeat and
    /// never matures (spec.md §8 scenario 5, "heartbeat stall").
    pub fn stalling() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            matures_after: u32::MAX,
            write_heartbeats: false,
            fail_submissions: false,
        }
    }

    fn register(&self, job_id: &str, heartbeat_path: PathBuf, raw: Option<PathBuf>, fin: Option<PathBuf>) {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.insert(
            job_id.to_string(),
            StubJob {
                polls_seen: 0,
                matures_after: self.matures_after,
                raw_pdf_path: raw,
                final_pdf_path: fin,
                heartbeat_path,
                should_error: false,
                write_heartbeat: self.write_heartbeats,
            },
        );
    }
}

impl StageClient for StubStageClient {
    fn info(&self, base_url: &str) -> ServiceInfo {
        let mut versions = BTreeMap::new();
        versions.insert("stub_tool".to_string(), "0.0.0-stub".to_string());
        ServiceInfo {
            service: base_url.to_string(),
            versions,
        }
    }

    fn submit_prep(&self, _base_url: &str, req: &PrepSubmitRequest) -> SubmitOutcome {
        if self.fail_submissions {
            return SubmitOutcome::TransportError("stub configured to fail submissions".into());
        }
        let raw_pdf = req.work_dir.join("raw.pdf");
        let heartbeat = req.work_dir.join("prep.heartbeat");
        self.register(&req.job_id, heartbeat, Some(raw_pdf), None);
        SubmitOutcome::Accepted
    }

    fn submit_ocr(&self, _base_url: &str, req: &OcrSubmitRequest) -> SubmitOutcome {
        if self.fail_submissions {
            return SubmitOutcome::TransportError("stub configured to fail submissions".into());
        }
        let final_pdf = req.work_dir.join("final.pdf");
        let heartbeat = req.work_dir.join("ocr.heartbeat");
        self.register(&req.job_id, heartbeat, None, Some(final_pdf));
        SubmitOutcome::Accepted
    }

    fn poll_job(&self, _base_url: &str, job_id: &str) -> PollOutcome {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(job_id) else {
            return PollOutcome::NotFound;
        };

        if job.should_error {
            return PollOutcome::Status(JobStatusResponse {
                state: WorkerState::Error,
                message: Some("stub job errored".into()),
                error: Some("stub_error".into()),
                artifacts: None,
            });
        }

        if job.write_heartbeat {
            if let Some(parent) = job.heartbeat_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = std::fs::write(&job.heartbeat_path, b"alive");
        }

        job.polls_seen += 1;
        if job.polls_seen < job.matures_after {
            return PollOutcome::Status(JobStatusResponse {
                state: WorkerState::Running,
                message: None,
                error: None,
                artifacts: None,
            });
        }

        if let Some(raw) = &job.raw_pdf_path {
            if let Some(parent) = raw.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = std::fs::write(raw, b"%PDF-1.7 stub prep output padded to a plausible size.....");
        }
        if let Some(fin) = &job.final_pdf_path {
            if let Some(parent) = fin.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = std::fs::write(fin, b"%PDF-1.7 stub ocr output padded to a plausible size......");
        }

        PollOutcome::Status(JobStatusResponse {
            state: WorkerState::Done,
            message: None,
            error: None,
            artifacts: Some(Artifacts {
                raw_pdf: job.raw_pdf_path.clone(),
                final_pdf: job.final_pdf_path.clone(),
            }),
        })
    }
}
