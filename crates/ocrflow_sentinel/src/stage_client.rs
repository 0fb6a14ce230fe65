//! Stage client (spec.md §4.5): the request/response adapter against the
//! PREP and OCR worker HTTP APIs (spec.md §6). Abstracted behind a trait so
//! the scheduler can be driven against an in-process stub in tests without
//! opening real sockets — the "minimal in-process stub stage worker"
//! SPEC_FULL.md §1 calls for.

use ocrflow_protocol::{JobStatusResponse, OcrSubmitRequest, PrepSubmitRequest, ServiceInfo};
use std::path::Path;
use std::time::Duration;

const STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a submit call: the orchestrator only cares whether the
/// worker accepted the job (200/202) or not (spec.md §4.5).
#[derive(Debug)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(u16),
    TransportError(String),
}

/// Outcome of a poll call: transport errors are swallowed by the caller
/// (spec.md §4.5), surfaced here so the scheduler can decide to ignore them.
#[derive(Debug)]
pub enum PollOutcome {
    Status(JobStatusResponse),
    NotFound,
    TransportError(String),
}

pub trait StageClient: Send + Sync {
    fn info(&self, base_url: &str) -> ServiceInfo;
    fn submit_prep(&self, base_url: &str, req: &PrepSubmitRequest) -> SubmitOutcome;
    fn submit_ocr(&self, base_url: &str, req: &OcrSubmitRequest) -> SubmitOutcome;
    fn poll_job(&self, base_url: &str, job_id: &str) -> PollOutcome;
}

/// Real HTTP implementation, using a blocking `reqwest` client so it can run
/// synchronously on the scheduler's dedicated OS thread (spec.md §5).
pub struct HttpStageClient {
    client: reqwest::blocking::Client,
}

impl HttpStageClient {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(STAGE_TIMEOUT)
            .build()
            .expect("building the stage-worker HTTP client should never fail");
        Self { client }
    }
}

impl Default for HttpStageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StageClient for HttpStageClient {
    fn info(&self, base_url: &str) -> ServiceInfo {
        let url = format!("{base_url}/info");
        match self.client.get(&url).send().and_then(|r| r.json::<ServiceInfo>()) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(url, error = %e, "stage worker /info failed, proceeding with unknown versions");
                ServiceInfo::unknown(base_url)
            }
        }
    }

    fn submit_prep(&self, base_url: &str, req: &PrepSubmitRequest) -> SubmitOutcome {
        submit(&self.client, &format!("{base_url}/jobs/prep"), req)
    }

    fn submit_ocr(&self, base_url: &str, req: &OcrSubmitRequest) -> SubmitOutcome {
        submit(&self.client, &format!("{base_url}/jobs/ocr"), req)
    }

    fn poll_job(&self, base_url: &str, job_id: &str) -> PollOutcome {
        let url = format!("{base_url}/jobs/{job_id}");
        match self.client.get(&url).send() {
            Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => PollOutcome::NotFound,
            Ok(resp) if resp.status().is_success() => match resp.json::<JobStatusResponse>() {
                Ok(status) => PollOutcome::Status(status),
                Err(e) => PollOutcome::TransportError(e.to_string()),
            },
            Ok(resp) => PollOutcome::TransportError(format!("unexpected status {}", resp.status())),
            Err(e) => PollOutcome::TransportError(e.to_string()),
        }
    }
}

fn submit<T: serde::Serialize>(client: &reqwest::blocking::Client, url: &str, body: &T) -> SubmitOutcome {
    match client.post(url).json(body).send() {
        Ok(resp) => {
            let status = resp.status();
            if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::ACCEPTED {
                SubmitOutcome::Accepted
            } else {
                SubmitOutcome::Rejected(status.as_u16())
            }
        }
        Err(e) => SubmitOutcome::TransportError(e.to_string()),
    }
}

/// Builds a `PrepSubmitRequest` for a job.
pub fn prep_request(job_id: &str, input_path: &Path, work_dir: &Path) -> PrepSubmitRequest {
    PrepSubmitRequest {
        job_id: job_id.to_string(),
        input_path: input_path.to_path_buf(),
        work_dir: work_dir.to_path_buf(),
    }
}

/// Builds an `OcrSubmitRequest` for a job.
#[allow(clippy::too_many_arguments)]
pub fn ocr_request(
    job_id: &str,
    raw_pdf_path: &Path,
    work_dir: &Path,
    lang: &str,
    rotate_pages: bool,
    deskew: bool,
    optimize: u8,
) -> OcrSubmitRequest {
    OcrSubmitRequest {
        job_id: job_id.to_string(),
        raw_pdf_path: raw_pdf_path.to_path_buf(),
        work_dir: work_dir.to_path_buf(),
        lang: lang.to_string(),
        rotate_pages,
        deskew,
        optimize,
    }
}
