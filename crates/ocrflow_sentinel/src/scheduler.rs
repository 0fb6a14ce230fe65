//! The scheduler tick (spec.md §4.6): one bounded, non-blocking pass run at
//! `POLL_INTERVAL_MS`. Steps 1-8 execute in the exact order spec.md lists;
//! each step is independently resilient (spec.md §7) so one job's failure
//! never aborts the tick.

use crate::clock::Clock;
use crate::duplicate;
use crate::guards;
use crate::janitor;
use crate::pdf;
use crate::shared::{InFlightEntry, InFlightMap, Shared, Snapshot, Stage};
use crate::stage_client::{ocr_request, prep_request, PollOutcome, StageClient, SubmitOutcome};
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use ocrflow_ids::{FileHash, JobKey, ProfileHash};
use ocrflow_protocol::paths::Stage as ExternalStage;
use ocrflow_protocol::types::error_tag;
use ocrflow_protocol::{
    fingerprint, naming, Config, DataLayout, IndexEntry, Index, JobState, LoadOutcome, Profile,
    ServiceInfo, StateJob, StateJobPatch, WorkerState,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// No spec.md §6 environment key governs these OCR flags; they are fixed
/// defaults baked into every canonical profile this build produces.
const DEFAULT_ROTATE_PAGES: bool = false;
const DEFAULT_DESKEW: bool = false;
const DEFAULT_OPTIMIZE: u8 = 1;

pub struct Scheduler {
    config: Config,
    layout: DataLayout,
    store: JobStore,
    stage_client: Arc<dyn StageClient>,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    prep_info: ServiceInfo,
    ocr_info: ServiceInfo,
    in_flight: InFlightMap,
    index: Index,
    last_janitor: DateTime<Utc>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        stage_client: Arc<dyn StageClient>,
        clock: Arc<dyn Clock>,
        shared: Arc<Shared>,
    ) -> anyhow::Result<Self> {
        let layout = DataLayout::new(config.data_dir.clone());
        let store = JobStore::new(layout.clone());
        store.ensure_layout()?;
        let prep_info = stage_client.info(&config.prep_url);
        let ocr_info = stage_client.info(&config.ocr_url);
        let index = store.read_index();
        let now = clock.now();
        Ok(Self {
            config,
            layout,
            store,
            stage_client,
            clock,
            shared,
            prep_info,
            ocr_info,
            in_flight: InFlightMap::new(),
            index,
            last_janitor: now,
        })
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Startup recovery (spec.md §4.8). Must run once before the first tick.
    pub fn recover(&mut self) {
        self.in_flight = crate::recovery::recover(&self.store, &mut self.index, &self.config, self.clock.now());
        let _ = self.store.write_index(&self.index);
        self.publish();
        self.shared.mark_ready();
    }

    pub fn tick(&mut self) {
        let runtime = self.shared.runtime_config();
        self.config.apply_runtime(&runtime);

        self.apply_duplicate_decisions();
        self.discover_one();
        self.schedule_prep();
        self.poll_prep();
        self.schedule_ocr();
        self.poll_ocr_and_finalize();
        self.heartbeat_check();
        self.write_metrics();
        self.maybe_run_janitor();
        self.publish();
    }

    fn publish(&self) {
        let _ = self.store.write_index(&self.index);
        self.shared.publish(Snapshot {
            in_flight: self.in_flight.clone(),
            index: self.index.clone(),
        });
    }

    fn maybe_run_janitor(&mut self) {
        let now = self.clock.now();
        let interval = chrono::Duration::seconds(self.config.janitor_interval_secs as i64);
        if now - self.last_janitor < interval {
            return;
        }
        let keys: HashSet<String> = self.in_flight.keys().map(|k| k.to_string()).collect();
        janitor::sweep(&self.layout, &keys, self.config.keep_work_dir_days);
        self.last_janitor = now;
    }

    // ---- step 1 ----------------------------------------------------

    fn apply_duplicate_decisions(&mut self) {
        for pending in duplicate::scan_decisions(&self.layout) {
            match duplicate::apply_decision(&self.layout, &pending, &self.index) {
                duplicate::ApplyOutcome::Handled | duplicate::ApplyOutcome::Reinjected => {}
                duplicate::ApplyOutcome::Failed(reason) => {
                    warn!(job_key = %pending.job_key, reason, "failed to apply duplicate decision, retrying next tick");
                }
            }
        }
    }

    // ---- step 2 ----------------------------------------------------

    fn discover_one(&mut self) {
        if self.in_flight.len() >= self.config.max_jobs_in_flight {
            return;
        }
        let in_dir = self.layout.in_dir();
        let Ok(entries) = fs::read_dir(&in_dir) else {
            return;
        };
        // Discovery order is raw filesystem-enumeration order, not
        // alphabetical (spec.md), matching the original's `os.listdir`.
        let Some(name) = entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .find(|n| naming::is_archive_candidate(n))
        else {
            return;
        };

        if fs::create_dir_all(self.layout.staging_dir()).is_err() {
            return;
        }
        let ts = self.clock.now().format("%Y%m%dT%H%M%S%.fZ").to_string();
        let staged = self.layout.staging_path(&ts, &name);
        if fs::rename(in_dir.join(&name), &staged).is_err() {
            // Another discoverer (or a racing writer) won; skip this tick.
            return;
        }

        let size_bytes = fs::metadata(&staged).map(|m| m.len()).unwrap_or(0);
        if let Err(failure) = guards::check_all(
            &staged,
            size_bytes,
            self.config.max_input_size_bytes(),
            &self.layout.work_dir(),
            self.config.disk_free_factor,
        ) {
            self.reject_input(&staged, &name, failure);
            return;
        }

        let file_hash = match fingerprint::file_hash(&staged) {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, name, "failed to hash staged file, leaving for next tick");
                return;
            }
        };
        let profile = fingerprint::canonical_profile(
            &self.prep_info,
            &self.ocr_info,
            &self.config.ocr_lang,
            DEFAULT_ROTATE_PAGES,
            DEFAULT_DESKEW,
            DEFAULT_OPTIMIZE,
        );
        let (profile_hash, job_key) = match fingerprint::make_job_key(&file_hash, &profile) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, name, "failed to compute jobKey, leaving for next tick");
                return;
            }
        };

        if let Some(existing) = self.index.get(job_key.as_str()).cloned() {
            match duplicate::quarantine(&self.layout, &job_key, &staged, &name, &profile, &existing) {
                Ok(_) => info!(%job_key, "incoming file quarantined as duplicate"),
                Err(e) => warn!(%job_key, error = %e, "failed to quarantine duplicate"),
            }
            return;
        }

        if let Err(e) = self.admit_new_job(&job_key, &file_hash, &profile_hash, &profile, &name, &staged) {
            warn!(%job_key, error = %e, "failed to admit new job");
        }
    }

    fn reject_input(&self, staged: &Path, orig_name: &str, failure: guards::GuardFailure) {
        match failure {
            guards::GuardFailure::Size => self.shared.metrics.inc_input_rejected_size(),
            guards::GuardFailure::Signature => self.shared.metrics.inc_input_rejected_signature(),
            guards::GuardFailure::DiskError => self.shared.metrics.inc_disk_error(),
        }
        let _ = fs::create_dir_all(self.layout.error_dir());
        let dest = self.layout.error_dir().join(orig_name);
        if let Err(e) = fs::rename(staged, &dest) {
            warn!(error = %e, name = orig_name, "failed to move rejected input to error/");
        }
        warn!(tag = failure.error_tag(), name = orig_name, "input rejected by guard");
    }

    #[allow(clippy::too_many_arguments)]
    fn admit_new_job(
        &mut self,
        job_key: &JobKey,
        file_hash: &FileHash,
        profile_hash: &ProfileHash,
        profile: &Profile,
        input_name: &str,
        staged: &Path,
    ) -> std::io::Result<()> {
        let job_dir = self.layout.job_dir(job_key);
        fs::create_dir_all(&job_dir)?;
        let input_path = self.layout.job_input_path(job_key, input_name);
        fs::rename(staged, &input_path)?;

        let now = self.clock.now();
        let job = StateJob {
            job_key: job_key.clone(),
            file_hash: file_hash.clone(),
            profile_hash: profile_hash.clone(),
            profile: profile.clone(),
            input_name: input_name.to_string(),
            input_path: input_path.clone(),
            state: JobState::Discovered,
            attempt_prep: 0,
            attempt_ocr: 0,
            raw_pdf: None,
            final_pdf: None,
            message: None,
            error: None,
            updated_at: now,
        };
        self.store.write_new_state(&job)?;
        self.index.insert(
            job_key.to_string(),
            IndexEntry {
                job_key: job_key.clone(),
                state: JobState::Discovered,
                input_name: input_name.to_string(),
                out_pdf: None,
                updated_at: now,
            },
        );
        self.in_flight.insert(
            job_key.clone(),
            InFlightEntry {
                stage: Stage::Discovered,
                input_name: input_name.to_string(),
                input_path,
                attempt_prep: 0,
                attempt_ocr: 0,
                raw_pdf: None,
                running_since: now,
            },
        );
        self.shared.metrics.inc_queued();
        info!(%job_key, input_name, "discovered new job");
        Ok(())
    }

    // ---- step 3 ----------------------------------------------------

    fn schedule_prep(&mut self) {
        let running = self.in_flight.values().filter(|e| e.stage == Stage::PrepRunning).count();
        let mut slots = self.config.prep_concurrency.saturating_sub(running);
        if slots == 0 {
            return;
        }

        let candidates: Vec<JobKey> = self
            .in_flight
            .iter()
            .filter(|(_, e)| matches!(e.stage, Stage::Discovered | Stage::PrepRetry))
            .map(|(k, _)| k.clone())
            .collect();

        for job_key in candidates {
            if slots == 0 {
                break;
            }
            let Some(entry) = self.in_flight.get(&job_key).cloned() else {
                continue;
            };

            if entry.attempt_prep >= self.config.max_attempts_prep {
                self.error_out_prep(&job_key, &entry);
                continue;
            }

            let attempt = entry.attempt_prep + 1;
            if let LoadOutcome::Loaded(mut job) = self.store.read_state(&job_key) {
                let _ = self.store.write_state(
                    &mut job,
                    StateJobPatch::default().with_state(JobState::PrepSubmitted).with_attempt_prep(attempt),
                );
            }
            if let Some(e) = self.index.get_mut(job_key.as_str()) {
                e.state = JobState::PrepSubmitted;
            }

            let job_dir = self.layout.job_dir(&job_key);
            let req = prep_request(job_key.as_str(), &entry.input_path, &job_dir);
            match self.stage_client.submit_prep(&self.config.prep_url, &req) {
                SubmitOutcome::Accepted => {
                    let now = self.clock.now();
                    if let Some(e) = self.in_flight.get_mut(&job_key) {
                        e.stage = Stage::PrepRunning;
                        e.attempt_prep = attempt;
                        e.running_since = now;
                    }
                    if let Some(e) = self.index.get_mut(job_key.as_str()) {
                        e.state = JobState::PrepRunning;
                    }
                    slots -= 1;
                    self.shared.metrics.inc_running();
                }
                SubmitOutcome::Rejected(status) => {
                    warn!(%job_key, status, "PREP submission rejected");
                    if let Some(e) = self.in_flight.get_mut(&job_key) {
                        e.stage = Stage::PrepRetry;
                        e.attempt_prep = attempt;
                    }
                }
                SubmitOutcome::TransportError(err) => {
                    warn!(%job_key, error = %err, "PREP submission transport error");
                    if let Some(e) = self.in_flight.get_mut(&job_key) {
                        e.stage = Stage::PrepRetry;
                        e.attempt_prep = attempt;
                    }
                }
            }
        }
    }

    fn error_out_prep(&mut self, job_key: &JobKey, entry: &InFlightEntry) {
        if let LoadOutcome::Loaded(mut job) = self.store.read_state(job_key) {
            let _ = self.store.write_state(
                &mut job,
                StateJobPatch::default()
                    .with_state(JobState::ErrorPrep)
                    .with_message("max_attempts_prep_exceeded")
                    .with_error("max_attempts_prep_exceeded"),
            );
        }
        if let Some(e) = self.index.get_mut(job_key.as_str()) {
            e.state = JobState::ErrorPrep;
            e.updated_at = self.clock.now();
        }
        let _ = fs::create_dir_all(self.layout.error_dir());
        if entry.input_path.exists() {
            let dest = self.layout.error_dir().join(&entry.input_name);
            let _ = fs::rename(&entry.input_path, dest);
        }
        self.in_flight.remove(job_key);
        self.shared.metrics.inc_error();
        warn!(%job_key, "PREP attempts exhausted, moved to ERROR_PREP");
    }

    // ---- step 4 ----------------------------------------------------

    fn poll_prep(&mut self) {
        let keys: Vec<JobKey> = self
            .in_flight
            .iter()
            .filter(|(_, e)| e.stage == Stage::PrepRunning)
            .map(|(k, _)| k.clone())
            .collect();

        for job_key in keys {
            match self.stage_client.poll_job(&self.config.prep_url, job_key.as_str()) {
                PollOutcome::Status(status) => match status.state {
                    WorkerState::Done => {
                        let raw_pdf = status
                            .artifacts
                            .and_then(|a| a.raw_pdf)
                            .unwrap_or_else(|| self.layout.job_raw_pdf_path(&job_key));
                        if let Some(e) = self.in_flight.get_mut(&job_key) {
                            e.stage = Stage::PrepDone;
                            e.raw_pdf = Some(raw_pdf.clone());
                        }
                        if let LoadOutcome::Loaded(mut job) = self.store.read_state(&job_key) {
                            let _ = self.store.write_state(
                                &mut job,
                                StateJobPatch::default().with_state(JobState::PrepDone).with_raw_pdf(raw_pdf),
                            );
                        }
                        if let Some(e) = self.index.get_mut(job_key.as_str()) {
                            e.state = JobState::PrepDone;
                        }
                    }
                    WorkerState::Error => {
                        if let Some(e) = self.in_flight.get_mut(&job_key) {
                            e.stage = Stage::PrepRetry;
                        }
                        if let LoadOutcome::Loaded(mut job) = self.store.read_state(&job_key) {
                            let mut patch = StateJobPatch::default().with_state(JobState::PrepError);
                            if let Some(msg) = status.message {
                                patch = patch.with_message(msg);
                            }
                            if let Some(err) = status.error {
                                patch = patch.with_error(err);
                            }
                            let _ = self.store.write_state(&mut job, patch);
                        }
                        if let Some(e) = self.index.get_mut(job_key.as_str()) {
                            e.state = JobState::PrepError;
                        }
                    }
                    WorkerState::Queued | WorkerState::Running => {}
                },
                PollOutcome::NotFound | PollOutcome::TransportError(_) => {
                    // Swallowed: job stays PREP_RUNNING, next tick retries the poll.
                }
            }
        }
    }

    // ---- step 5 ----------------------------------------------------

    fn schedule_ocr(&mut self) {
        let running = self.in_flight.values().filter(|e| e.stage == Stage::OcrRunning).count();
        let mut slots = self.config.ocr_concurrency.saturating_sub(running);
        if slots == 0 {
            return;
        }

        let candidates: Vec<JobKey> = self
            .in_flight
            .iter()
            .filter(|(_, e)| matches!(e.stage, Stage::PrepDone | Stage::OcrRetry))
            .map(|(k, _)| k.clone())
            .collect();

        for job_key in candidates {
            if slots == 0 {
                break;
            }
            let Some(entry) = self.in_flight.get(&job_key).cloned() else {
                continue;
            };

            if entry.attempt_ocr >= self.config.max_attempts_ocr {
                self.error_out_ocr(&job_key);
                continue;
            }

            let attempt = entry.attempt_ocr + 1;
            if let LoadOutcome::Loaded(mut job) = self.store.read_state(&job_key) {
                let _ = self.store.write_state(
                    &mut job,
                    StateJobPatch::default().with_state(JobState::OcrSubmitted).with_attempt_ocr(attempt),
                );
            }
            if let Some(e) = self.index.get_mut(job_key.as_str()) {
                e.state = JobState::OcrSubmitted;
            }

            let job_dir = self.layout.job_dir(&job_key);
            let raw_pdf = entry.raw_pdf.clone().unwrap_or_else(|| self.layout.job_raw_pdf_path(&job_key));
            let req = ocr_request(
                job_key.as_str(),
                &raw_pdf,
                &job_dir,
                &self.config.ocr_lang,
                DEFAULT_ROTATE_PAGES,
                DEFAULT_DESKEW,
                DEFAULT_OPTIMIZE,
            );
            match self.stage_client.submit_ocr(&self.config.ocr_url, &req) {
                SubmitOutcome::Accepted => {
                    let now = self.clock.now();
                    if let Some(e) = self.in_flight.get_mut(&job_key) {
                        e.stage = Stage::OcrRunning;
                        e.attempt_ocr = attempt;
                        e.running_since = now;
                    }
                    if let Some(e) = self.index.get_mut(job_key.as_str()) {
                        e.state = JobState::OcrRunning;
                    }
                    slots -= 1;
                    self.shared.metrics.inc_running();
                }
                SubmitOutcome::Rejected(status) => {
                    warn!(%job_key, status, "OCR submission rejected");
                    if let Some(e) = self.in_flight.get_mut(&job_key) {
                        e.stage = Stage::OcrRetry;
                        e.attempt_ocr = attempt;
                    }
                }
                SubmitOutcome::TransportError(err) => {
                    warn!(%job_key, error = %err, "OCR submission transport error");
                    if let Some(e) = self.in_flight.get_mut(&job_key) {
                        e.stage = Stage::OcrRetry;
                        e.attempt_ocr = attempt;
                    }
                }
            }
        }
    }

    fn error_out_ocr(&mut self, job_key: &JobKey) {
        if let LoadOutcome::Loaded(mut job) = self.store.read_state(job_key) {
            let _ = self.store.write_state(
                &mut job,
                StateJobPatch::default()
                    .with_state(JobState::ErrorOcr)
                    .with_message("max_attempts_ocr_exceeded")
                    .with_error("max_attempts_ocr_exceeded"),
            );
        }
        if let Some(e) = self.index.get_mut(job_key.as_str()) {
            e.state = JobState::ErrorOcr;
            e.updated_at = self.clock.now();
        }
        // spec.md §9: unlike ERROR_PREP, ERROR_OCR does not relocate the
        // input; it is left wherever archival left it. Preserved literally.
        self.in_flight.remove(job_key);
        self.shared.metrics.inc_error();
        warn!(%job_key, "OCR attempts exhausted, moved to ERROR_OCR");
    }

    // ---- step 6 ----------------------------------------------------

    fn poll_ocr_and_finalize(&mut self) {
        let keys: Vec<JobKey> = self
            .in_flight
            .iter()
            .filter(|(_, e)| e.stage == Stage::OcrRunning)
            .map(|(k, _)| k.clone())
            .collect();

        for job_key in keys {
            match self.stage_client.poll_job(&self.config.ocr_url, job_key.as_str()) {
                PollOutcome::Status(status) => match status.state {
                    WorkerState::Done => {
                        let candidate = status
                            .artifacts
                            .and_then(|a| a.final_pdf)
                            .unwrap_or_else(|| self.layout.job_final_pdf_path(&job_key));
                        if pdf::is_valid_pdf(&candidate, self.config.min_pdf_size_bytes) {
                            self.finalize_done(&job_key, &candidate);
                        } else {
                            self.mark_pdf_invalid(&job_key);
                        }
                    }
                    WorkerState::Error => {
                        if let Some(e) = self.in_flight.get_mut(&job_key) {
                            e.stage = Stage::OcrRetry;
                        }
                        if let LoadOutcome::Loaded(mut job) = self.store.read_state(&job_key) {
                            let mut patch = StateJobPatch::default().with_state(JobState::OcrError);
                            if let Some(msg) = status.message {
                                patch = patch.with_message(msg);
                            }
                            if let Some(err) = status.error {
                                patch = patch.with_error(err);
                            }
                            let _ = self.store.write_state(&mut job, patch);
                        }
                        if let Some(e) = self.index.get_mut(job_key.as_str()) {
                            e.state = JobState::OcrError;
                        }
                    }
                    WorkerState::Queued | WorkerState::Running => {}
                },
                PollOutcome::NotFound | PollOutcome::TransportError(_) => {}
            }
        }
    }

    fn finalize_done(&mut self, job_key: &JobKey, candidate: &Path) {
        let Some(entry) = self.in_flight.get(job_key).cloned() else {
            return;
        };
        let base = naming::output_base(&entry.input_name).to_string();
        let out_path = self.layout.out_path(&base, job_key);
        if fs::create_dir_all(self.layout.out_dir()).is_err() {
            return;
        }
        if fs::rename(candidate, &out_path).is_err() {
            warn!(%job_key, "failed to publish output PDF, retrying next tick");
            return;
        }

        let now = self.clock.now();
        if let LoadOutcome::Loaded(mut job) = self.store.read_state(job_key) {
            let _ = self.store.write_state(
                &mut job,
                StateJobPatch::default().with_state(JobState::Done).with_final_pdf(out_path.clone()),
            );
        }
        if let Some(e) = self.index.get_mut(job_key.as_str()) {
            e.state = JobState::Done;
            e.out_pdf = Some(out_path.clone());
            e.updated_at = now;
        }

        let _ = fs::create_dir_all(self.layout.archive_dir());
        if entry.input_path.exists() {
            let dest = self.layout.archive_dir().join(&entry.input_name);
            let _ = fs::rename(&entry.input_path, dest);
        }

        self.in_flight.remove(job_key);
        self.shared.metrics.inc_done();

        if self.config.keep_work_dir_days == 0 {
            let _ = fs::remove_dir_all(self.layout.job_dir(job_key));
        }
        info!(%job_key, out = %out_path.display(), "job done");
    }

    fn mark_pdf_invalid(&mut self, job_key: &JobKey) {
        if let Some(e) = self.in_flight.get_mut(job_key) {
            e.stage = Stage::OcrRetry;
        }
        if let LoadOutcome::Loaded(mut job) = self.store.read_state(job_key) {
            let _ = self.store.write_state(
                &mut job,
                StateJobPatch::default()
                    .with_state(JobState::OcrError)
                    .with_message(error_tag::PDF_INVALID)
                    .with_error(error_tag::PDF_INVALID),
            );
        }
        if let Some(e) = self.index.get_mut(job_key.as_str()) {
            e.state = JobState::OcrError;
        }
        self.shared.metrics.inc_pdf_invalid();
        warn!(%job_key, "candidate final PDF failed validation");
    }

    // ---- step 7 ----------------------------------------------------

    fn heartbeat_check(&mut self) {
        let now = self.clock.now();
        let timeout = chrono::Duration::seconds(self.config.job_timeout_seconds as i64);
        let keys: Vec<(JobKey, Stage, DateTime<Utc>)> = self
            .in_flight
            .iter()
            .filter(|(_, e)| matches!(e.stage, Stage::PrepRunning | Stage::OcrRunning))
            .map(|(k, e)| (k.clone(), e.stage, e.running_since))
            .collect();

        for (job_key, stage, running_since) in keys {
            let ext_stage = match stage {
                Stage::PrepRunning => ExternalStage::Prep,
                Stage::OcrRunning => ExternalStage::Ocr,
                _ => continue,
            };
            let hb_path = self.layout.job_heartbeat_path(&job_key, ext_stage);
            // Before the worker's first heartbeat write, fall back to the
            // submission time as the staleness reference: this gives the
            // worker a full jobTimeoutSec grace period (avoiding a false
            // positive right after submit) while still timing out a worker
            // that never writes one at all (spec.md §8 scenario 5).
            let reference = match fs::metadata(&hb_path).and_then(|m| m.modified()) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(_) => running_since,
            };
            if now - reference <= timeout {
                continue;
            }

            let (new_stage, job_state) = match stage {
                Stage::PrepRunning => (Stage::PrepRetry, JobState::PrepTimeout),
                Stage::OcrRunning => (Stage::OcrRetry, JobState::OcrTimeout),
                _ => continue,
            };
            if let Some(e) = self.in_flight.get_mut(&job_key) {
                e.stage = new_stage;
            }
            if let LoadOutcome::Loaded(mut job) = self.store.read_state(&job_key) {
                let _ = self.store.write_state(&mut job, StateJobPatch::default().with_state(job_state));
            }
            if let Some(e) = self.index.get_mut(job_key.as_str()) {
                e.state = job_state;
            }
            warn!(%job_key, "heartbeat stale, marking timeout");
        }
    }

    // ---- step 8 ----------------------------------------------------

    fn write_metrics(&self) {
        let snapshot = self.shared.metrics.snapshot();
        let _ = self.store.write_metrics(&snapshot);
    }
}
