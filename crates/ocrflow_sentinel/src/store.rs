//! On-disk job store (spec.md §4.3): per-job `state.json`, the global
//! `index.json`, and `metrics.json`, all written atomically via
//! temp-file-then-rename. Mirrors the `atomic_write` helper pattern used
//! throughout this codebase's other file-backed stores.

use chrono::Utc;
use ocrflow_protocol::{DataLayout, Index, LoadOutcome, MetricsSnapshot, StateJob};
use std::fs;
use std::path::Path;
use tracing::warn;

/// `safeLoadJSON` (spec.md §4.3): never propagates a decode or I/O failure
/// as a hard error. Corruption is a first-class, loggable outcome.
pub fn safe_load_json<T: serde::de::DeserializeOwned>(path: &Path) -> LoadOutcome<T> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Absent,
        Err(e) => return LoadOutcome::Corrupt(format!("os_error: {e}")),
    };
    match serde_json::from_slice::<T>(&bytes) {
        Ok(v) => LoadOutcome::Loaded(v),
        Err(e) => LoadOutcome::Corrupt(format!("json_corrupt: {e}")),
    }
}

/// Write-temp-then-rename. The temp file lives alongside the target so the
/// rename stays within one filesystem (required for atomicity).
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(
        ".tmp_{}_{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// The per-job and index/metrics persistence surface (spec.md §4.3).
pub struct JobStore {
    layout: DataLayout,
}

impl JobStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn read_state(&self, job_key: &ocrflow_ids::JobKey) -> LoadOutcome<StateJob> {
        safe_load_json(&self.layout.job_state_path(job_key))
    }

    /// Merge-then-atomic-write. Stamps `updatedAt` at `now`.
    pub fn write_state(&self, job: &mut StateJob, patch: ocrflow_protocol::StateJobPatch) -> std::io::Result<()> {
        job.apply_patch(patch, Utc::now());
        let path = self.layout.job_state_path(&job.job_key);
        atomic_write_json(&path, job)
    }

    /// Write a brand-new `state.json` as-is (discovery, spec.md §4.6 step 2).
    pub fn write_new_state(&self, job: &StateJob) -> std::io::Result<()> {
        let path = self.layout.job_state_path(&job.job_key);
        atomic_write_json(&path, job)
    }

    pub fn read_index(&self) -> Index {
        match safe_load_json::<Index>(&self.layout.index_jobs_path()) {
            LoadOutcome::Loaded(idx) => idx,
            LoadOutcome::Absent => Index::new(),
            LoadOutcome::Corrupt(reason) => {
                warn!(reason, "index.json corrupt, starting from empty index");
                Index::new()
            }
        }
    }

    pub fn write_index(&self, index: &Index) -> std::io::Result<()> {
        atomic_write_json(&self.layout.index_jobs_path(), index)
    }

    pub fn write_metrics(&self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        atomic_write_json(&self.layout.index_metrics_path(), snapshot)
    }

    /// Create every top-level directory the orchestrator expects (spec.md §3).
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        for dir in self.layout.all_dirs() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrflow_ids::{FileHash, JobKey, ProfileHash};
    use ocrflow_protocol::{JobState, OcrProfile, PrepProfile, Profile};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_job(layout: &DataLayout) -> StateJob {
        let fh = FileHash::from_trusted("a".repeat(64));
        let ph = ProfileHash::from_trusted("b".repeat(64));
        let key = JobKey::new(&fh, &ph);
        let _ = layout;
        StateJob {
            job_key: key,
            file_hash: fh,
            profile_hash: ph,
            profile: Profile {
                ocr: OcrProfile {
                    lang: "eng".into(),
                    rotate_pages: false,
                    deskew: false,
                    optimize: 1,
                    versions: BTreeMap::new(),
                },
                prep: PrepProfile {
                    versions: BTreeMap::new(),
                },
            },
            input_name: "issue-01.cbz".into(),
            input_path: "/data/work/x/issue-01.cbz".into(),
            state: JobState::Discovered,
            attempt_prep: 0,
            attempt_ocr: 0,
            raw_pdf: None,
            final_pdf: None,
            message: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn safe_load_json_absent_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let outcome: LoadOutcome<StateJob> = safe_load_json(&dir.path().join("nope.json"));
        assert!(matches!(outcome, LoadOutcome::Absent));
    }

    #[test]
    fn safe_load_json_corrupt_file_reports_reason() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ not json").unwrap();
        let outcome: LoadOutcome<StateJob> = safe_load_json(&path);
        match outcome {
            LoadOutcome::Corrupt(reason) => assert!(reason.starts_with("json_corrupt")),
            _ => panic!("expected corrupt outcome"),
        }
    }

    #[test]
    fn write_then_read_state_round_trips() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = JobStore::new(layout.clone());
        store.ensure_layout().unwrap();
        let job = sample_job(&layout);
        store.write_new_state(&job).unwrap();

        match store.read_state(&job.job_key) {
            LoadOutcome::Loaded(loaded) => {
                assert_eq!(loaded.job_key, job.job_key);
                assert_eq!(loaded.state, JobState::Discovered);
            }
            other => panic!("expected loaded state, got {other:?}"),
        }
    }

    #[test]
    fn index_round_trips_through_atomic_write() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = JobStore::new(layout);
        store.ensure_layout().unwrap();
        assert!(store.read_index().is_empty());

        let mut index = Index::new();
        let job = sample_job(store.layout());
        index.insert(
            job.job_key.to_string(),
            ocrflow_protocol::IndexEntry {
                job_key: job.job_key.clone(),
                state: JobState::Discovered,
                input_name: job.input_name.clone(),
                out_pdf: None,
                updated_at: Utc::now(),
            },
        );
        store.write_index(&index).unwrap();
        let reloaded = store.read_index();
        assert_eq!(reloaded.len(), 1);
    }
}
