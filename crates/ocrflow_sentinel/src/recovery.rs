//! Startup recovery (spec.md §4.8): reconstructs `inFlight` from the
//! persisted index plus each job's `state.json`, bumping retry counters for
//! whichever external stage was interrupted. Never scans `work/` directly;
//! an orphaned job directory with no index entry is left for the janitor.

use crate::shared::{InFlightEntry, InFlightMap, Stage};
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use ocrflow_protocol::{types::error_tag, Config, Index, JobState, LoadOutcome, StateJob, StateJobPatch};
use tracing::warn;

enum Interrupted {
    Prep,
    Ocr,
}

/// Builds a degraded `StateJob` when `state.json` is absent or corrupt.
/// `fileHash`/`profileHash` are recoverable from the `jobKey` itself; the
/// full `profile` is not, so a placeholder is substituted — the job is
/// already headed for a retry or an error state, and nothing downstream
/// re-derives `profileHash` from this in-memory copy.
fn fallback_state(
    job_key: &ocrflow_ids::JobKey,
    input_name: &str,
    layout: &ocrflow_protocol::DataLayout,
    now: DateTime<Utc>,
) -> StateJob {
    let (file_hash, profile_hash) = job_key.split();
    StateJob {
        job_key: job_key.clone(),
        file_hash,
        profile_hash,
        profile: ocrflow_protocol::Profile {
            ocr: ocrflow_protocol::OcrProfile {
                lang: String::new(),
                rotate_pages: false,
                deskew: false,
                optimize: 0,
                versions: Default::default(),
            },
            prep: ocrflow_protocol::PrepProfile {
                versions: Default::default(),
            },
        },
        input_name: input_name.to_string(),
        input_path: layout.job_dir(job_key).join(input_name),
        state: JobState::Discovered,
        attempt_prep: 0,
        attempt_ocr: 0,
        raw_pdf: None,
        final_pdf: None,
        message: None,
        error: None,
        updated_at: now,
    }
}

/// Reconstructs `inFlight` and applies any recovery-time `ERROR_{PREP,OCR}`
/// transitions directly to `index`/`state.json`. Returns the jobs to
/// re-inject, with `stage` set to the matching `_RETRY` pseudo-state.
pub fn recover(store: &JobStore, index: &mut Index, config: &Config, now: DateTime<Utc>) -> InFlightMap {
    let mut in_flight = InFlightMap::new();
    let keys: Vec<String> = index.keys().cloned().collect();

    for key_str in keys {
        let Some(entry) = index.get(&key_str) else {
            continue;
        };
        let interrupted = match entry.state {
            JobState::PrepRunning => Interrupted::Prep,
            JobState::OcrRunning => Interrupted::Ocr,
            _ => continue,
        };
        let job_key = entry.job_key.clone();
        let input_name = entry.input_name.clone();

        let (mut job, recovered_from_disk) = match store.read_state(&job_key) {
            LoadOutcome::Loaded(job) => (job, true),
            LoadOutcome::Absent => {
                warn!(%job_key, "state.json absent during recovery, using fallback");
                (fallback_state(&job_key, &input_name, store.layout(), now), false)
            }
            LoadOutcome::Corrupt(reason) => {
                warn!(%job_key, reason, "state.json corrupt during recovery, using fallback");
                (fallback_state(&job_key, &input_name, store.layout(), now), false)
            }
        };

        if !recovered_from_disk {
            match interrupted {
                Interrupted::Prep => {
                    job.attempt_prep = 1;
                    job.attempt_ocr = 0;
                }
                Interrupted::Ocr => {
                    job.attempt_ocr = 1;
                    job.attempt_prep = 0;
                }
            }
        }

        let (attempt, max_attempt, error_state) = match interrupted {
            Interrupted::Prep => (job.attempt_prep, config.max_attempts_prep, JobState::ErrorPrep),
            Interrupted::Ocr => (job.attempt_ocr, config.max_attempts_ocr, JobState::ErrorOcr),
        };

        if attempt >= max_attempt {
            let patch = StateJobPatch::default()
                .with_state(error_state)
                .with_message(error_tag::MAX_ATTEMPTS_AFTER_RESTART)
                .with_error(error_tag::MAX_ATTEMPTS_AFTER_RESTART);
            let _ = store.write_state(&mut job, patch);
            if let Some(e) = index.get_mut(&key_str) {
                e.state = error_state;
                e.updated_at = now;
            }
            // ERROR_PREP archives the input; ERROR_OCR leaves it where
            // archival left it (spec.md §9's documented asymmetry).
            if matches!(interrupted, Interrupted::Prep) {
                let _ = std::fs::create_dir_all(store.layout().error_dir());
                if job.input_path.exists() {
                    let dest = store.layout().error_dir().join(&input_name);
                    let _ = std::fs::rename(&job.input_path, dest);
                }
            }
            continue;
        }

        let stage = match interrupted {
            Interrupted::Prep => Stage::PrepRetry,
            Interrupted::Ocr => Stage::OcrRetry,
        };
        in_flight.insert(
            job_key.clone(),
            InFlightEntry {
                stage,
                input_name,
                input_path: job.input_path.clone(),
                attempt_prep: job.attempt_prep,
                attempt_ocr: job.attempt_ocr,
                raw_pdf: job.raw_pdf.clone(),
                // Stage is a `_Retry` pseudo-state here, never checked by the
                // heartbeat check until the next successful submit sets this
                // for real; the recovery instant is a safe placeholder.
                running_since: now,
            },
        );
    }

    in_flight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JobStore;
    use ocrflow_ids::{FileHash, JobKey, ProfileHash};
    use ocrflow_protocol::{DataLayout, IndexEntry, OcrProfile, PrepProfile, Profile};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn key() -> JobKey {
        JobKey::new(
            &FileHash::from_trusted("1".repeat(64)),
            &ProfileHash::from_trusted("2".repeat(64)),
        )
    }

    fn profile() -> Profile {
        Profile {
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
        }
    }

    #[test]
    fn corrupt_state_json_recovers_with_attempt_one_and_retry_stage() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = JobStore::new(layout.clone());
        store.ensure_layout().unwrap();
        let k = key();

        std::fs::create_dir_all(layout.job_dir(&k)).unwrap();
        std::fs::write(layout.job_state_path(&k), b"{ not json").unwrap();
        std::fs::write(layout.job_input_path(&k, "issue-01.cbz"), b"dummy").unwrap();

        let mut index = Index::new();
        index.insert(
            k.to_string(),
            IndexEntry {
                job_key: k.clone(),
                state: JobState::OcrRunning,
                input_name: "issue-01.cbz".into(),
                out_pdf: None,
                updated_at: Utc::now(),
            },
        );

        let config = Config::from_env();
        let in_flight = recover(&store, &mut index, &config, Utc::now());
        let entry = in_flight.get(&k).expect("job re-entered inFlight");
        assert!(matches!(entry.stage, Stage::OcrRetry));
        assert_eq!(entry.attempt_ocr, 1);
        assert_eq!(entry.attempt_prep, 0);
        assert_eq!(entry.input_path, layout.job_dir(&k).join("issue-01.cbz"));
    }

    #[test]
    fn attempt_already_at_max_errors_out_without_requeue() {
        let dir = TempDir::new().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = JobStore::new(layout.clone());
        store.ensure_layout().unwrap();
        let k = key();

        let job = StateJob {
            job_key: k.clone(),
            file_hash: FileHash::from_trusted("1".repeat(64)),
            profile_hash: ProfileHash::from_trusted("2".repeat(64)),
            profile: profile(),
            input_name: "issue-01.cbz".into(),
            input_path: layout.job_dir(&k).join("issue-01.cbz"),
            state: JobState::PrepRunning,
            attempt_prep: 3,
            attempt_ocr: 0,
            raw_pdf: None,
            final_pdf: None,
            message: None,
            error: None,
            updated_at: Utc::now(),
        };
        std::fs::create_dir_all(layout.job_dir(&k)).unwrap();
        std::fs::write(&job.input_path, b"dummy").unwrap();
        store.write_new_state(&job).unwrap();

        let mut index = Index::new();
        index.insert(
            k.to_string(),
            IndexEntry {
                job_key: k.clone(),
                state: JobState::PrepRunning,
                input_name: "issue-01.cbz".into(),
                out_pdf: None,
                updated_at: Utc::now(),
            },
        );

        let config = Config::from_env();
        let in_flight = recover(&store, &mut index, &config, Utc::now());
        assert!(in_flight.get(&k).is_none());
        assert_eq!(index.get(&k.to_string()).unwrap().state, JobState::ErrorPrep);
        assert!(layout.error_dir().join("issue-01.cbz").exists());
    }
}
