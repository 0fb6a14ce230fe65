//! End-to-end scheduler behavior (spec.md §8's scenarios): drives
//! [`Scheduler`] through repeated `tick()` calls over a real temp-dir
//! `DATA_DIR`, using [`StubStageClient`] in place of the PREP/OCR HTTP
//! workers and [`FakeClock`] in place of the wall clock.

use chrono::Utc;
use ocrflow_protocol::{Config, DataLayout, Index, IndexEntry, JobState, OcrProfile, PrepProfile, Profile, StateJob};
use ocrflow_ids::{FileHash, JobKey, ProfileHash};
use ocrflow_sentinel::clock::FakeClock;
use ocrflow_sentinel::scheduler::Scheduler;
use ocrflow_sentinel::shared::Shared;
use ocrflow_sentinel::stage_client::StageClient;
use ocrflow_sentinel::stage_stub::StubStageClient;
use ocrflow_sentinel::store::JobStore;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn test_config(data_dir: PathBuf) -> Config {
    Config {
        data_dir,
        prep_url: "http://stub-prep.invalid".into(),
        ocr_url: "http://stub-ocr.invalid".into(),
        poll_interval_ms: 10,
        prep_concurrency: 2,
        ocr_concurrency: 1,
        max_jobs_in_flight: 3,
        max_attempts_prep: 3,
        max_attempts_ocr: 3,
        ocr_lang: "eng".into(),
        job_timeout_seconds: 60,
        keep_work_dir_days: 7,
        min_pdf_size_bytes: 10,
        disk_free_factor: 0.0,
        max_input_size_mb: 500,
        control_bind_addr: "127.0.0.1:0".into(),
        janitor_interval_secs: 600,
    }
}

/// A ZIP-signed dummy `.cbz`; `unique` makes distinct calls hash differently.
fn write_archive(path: &Path, unique: &[u8]) {
    let mut bytes = vec![0x50, 0x4B, 0x03, 0x04];
    bytes.extend_from_slice(b"fake comic archive payload ");
    bytes.extend_from_slice(unique);
    fs::write(path, bytes).unwrap();
}

fn new_scheduler(config: Config, stub: Arc<StubStageClient>, clock: Arc<FakeClock>) -> (Scheduler, Arc<Shared>) {
    let shared = Shared::new(config.runtime_slice());
    let scheduler = Scheduler::new(config, stub, clock, Arc::clone(&shared)).unwrap();
    (scheduler, shared)
}

#[test]
fn ten_jobs_drain_under_concurrency_caps() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let layout = DataLayout::new(dir.path());
    fs::create_dir_all(layout.in_dir()).unwrap();

    for i in 0..10u8 {
        write_archive(&layout.in_dir().join(format!("issue-{i:02}.cbz")), &[i]);
    }

    let stub = Arc::new(StubStageClient::new(2));
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let (mut scheduler, _shared) = new_scheduler(config.clone(), Arc::clone(&stub), clock);
    scheduler.recover();

    for _ in 0..150 {
        scheduler.tick();
    }

    let out_files: Vec<_> = fs::read_dir(layout.out_dir())
        .unwrap()
        .flatten()
        .map(|e| e.file_name().into_string().unwrap())
        .collect();
    assert_eq!(out_files.len(), 10, "expected all ten jobs to publish an output PDF, got {out_files:?}");
    assert!(out_files.iter().all(|n| n.contains("__job-") && n.ends_with(".pdf")));

    let store = JobStore::new(layout.clone());
    let index = store.read_index();
    assert_eq!(index.len(), 10);
    assert!(index.values().all(|e| e.state == JobState::Done));
    assert!(fs::read_dir(layout.archive_dir()).unwrap().flatten().count() == 10);
}

#[test]
fn duplicate_submission_is_quarantined_with_use_existing_action() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let layout = DataLayout::new(dir.path());
    fs::create_dir_all(layout.in_dir()).unwrap();
    write_archive(&layout.in_dir().join("issue-01.cbz"), b"original");

    let stub = Arc::new(StubStageClient::new(1));
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let (mut scheduler, _shared) = new_scheduler(config.clone(), Arc::clone(&stub), clock);
    scheduler.recover();
    for _ in 0..20 {
        scheduler.tick();
    }

    let store = JobStore::new(layout.clone());
    let index = store.read_index();
    assert_eq!(index.len(), 1);
    let (job_key_str, entry) = index.iter().next().unwrap();
    assert_eq!(entry.state, JobState::Done);
    let job_key = JobKey::parse(job_key_str.clone()).unwrap();

    // Second submission: byte-identical content, different filename.
    write_archive(&layout.in_dir().join("issue-01-resend.cbz"), b"original");
    for _ in 0..5 {
        scheduler.tick();
    }

    let hold_dir = layout.hold_duplicate_job_dir(&job_key);
    assert!(hold_dir.exists(), "expected a quarantine directory for the duplicate");
    let held: Vec<_> = fs::read_dir(&hold_dir).unwrap().flatten().collect();
    assert!(held.iter().any(|e| e.file_name().into_string().unwrap().ends_with("issue-01-resend.cbz")));

    let report_bytes = fs::read(layout.duplicate_report_path(&job_key)).unwrap();
    let report: serde_json::Value = serde_json::from_slice(&report_bytes).unwrap();
    let actions = report["actions"].as_array().unwrap();
    assert!(actions.iter().any(|a| a == "USE_EXISTING_RESULT"));

    let index = store.read_index();
    assert_eq!(index.len(), 1, "duplicate must not add a second index entry");
}

#[test]
fn force_reprocess_reinjects_and_new_content_completes_with_a_new_job_key() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let layout = DataLayout::new(dir.path());
    fs::create_dir_all(layout.in_dir()).unwrap();
    write_archive(&layout.in_dir().join("issue-01.cbz"), b"original");

    let stub = Arc::new(StubStageClient::new(1));
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let (mut scheduler, _shared) = new_scheduler(config.clone(), Arc::clone(&stub), clock);
    scheduler.recover();
    for _ in 0..20 {
        scheduler.tick();
    }
    let store = JobStore::new(layout.clone());
    let original_key = {
        let index = store.read_index();
        assert_eq!(index.len(), 1);
        JobKey::parse(index.keys().next().unwrap().clone()).unwrap()
    };

    write_archive(&layout.in_dir().join("issue-01-resend.cbz"), b"original");
    for _ in 0..5 {
        scheduler.tick();
    }
    let hold_dir = layout.hold_duplicate_job_dir(&original_key);
    assert!(hold_dir.exists());

    // An operator corrected the archive's contents before requesting a
    // forced reprocess, so the re-submitted bytes genuinely differ.
    let held_name = fs::read_dir(&hold_dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name())
        .find(|n| n != "status.json" && n != "decision.json")
        .unwrap();
    write_archive(&hold_dir.join(&held_name), b"corrected-content");

    fs::write(
        layout.hold_duplicate_decision_path(&original_key),
        br#"{"action":"FORCE_REPROCESS","nonce":"deadbeef00"}"#,
    )
    .unwrap();

    scheduler.tick();
    let reinjected = layout.in_dir().join("issue-01__force-deadbeef.cbz");
    assert!(reinjected.exists(), "expected the held file reinjected with the force suffix");
    assert!(!hold_dir.exists(), "hold dir should be cleaned up once the decision is applied");

    for _ in 0..20 {
        scheduler.tick();
    }

    let index = store.read_index();
    assert_eq!(index.len(), 2, "original job plus the newly force-reprocessed job");
    let new_entry = index
        .iter()
        .find(|(k, _)| **k != original_key.to_string())
        .map(|(_, e)| e)
        .unwrap();
    assert_eq!(new_entry.state, JobState::Done);
    assert_eq!(new_entry.input_name, "issue-01__force-deadbeef.cbz");
}

#[test]
fn crash_recovery_requeues_interrupted_prep_job_and_completes() {
    let dir = TempDir::new().unwrap();
    let layout = DataLayout::new(dir.path());
    let store = JobStore::new(layout.clone());
    store.ensure_layout().unwrap();

    let fh = FileHash::from_trusted("1".repeat(64));
    let ph = ProfileHash::from_trusted("2".repeat(64));
    let key = JobKey::new(&fh, &ph);
    let job_dir = layout.job_dir(&key);
    fs::create_dir_all(&job_dir).unwrap();
    let input_path = layout.job_input_path(&key, "issue-01.cbz");
    write_archive(&input_path, b"crashed-job");

    let job = StateJob {
        job_key: key.clone(),
        file_hash: fh,
        profile_hash: ph,
        profile: Profile {
            ocr: OcrProfile { lang: "eng".into(), rotate_pages: false, deskew: false, optimize: 1, versions: BTreeMap::new() },
            prep: PrepProfile { versions: BTreeMap::new() },
        },
        input_name: "issue-01.cbz".into(),
        input_path: input_path.clone(),
        state: JobState::PrepRunning,
        attempt_prep: 2,
        attempt_ocr: 0,
        raw_pdf: None,
        final_pdf: None,
        message: None,
        error: None,
        updated_at: Utc::now(),
    };
    store.write_new_state(&job).unwrap();

    let mut index = Index::new();
    index.insert(
        key.to_string(),
        IndexEntry {
            job_key: key.clone(),
            state: JobState::PrepRunning,
            input_name: "issue-01.cbz".into(),
            out_pdf: None,
            updated_at: Utc::now(),
        },
    );
    store.write_index(&index).unwrap();

    let mut config = test_config(dir.path().to_path_buf());
    config.max_attempts_prep = 3;
    let stub = Arc::new(StubStageClient::new(1));
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let (mut scheduler, shared) = new_scheduler(config, Arc::clone(&stub), clock);
    scheduler.recover();

    let snapshot = shared.snapshot();
    let entry = snapshot.in_flight.get(&key).expect("interrupted job reenters inFlight");
    assert_eq!(entry.stage.as_str(), "PREP_RETRY");

    for _ in 0..20 {
        scheduler.tick();
    }

    let reloaded = store.read_index();
    assert_eq!(reloaded.get(&key.to_string()).unwrap().state, JobState::Done);
}

#[test]
fn heartbeat_stall_times_out_and_eventually_errors_out_prep() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.job_timeout_seconds = 60;
    config.max_attempts_prep = 3;
    let layout = DataLayout::new(dir.path());
    fs::create_dir_all(layout.in_dir()).unwrap();
    write_archive(&layout.in_dir().join("issue-01.cbz"), b"stalls-forever");

    let stub = Arc::new(StubStageClient::stalling());
    let clock = Arc::new(FakeClock::new(Utc::now()));
    let (mut scheduler, _shared) = new_scheduler(config.clone(), Arc::clone(&stub), Arc::clone(&clock));
    scheduler.recover();

    // Discover + submit PREP.
    scheduler.tick();
    scheduler.tick();

    let store = JobStore::new(layout.clone());
    let index = store.read_index();
    assert_eq!(index.len(), 1);
    let key = JobKey::parse(index.keys().next().unwrap().clone()).unwrap();
    assert_eq!(index.get(&key.to_string()).unwrap().state, JobState::PrepRunning);

    clock.advance(chrono::Duration::seconds(61));
    scheduler.tick();

    let index = store.read_index();
    assert_eq!(index.get(&key.to_string()).unwrap().state, JobState::PrepTimeout);

    // Exhaust the remaining attempts the same way: each iteration resubmits
    // (consuming one attempt) then lets the heartbeat go stale again.
    for _ in 0..2 {
        scheduler.tick();
        clock.advance(chrono::Duration::seconds(61));
        scheduler.tick();
    }
    // One further tick lets `schedule_prep` observe `attemptPrep >=
    // maxAttemptsPrep` on the now-`PREP_RETRY` job and error it out.
    scheduler.tick();

    let index = store.read_index();
    assert_eq!(index.get(&key.to_string()).unwrap().state, JobState::ErrorPrep);
    assert!(layout.error_dir().join("issue-01.cbz").exists());
    assert_eq!(_shared.metrics.snapshot().error, 1);
}
