//! Duplicate manager (spec.md §4.4): quarantines a colliding incoming file,
//! writes a report, and applies human decisions written to
//! `hold/duplicates/<jobKey>/decision.json`.

use crate::store::atomic_write_json;
use chrono::Utc;
use ocrflow_ids::JobKey;
use ocrflow_protocol::{
    naming, DataLayout, DuplicateAction, DuplicateDecision, DuplicateReport, DuplicateState,
    DuplicateStatus, IncomingFileMeta, Index, IndexEntry, Profile,
};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// All three actions are always offered; spec.md §4.4 does not make them
/// conditional on job state.
const ALL_ACTIONS: [DuplicateAction; 3] = [
    DuplicateAction::UseExistingResult,
    DuplicateAction::Discard,
    DuplicateAction::ForceReprocess,
];

/// Quarantines `staged_path` as a duplicate of `existing`, writing
/// `status.json` and the report. Returns the path the file was moved to.
pub fn quarantine(
    layout: &DataLayout,
    job_key: &JobKey,
    staged_path: &Path,
    orig_name: &str,
    profile: &Profile,
    existing: &IndexEntry,
) -> io::Result<std::path::PathBuf> {
    let hold_dir = layout.hold_duplicate_job_dir(job_key);
    fs::create_dir_all(&hold_dir)?;

    let ts = Utc::now().format("%Y%m%dT%H%M%S%.fZ").to_string();
    let held_name = naming::duplicate_hold_name(&ts, orig_name);
    let held_path = hold_dir.join(&held_name);
    fs::rename(staged_path, &held_path)?;

    let size_bytes = fs::metadata(&held_path).map(|m| m.len()).unwrap_or(0);

    let status = DuplicateStatus {
        state: DuplicateState::DuplicatePending,
        job_key: job_key.clone(),
        created_at: Utc::now(),
    };
    atomic_write_json(&layout.hold_duplicate_status_path(job_key), &status)?;

    let report = DuplicateReport {
        job_key: job_key.clone(),
        incoming: IncomingFileMeta {
            input_name: orig_name.to_string(),
            size_bytes,
            discovered_at: Utc::now(),
        },
        existing: existing.clone(),
        profile: profile.clone(),
        actions: ALL_ACTIONS.to_vec(),
    };
    fs::create_dir_all(layout.reports_duplicates_dir())?;
    atomic_write_json(&layout.duplicate_report_path(job_key), &report)?;

    info!(%job_key, held = %held_path.display(), "quarantined duplicate submission");
    Ok(held_path)
}

/// One pending decision discovered under `hold/duplicates/*/decision.json`.
pub struct PendingDecision {
    pub job_key: JobKey,
    pub decision: DuplicateDecision,
}

/// Scans `hold/duplicates/*/decision.json` (spec.md §4.4 step "each tick,
/// before discovery"). Malformed job-key directory names or unreadable
/// decisions are skipped and logged, never panicking the tick.
pub fn scan_decisions(layout: &DataLayout) -> Vec<PendingDecision> {
    let mut out = Vec::new();
    let root = layout.hold_duplicates_dir();
    let entries = match fs::read_dir(&root) {
        Ok(e) => e,
        Err(_) => return out,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Ok(job_key) = JobKey::parse(name) else {
            warn!(dir = name, "hold/duplicates entry is not a valid jobKey, skipping");
            continue;
        };
        let decision_path = layout.hold_duplicate_decision_path(&job_key);
        let Ok(bytes) = fs::read(&decision_path) else {
            continue;
        };
        match serde_json::from_slice::<DuplicateDecision>(&bytes) {
            Ok(decision) => out.push(PendingDecision { job_key, decision }),
            Err(e) => warn!(%job_key, error = %e, "corrupt decision.json, skipping"),
        }
    }
    out
}

#[derive(Debug)]
pub enum ApplyOutcome {
    /// `USE_EXISTING_RESULT` or `DISCARD` fully handled here.
    Handled,
    /// `FORCE_REPROCESS` re-injected a file into `in/`; caller has nothing
    /// further to do (discovery will pick it up next tick).
    Reinjected,
    /// Applying failed (I/O error, missing nonce, etc); decision files are
    /// left in place so the tick can retry next time.
    Failed(String),
}

/// Applies one pending decision and, on success, removes the decision,
/// report, and (if now empty) the hold directory (spec.md §4.4).
pub fn apply_decision(layout: &DataLayout, pending: &PendingDecision, index: &Index) -> ApplyOutcome {
    let job_key = &pending.job_key;
    let hold_dir = layout.hold_duplicate_job_dir(job_key);

    let result = match pending.decision.action {
        DuplicateAction::UseExistingResult => apply_use_existing(layout, job_key, index),
        DuplicateAction::Discard => apply_discard(&hold_dir),
        DuplicateAction::ForceReprocess => {
            apply_force_reprocess(layout, &hold_dir, pending.decision.nonce.as_deref())
        }
    };

    match result {
        Ok(outcome) => {
            let _ = fs::remove_file(layout.hold_duplicate_decision_path(job_key));
            let _ = fs::remove_file(layout.duplicate_report_path(job_key));
            let _ = fs::remove_file(layout.hold_duplicate_status_path(job_key));
            if fs::read_dir(&hold_dir).map(|mut d| d.next().is_none()).unwrap_or(false) {
                let _ = fs::remove_dir(&hold_dir);
            }
            outcome
        }
        Err(e) => ApplyOutcome::Failed(e.to_string()),
    }
}

fn held_input_path(hold_dir: &Path) -> io::Result<std::path::PathBuf> {
    for entry in fs::read_dir(hold_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file()
            && path.file_name().and_then(|n| n.to_str()) != Some("status.json")
            && path.file_name().and_then(|n| n.to_str()) != Some("decision.json")
        {
            return Ok(path);
        }
    }
    Err(io::Error::new(io::ErrorKind::NotFound, "no held input file found"))
}

fn apply_use_existing(layout: &DataLayout, job_key: &JobKey, index: &Index) -> io::Result<ApplyOutcome> {
    let hold_dir = layout.hold_duplicate_job_dir(job_key);
    let held = held_input_path(&hold_dir)?;

    if let Some(entry) = index.get(job_key.as_str()) {
        if let Some(out_pdf) = &entry.out_pdf {
            let base = naming::output_base(&entry.input_name);
            let target = layout.out_path(base, job_key);
            if !target.exists() {
                fs::create_dir_all(layout.out_dir())?;
                fs::copy(out_pdf, &target)?;
            }
        }
    }

    fs::create_dir_all(layout.archive_dir())?;
    let archived = layout.archive_dir().join(held.file_name().unwrap());
    fs::rename(&held, archived)?;
    Ok(ApplyOutcome::Handled)
}

fn apply_discard(hold_dir: &Path) -> io::Result<ApplyOutcome> {
    if let Ok(held) = held_input_path(hold_dir) {
        fs::remove_file(held)?;
    }
    Ok(ApplyOutcome::Handled)
}

fn apply_force_reprocess(
    layout: &DataLayout,
    hold_dir: &Path,
    nonce: Option<&str>,
) -> io::Result<ApplyOutcome> {
    let nonce = nonce.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "FORCE_REPROCESS requires a nonce")
    })?;
    let held = held_input_path(hold_dir)?;
    let orig_name = held.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "held file has no valid filename")
    })?;
    // held filenames are `<ts>__<origName>`; strip the timestamp prefix back off.
    let orig_name = orig_name.split_once("__").map(|(_, rest)| rest).unwrap_or(orig_name);
    let new_name = naming::force_reprocess_name(orig_name, nonce);
    let target = layout.in_dir().join(&new_name);
    fs::create_dir_all(layout.in_dir())?;
    fs::rename(&held, target)?;
    Ok(ApplyOutcome::Reinjected)
}
