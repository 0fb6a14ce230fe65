//! Janitor (spec.md §4.10): periodically purges `work/<jobKey>/` directories
//! older than the retention window, skipping anything currently in-flight
//! or whose name starts with `_` (the staging directory).

use ocrflow_protocol::DataLayout;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Sweeps `work/` once. `in_flight_keys` are jobKey strings the scheduler is
/// currently tracking; their directories are never touched regardless of
/// age.
pub fn sweep(layout: &DataLayout, in_flight_keys: &HashSet<String>, keep_work_dir_days: u64) {
    let threshold = Duration::from_secs(keep_work_dir_days.saturating_mul(86_400));
    let entries = match std::fs::read_dir(layout.work_dir()) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "janitor: could not list work dir");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('_') || in_flight_keys.contains(name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let age = match meta.modified().and_then(|m| SystemTime::now().duration_since(m)) {
            Ok(age) => age,
            Err(_) => continue,
        };
        if age < threshold {
            continue;
        }
        debug!(dir = %path.display(), "janitor: reclaiming aged work dir");
        if let Err(e) = std::fs::remove_dir_all(&path) {
            warn!(dir = %path.display(), error = %e, "janitor: failed to remove work dir");
        }
    }
}
