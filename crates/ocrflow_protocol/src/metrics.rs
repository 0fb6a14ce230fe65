//! Scheduler metrics (spec.md §4.6, §7). Plain atomics, single-writer
//! (the scheduler tick), many-reader (the observability server), mirroring
//! this codebase's lock-free counters-struct convention.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    pub queued: AtomicU64,
    pub running: AtomicU64,
    pub done: AtomicU64,
    pub error: AtomicU64,
    pub input_rejected_size: AtomicU64,
    pub input_rejected_signature: AtomicU64,
    pub disk_error: AtomicU64,
    pub pdf_invalid: AtomicU64,
}

macro_rules! inc_fn {
    ($name:ident, $field:ident) => {
        #[inline]
        pub fn $name(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    inc_fn!(inc_queued, queued);
    inc_fn!(inc_running, running);
    inc_fn!(inc_done, done);
    inc_fn!(inc_error, error);
    inc_fn!(inc_input_rejected_size, input_rejected_size);
    inc_fn!(inc_input_rejected_signature, input_rejected_signature);
    inc_fn!(inc_disk_error, disk_error);
    inc_fn!(inc_pdf_invalid, pdf_invalid);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
            done: self.done.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            input_rejected_size: self.input_rejected_size.load(Ordering::Relaxed),
            input_rejected_signature: self.input_rejected_signature.load(Ordering::Relaxed),
            disk_error: self.disk_error.load(Ordering::Relaxed),
            pdf_invalid: self.pdf_invalid.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `Metrics`, serialized to `index/metrics.json` and
/// returned by `GET /metrics`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queued: u64,
    pub running: u64,
    pub done: u64,
    pub error: u64,
    pub input_rejected_size: u64,
    pub input_rejected_signature: u64,
    pub disk_error: u64,
    pub pdf_invalid: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let m = Metrics::new();
        m.inc_queued();
        m.inc_queued();
        m.inc_done();
        let snap = m.snapshot();
        assert_eq!(snap.queued, 2);
        assert_eq!(snap.done, 1);
        assert_eq!(snap.error, 0);
    }
}
