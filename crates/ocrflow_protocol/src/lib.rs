//! Domain types, fingerprinting, and stage-worker wire contracts shared by
//! the orchestrator (`ocrflow_sentinel`) and, in principle, by any PREP/OCR
//! stage-worker implementation that wants to speak the same JSON shapes.
//!
//! Modules mirror spec.md's component boundaries:
//! - [`types`] — Job/Profile/Index schema (§3).
//! - [`fingerprint`] — `fileHash`, `canonicalProfile`, `stableJSON`,
//!   `makeJobKey` (§4.1).
//! - [`http_types`] — the PREP/OCR HTTP request/response bodies (§6).
//! - [`paths`] / [`naming`] — on-disk layout and filename conventions (§3).
//! - [`metrics`] — scheduler counters (§4.6, §7).
//! - [`config`] — environment-driven runtime configuration (§6).
//! - [`defaults`] — every configuration default and magic constant.
//! - [`error`] — library-boundary errors.

pub mod config;
pub mod defaults;
pub mod error;
pub mod fingerprint;
pub mod http_types;
pub mod metrics;
pub mod naming;
pub mod paths;
pub mod types;

pub use config::{Config, RuntimeConfig};
pub use error::ProtocolError;
pub use fingerprint::{canonical_profile, file_hash, make_job_key, normalize_lang, stable_json};
pub use http_types::{Artifacts, JobStatusResponse, OcrSubmitRequest, PrepSubmitRequest, ServiceInfo, WorkerState};
pub use metrics::{Metrics, MetricsSnapshot};
pub use paths::{DataLayout, Stage};
pub use types::{
    DuplicateAction, DuplicateDecision, DuplicateReport, DuplicateState, DuplicateStatus,
    Index, IndexEntry, JobState, LoadOutcome, OcrProfile, PrepProfile, Profile, StateJob,
    StateJobPatch,
};
