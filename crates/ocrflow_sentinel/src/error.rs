//! Orchestrator-level errors. Library-boundary failures (a single tick step,
//! a single store read, a single stage-client call) are `thiserror`-derived
//! so call sites can match on variant; nothing above tick-step granularity
//! is allowed to `?`-propagate out of the tick itself (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ocrflow_protocol::ProtocolError),

    #[error(transparent)]
    Id(#[from] ocrflow_ids::IdParseError),

    #[error("stage worker transport error: {0}")]
    Transport(String),

    #[error("stage worker rejected submission with status {0}")]
    SubmitRejected(u16),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
