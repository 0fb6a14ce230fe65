//! Library-boundary errors for protocol-level parsing and I/O.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid identifier: {0}")]
    Id(#[from] ocrflow_ids::IdParseError),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}
