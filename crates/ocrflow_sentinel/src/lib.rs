//! Watch-folder orchestrator (spec.md): discovers comic book archives,
//! drives the PREP/OCR stage workers to completion, and publishes searchable
//! PDFs. See each module's doc comment for the spec.md section it
//! implements.

pub mod clock;
pub mod duplicate;
pub mod error;
pub mod guards;
pub mod janitor;
pub mod observability;
pub mod pdf;
pub mod recovery;
pub mod scheduler;
pub mod shared;
pub mod stage_client;
pub mod store;

#[cfg(feature = "test-support")]
pub mod stage_stub;
