//! Validated identifier newtypes shared across the orchestrator.
//!
//! `fileHash` and `profileHash` are hex-encoded SHA-256 digests; `jobKey` is
//! their `__`-joined composite. Keeping the parse/validate logic here (rather
//! than scattering `String` comparisons through the scheduler) means a
//! malformed key can only ever be constructed at one boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HASH_HEX_LEN: usize = 64;
const JOB_KEY_SEP: &str = "__";

/// Error returned when parsing one of this crate's identifier types fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

fn check_hex_digest(value: &str, label: &str) -> Result<(), IdParseError> {
    if value.len() != HASH_HEX_LEN {
        return Err(IdParseError::new(format!(
            "{label} must be {HASH_HEX_LEN} hex chars, got {} chars",
            value.len()
        )));
    }
    if !value.bytes().all(|b| b.is_ascii_hexdigit()) || value.bytes().any(|b| b.is_ascii_uppercase())
    {
        return Err(IdParseError::new(format!(
            "{label} must be lowercase hex, got {value:?}"
        )));
    }
    Ok(())
}

macro_rules! define_hash_id {
    ($name:ident, $label:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a hex SHA-256 digest.
            pub fn parse(value: impl Into<String>) -> Result<Self, IdParseError> {
                let value = value.into();
                check_hex_digest(&value, $label)?;
                Ok(Self(value))
            }

            /// Wraps a digest already known to be well-formed, e.g. the
            /// direct lowercase-hex output of a SHA-256 hasher.
            pub fn from_trusted(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_hash_id!(FileHash, "fileHash");
define_hash_id!(ProfileHash, "profileHash");

/// `<fileHash>__<profileHash>`; the primary key of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    pub fn new(file_hash: &FileHash, profile_hash: &ProfileHash) -> Self {
        Self(format!("{file_hash}{JOB_KEY_SEP}{profile_hash}"))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, IdParseError> {
        let value = value.into();
        let (file_part, profile_part) = value.split_once(JOB_KEY_SEP).ok_or_else(|| {
            IdParseError::new(format!(
                "jobKey missing '{JOB_KEY_SEP}' separator: {value:?}"
            ))
        })?;
        check_hex_digest(file_part, "jobKey.fileHash")?;
        check_hex_digest(profile_part, "jobKey.profileHash")?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Splits back into the two constituent hashes.
    pub fn split(&self) -> (FileHash, ProfileHash) {
        let (file_part, profile_part) = self
            .0
            .split_once(JOB_KEY_SEP)
            .expect("JobKey invariant: always contains separator");
        (
            FileHash::from_trusted(file_part),
            ProfileHash::from_trusted(profile_part),
        )
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobKey {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for JobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
