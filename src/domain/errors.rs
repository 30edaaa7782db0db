//! Error taxonomy for the assessment engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the engine and its services.
#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Out-of-sequence turn: expected step {expected}, got {got}")]
    Sequence { expected: u32, got: u32 },

    #[error("Session {0} is already complete")]
    SessionComplete(Uuid),

    #[error("Session {0} has not recorded every turn yet")]
    SessionIncomplete(Uuid),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Judgment call '{operation}' timed out after {after_ms}ms")]
    Timeout { operation: &'static str, after_ms: u64 },

    #[error("Store did not confirm the write, retry permitted: {0}")]
    Recoverable(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid game definition: {0}")]
    InvalidGame(String),
}

impl AssessmentError {
    /// Category reported to observers.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Sequence { .. } | Self::SessionComplete(_) | Self::SessionIncomplete(_) => {
                ErrorKind::Sequence
            }
            Self::Classification(_) => ErrorKind::Classification,
            Self::Validation(_) | Self::InvalidGame(_) => ErrorKind::Validation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Recoverable(_) => ErrorKind::Recoverable,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// True when the caller may retry the same call unchanged.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

/// Coarse error category passed to `on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Sequence,
    Classification,
    Validation,
    Timeout,
    Recoverable,
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequence => "sequence",
            Self::Classification => "classification",
            Self::Validation => "validation",
            Self::Timeout => "timeout",
            Self::Recoverable => "recoverable",
            Self::Store => "store",
        };
        f.write_str(s)
    }
}

/// Failures at the judgment-capability boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JudgmentError {
    #[error("Judgment call timed out after {0}ms")]
    Timeout(u64),

    #[error("Unparseable judgment output: {0}")]
    Unparseable(String),

    #[error("Judgment transport failed: {0}")]
    Transport(String),

    #[error("Judgment request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Failures at the snapshot-store boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Snapshot store unavailable: {0}")]
    Unavailable(String),

    #[error("Snapshot serialization error: {0}")]
    Serialization(String),

    #[error("Snapshot for session {0} is corrupt: {1}")]
    Corrupt(Uuid, String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

pub type AssessmentResult<T> = Result<T, AssessmentError>;
