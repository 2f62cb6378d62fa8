//! Error taxonomy shared by every subsystem.
//!
//! Each subsystem owns a focused error enum (`SandboxError`, `StorageError`,
//! `TransportError`, `HarnessError`, `RecordError`, `ToolError`). The two
//! cross-cutting categories, [`ValidationError`] and [`NotFoundError`], live
//! here so all of them can wrap the same variants. [`Error`] aggregates the
//! lot for callers that just want one type (the CLI, config loading).

use thiserror::Error;

use crate::ids::{CandidateId, RecordingId};

/// Malformed input, rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Tool arguments failed to parse or did not match the tool's schema.
    #[error("{0}")]
    Arguments(String),

    #[error("event batch is empty")]
    EmptyBatch,

    #[error("event at index {index} is missing a non-empty 'type'")]
    MissingEventType { index: usize },

    #[error("event at index {index} has an unparseable timestamp: {value}")]
    InvalidTimestamp { index: usize, value: String },

    /// A command argument cannot be represented safely in a shell line.
    #[error("argument cannot be quoted for the shell: {0}")]
    Unquotable(String),

    #[error("path '{0}' escapes the workspace")]
    PathEscape(String),
}

/// A referenced entity does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("candidate not found: {0}")]
    Candidate(CandidateId),

    #[error("session recording not found: {0}")]
    Recording(RecordingId),
}

/// Top-level error for callers that do not care which layer failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Sandbox(#[from] crate::sandbox::SandboxError),

    #[error(transparent)]
    Storage(#[from] crate::store::StorageError),

    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    #[error(transparent)]
    Harness(#[from] crate::harness::HarnessError),

    #[error(transparent)]
    Record(#[from] crate::recorder::RecordError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
