//! Error types for the sandbox module.

use std::time::Duration;

use crate::error::{NotFoundError, ValidationError};
use crate::ids::CandidateId;
use crate::store::StorageError;

/// Errors produced by the sandbox layer.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox not initialized for candidate {0}")]
    NotInitialized(CandidateId),

    #[error("command `{command}` failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("file not found in sandbox: {0}")]
    FileNotFound(String),

    #[error("sandbox command timed out after {0:?}")]
    Timeout(Duration),

    #[error("sandbox I/O error: {0}")]
    Io(String),

    #[error("sandbox provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<std::io::Error> for SandboxError {
    fn from(err: std::io::Error) -> Self {
        SandboxError::Io(err.to_string())
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
