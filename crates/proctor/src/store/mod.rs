//! Persistence boundary.
//!
//! The core never talks to a database directly. Everything it needs to
//! persist or look up goes through the [`Store`] trait; the concrete backend
//! lives outside this crate. [`InMemoryStore`] satisfies the contract for
//! tests and the CLI.

pub mod memory;

pub use memory::{InMemoryStore, StoreStats};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::NotFoundError;
use crate::ids::{CandidateId, RecordingId, SandboxId};
use crate::recorder::{EventBatch, SessionEvent};
use crate::sandbox::SandboxSession;

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("storage backend failed: {0}")]
    Backend(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ── Records ────────────────────────────────────────────────────────

/// The slice of a candidate the core reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: CandidateId,
    /// Language the candidate picked, e.g. `"python"`.
    pub language: String,
    /// Declarative test cases for the candidate's problem. Either a JSON
    /// array or a string holding one.
    #[serde(default)]
    pub test_cases: serde_json::Value,
    /// The sandbox currently bound to this candidate, if any.
    #[serde(default)]
    pub sandbox: Option<SandboxSession>,
}

impl CandidateRecord {
    pub fn new(id: impl Into<CandidateId>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            test_cases: serde_json::Value::Array(Vec::new()),
            sandbox: None,
        }
    }

    pub fn with_test_cases(mut self, test_cases: serde_json::Value) -> Self {
        self.test_cases = test_cases;
        self
    }

    pub fn with_sandbox(mut self, session: SandboxSession) -> Self {
        self.sandbox = Some(session);
        self
    }
}

/// Container for one candidate's session events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecording {
    pub id: RecordingId,
    pub candidate_id: CandidateId,
    /// Running total maintained by [`Store::increment_event_count`], never
    /// recomputed from the event rows.
    pub event_count: u64,
    pub created_at: DateTime<Utc>,
}

/// One persisted test result. One row per case per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub id: String,
    pub candidate_id: CandidateId,
    pub sandbox_id: SandboxId,
    pub test_name: String,
    pub passed: bool,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

// ── Store trait ────────────────────────────────────────────────────

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_candidate(&self, id: &CandidateId) -> StorageResult<Option<CandidateRecord>>;

    /// Record `session` as the candidate's sandbox. Fails with `NotFound` for
    /// an unknown candidate.
    async fn bind_sandbox(
        &self,
        candidate: &CandidateId,
        session: &SandboxSession,
    ) -> StorageResult<()>;

    /// Return the candidate's recording, creating it if absent. Idempotent:
    /// repeated calls return the same recording.
    async fn get_or_create_session_recording(
        &self,
        candidate: &CandidateId,
    ) -> StorageResult<SessionRecording>;

    async fn get_session_recording(
        &self,
        candidate: &CandidateId,
    ) -> StorageResult<Option<SessionRecording>>;

    /// Write every outcome in one call. Returns the number written.
    async fn create_test_outcomes(&self, outcomes: Vec<TestOutcome>) -> StorageResult<usize>;

    async fn list_test_outcomes(&self, candidate: &CandidateId) -> StorageResult<Vec<TestOutcome>>;

    /// Append the whole batch as one multi-row write, in batch order.
    async fn append_events(
        &self,
        recording: &RecordingId,
        events: &EventBatch,
    ) -> StorageResult<usize>;

    /// Atomically add `n` to the recording's event counter. Returns the new
    /// total.
    async fn increment_event_count(&self, recording: &RecordingId, n: u64) -> StorageResult<u64>;

    /// Append the batch and add its size to the counter as one unit, so a
    /// retried batch cannot leave rows without their count. Returns the new
    /// total. Backends with transactions should override this; the default
    /// issues the two writes in sequence.
    async fn record_event_batch(
        &self,
        recording: &RecordingId,
        events: &EventBatch,
    ) -> StorageResult<u64> {
        let n = self.append_events(recording, events).await?;
        self.increment_event_count(recording, n as u64).await
    }

    async fn list_events(&self, recording: &RecordingId) -> StorageResult<Vec<SessionEvent>>;
}
