//! Batched session-event recording.
//!
//! Server side, [`EventRecorder`] validates a batch, resolves the
//! candidate's session recording (get-or-create, once per candidate), writes
//! every event in one call and bumps the running counter once by the batch
//! size.
//!
//! Client side, [`EventBuffer`] accumulates events and flushes them through
//! a [`ResilientTransport`](crate::transport::ResilientTransport) into an
//! [`EventSink`]. Checkpoint events flush immediately.

pub mod buffer;
pub mod event;
pub mod ingest;
pub mod sink;

pub use buffer::{BufferConfig, BufferError, EventBuffer};
pub use event::{EventBatch, SessionEvent};
pub use ingest::{IngestRequest, IngestResponse, RawEvent, RawTimestamp};
pub use sink::{EventSink, HttpEventSink, RecorderSink};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{NotFoundError, ValidationError};
use crate::ids::{CandidateId, RecordingId};
use crate::store::{StorageError, Store};

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("failed to persist events: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for RecordError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(nf) => RecordError::NotFound(nf),
            other => RecordError::Storage(other),
        }
    }
}

impl RecordError {
    /// HTTP status the ingestion endpoint answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            RecordError::Validation(_) => 400,
            RecordError::NotFound(_) => 404,
            RecordError::Storage(_) => 500,
        }
    }
}

// ── Recorder ───────────────────────────────────────────────────────

/// Result of one accepted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReceipt {
    pub accepted: usize,
    pub session_id: RecordingId,
    /// The recording's counter after this batch.
    pub event_count: u64,
}

pub struct EventRecorder {
    store: Arc<dyn Store>,
    recordings: Mutex<HashMap<CandidateId, Arc<OnceCell<RecordingId>>>>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            recordings: Mutex::new(HashMap::new()),
        }
    }

    /// The candidate's recording id. Concurrent first callers share one
    /// `get_or_create_session_recording` call.
    pub async fn recording_for(&self, candidate: &CandidateId) -> Result<RecordingId, RecordError> {
        let cell = {
            let mut recordings = self.recordings.lock().unwrap_or_else(|e| e.into_inner());
            recordings.entry(candidate.clone()).or_default().clone()
        };
        let id = cell
            .get_or_try_init(|| async {
                let recording = self.store.get_or_create_session_recording(candidate).await?;
                info!(candidate = %candidate, recording = %recording.id, "session recording ready");
                Ok::<_, RecordError>(recording.id)
            })
            .await?;
        Ok(id.clone())
    }

    /// Validate and persist `events` for `candidate`.
    pub async fn record_events(
        &self,
        candidate: &CandidateId,
        events: Vec<SessionEvent>,
    ) -> Result<RecordReceipt, RecordError> {
        let batch = EventBatch::new(events)?;
        self.record_batch(candidate, batch).await
    }

    /// Persist an already-validated batch: the rows and the counter bump by
    /// the batch size go to the store as one unit.
    pub async fn record_batch(
        &self,
        candidate: &CandidateId,
        batch: EventBatch,
    ) -> Result<RecordReceipt, RecordError> {
        let session_id = self.recording_for(candidate).await?;
        let accepted = batch.len();
        let event_count = self.store.record_event_batch(&session_id, &batch).await?;
        debug!(
            candidate = %candidate,
            recording = %session_id,
            accepted,
            checkpoint = batch.has_checkpoint(),
            "recorded event batch"
        );
        Ok(RecordReceipt {
            accepted,
            session_id,
            event_count,
        })
    }

    /// Handle an ingestion request body.
    pub async fn ingest(
        &self,
        candidate: &CandidateId,
        request: IngestRequest,
    ) -> Result<IngestResponse, RecordError> {
        let batch = request.into_batch(Utc::now())?;
        let receipt = self.record_batch(candidate, batch).await?;
        Ok(IngestResponse {
            success: true,
            events_recorded: receipt.accepted,
            session_id: receipt.session_id,
        })
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let recordings = self.recordings.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("EventRecorder")
            .field("candidates", &recordings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CandidateRecord, InMemoryStore};

    fn setup() -> (Arc<InMemoryStore>, EventRecorder) {
        let store = Arc::new(InMemoryStore::new());
        store.insert_candidate(CandidateRecord::new("c1", "javascript"));
        let recorder = EventRecorder::new(store.clone());
        (store, recorder)
    }

    #[tokio::test]
    async fn keystrokes_and_checkpoint_increment_counter_once() {
        let (store, recorder) = setup();
        let candidate = CandidateId::new("c1");
        let receipt = recorder
            .record_events(
                &candidate,
                vec![
                    SessionEvent::new("keystroke"),
                    SessionEvent::new("keystroke"),
                    SessionEvent::new("agent.question_answered").checkpoint(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(receipt.accepted, 3);
        assert_eq!(receipt.event_count, 3);
        assert_eq!(store.stats().event_writes(), 1);
        assert_eq!(store.stats().count_increments(), 1);

        let events = store.list_events(&receipt.session_id).await.unwrap();
        let checkpoint = events
            .iter()
            .find(|e| e.event_type == "agent.question_answered")
            .unwrap();
        assert!(checkpoint.checkpoint);
    }

    #[tokio::test]
    async fn invalid_batches_write_nothing() {
        let (store, recorder) = setup();
        let candidate = CandidateId::new("c1");

        let empty = recorder.record_events(&candidate, vec![]).await.unwrap_err();
        assert_eq!(empty.status_code(), 400);

        let typeless = recorder
            .record_events(
                &candidate,
                vec![SessionEvent::new("keystroke"), SessionEvent::new("")],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            typeless,
            RecordError::Validation(ValidationError::MissingEventType { index: 1 })
        ));

        assert_eq!(store.stats().recordings_created(), 0);
        assert_eq!(store.stats().event_writes(), 0);
        assert!(store.get_session_recording(&candidate).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_first_batches_create_one_recording() {
        let (store, recorder) = setup();
        let candidate = CandidateId::new("c1");
        let batch = || vec![SessionEvent::new("keystroke")];

        let (a, b, c) = tokio::join!(
            recorder.record_events(&candidate, batch()),
            recorder.record_events(&candidate, batch()),
            recorder.record_events(&candidate, batch()),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(b.session_id, c.session_id);
        assert_eq!(store.stats().recordings_created(), 1);

        let recording = store.get_session_recording(&candidate).await.unwrap().unwrap();
        assert_eq!(recording.event_count, 3);
    }

    #[tokio::test]
    async fn unknown_candidate_maps_to_404() {
        let (_, recorder) = setup();
        let err = recorder
            .record_events(&CandidateId::new("ghost"), vec![SessionEvent::new("k")])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn storage_failure_maps_to_500() {
        let (store, recorder) = setup();
        let candidate = CandidateId::new("c1");
        recorder.recording_for(&candidate).await.unwrap();
        store.set_fail_writes(true);
        let err = recorder
            .record_events(&candidate, vec![SessionEvent::new("k")])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn ingest_returns_wire_response() {
        let (_, recorder) = setup();
        let request: IngestRequest = serde_json::from_value(serde_json::json!({
            "events": [{"type": "keystroke", "data": {"key": "a"}}]
        }))
        .unwrap();
        let response = recorder.ingest(&CandidateId::new("c1"), request).await.unwrap();
        assert!(response.success);
        assert_eq!(response.events_recorded, 1);
    }
}
