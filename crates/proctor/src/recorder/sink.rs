//! Destinations for flushed event batches.

use std::sync::Arc;

use async_trait::async_trait;

use super::{EventRecorder, IngestRequest, IngestResponse, SessionEvent};
use crate::ids::CandidateId;
use crate::transport::{HttpClient, TransportError};

/// Where an [`EventBuffer`](super::EventBuffer) sends its batches. Errors
/// are [`TransportError`]s so the retry policy can classify them.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver `events` and return how many were accepted.
    async fn send(&self, events: &[SessionEvent]) -> Result<usize, TransportError>;
}

/// Delivers straight into an in-process [`EventRecorder`].
pub struct RecorderSink {
    recorder: Arc<EventRecorder>,
    candidate: CandidateId,
}

impl RecorderSink {
    pub fn new(recorder: Arc<EventRecorder>, candidate: CandidateId) -> Self {
        Self {
            recorder,
            candidate,
        }
    }
}

#[async_trait]
impl EventSink for RecorderSink {
    async fn send(&self, events: &[SessionEvent]) -> Result<usize, TransportError> {
        self.recorder
            .record_events(&self.candidate, events.to_vec())
            .await
            .map(|receipt| receipt.accepted)
            // Reuse the endpoint's status mapping: validation is terminal,
            // storage failures are retried.
            .map_err(|e| TransportError::Status {
                status: e.status_code(),
                body: e.to_string(),
            })
    }
}

/// POSTs batches to the ingestion endpoint.
pub struct HttpEventSink {
    client: HttpClient,
    url: String,
}

impl HttpEventSink {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn send(&self, events: &[SessionEvent]) -> Result<usize, TransportError> {
        let request = IngestRequest::from_events(events);
        let response: IngestResponse = self.client.post_json(&self.url, &request).await?;
        Ok(response.events_recorded)
    }
}
