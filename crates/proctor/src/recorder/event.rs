//! Session events and validated batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One unit of session activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Marks recoverable state (an answered question, a submission) that
    /// must be flushed promptly and never dropped to a transient failure.
    #[serde(default)]
    pub checkpoint: bool,
}

impl SessionEvent {
    /// An event of `event_type` stamped now, with no payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
            file_id: None,
            checkpoint: false,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn checkpoint(mut self) -> Self {
        self.checkpoint = true;
        self
    }

    /// Whether the event carries a non-blank type.
    pub fn has_type(&self) -> bool {
        !self.event_type.trim().is_empty()
    }
}

/// A non-empty, ordered sequence of events whose types are all non-empty.
///
/// Only constructible through [`EventBatch::new`], so anything holding one
/// has already passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch(Vec<SessionEvent>);

impl EventBatch {
    /// Validate the whole batch. One bad event rejects all of them.
    pub fn new(events: Vec<SessionEvent>) -> Result<Self, ValidationError> {
        if events.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if let Some(index) = events.iter().position(|e| !e.has_type()) {
            return Err(ValidationError::MissingEventType { index });
        }
        Ok(Self(events))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SessionEvent> {
        self.0.iter()
    }

    pub fn has_checkpoint(&self) -> bool {
        self.0.iter().any(|e| e.checkpoint)
    }

    pub fn into_events(self) -> Vec<SessionEvent> {
        self.0
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a SessionEvent;
    type IntoIter = std::slice::Iter<'a, SessionEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
