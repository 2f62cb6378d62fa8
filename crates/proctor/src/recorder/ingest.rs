//! Wire shapes of the batch-event ingestion endpoint.
//!
//! Request: `{"events":[{"type", "data"?, "timestamp"?, "fileId"?, "checkpoint"?}]}`.
//! Response: `{"success":true, "eventsRecorded":n, "sessionId":"..."}`.
//!
//! Raw events are deliberately loose (every field optional) so a type-less
//! event deserializes and is then rejected by validation with its index,
//! instead of failing the whole body with an opaque serde error.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::event::{EventBatch, SessionEvent};
use crate::error::ValidationError;
use crate::ids::RecordingId;

/// Either epoch milliseconds or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub checkpoint: Option<bool>,
}

impl From<&SessionEvent> for RawEvent {
    fn from(event: &SessionEvent) -> Self {
        Self {
            event_type: Some(event.event_type.clone()),
            data: (!event.data.is_null()).then(|| event.data.clone()),
            timestamp: Some(RawTimestamp::Text(event.timestamp.to_rfc3339())),
            file_id: event.file_id.clone(),
            checkpoint: Some(event.checkpoint),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

impl IngestRequest {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a SessionEvent>) -> Self {
        Self {
            events: events.into_iter().map(RawEvent::from).collect(),
        }
    }

    /// Convert to a validated batch. Missing timestamps default to `now`.
    pub fn into_batch(self, now: DateTime<Utc>) -> Result<EventBatch, ValidationError> {
        if self.events.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        let mut events = Vec::with_capacity(self.events.len());
        for (index, raw) in self.events.into_iter().enumerate() {
            let event_type = raw
                .event_type
                .filter(|t| !t.trim().is_empty())
                .ok_or(ValidationError::MissingEventType { index })?;
            let timestamp = match &raw.timestamp {
                None => now,
                Some(ts) => ts.parse().ok_or_else(|| ValidationError::InvalidTimestamp {
                    index,
                    value: match ts {
                        RawTimestamp::Millis(ms) => ms.to_string(),
                        RawTimestamp::Text(s) => s.clone(),
                    },
                })?,
            };
            events.push(SessionEvent {
                event_type,
                data: raw.data.unwrap_or(serde_json::Value::Null),
                timestamp,
                file_id: raw.file_id,
                checkpoint: raw.checkpoint.unwrap_or(false),
            });
        }
        EventBatch::new(events)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub events_recorded: usize,
    pub session_id: RecordingId,
}
