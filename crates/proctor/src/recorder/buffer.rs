//! Client-side event buffering.
//!
//! Events accumulate in memory and go out in batches: when `max_batch` is
//! reached, when a checkpoint is pushed, on an explicit [`EventBuffer::flush`],
//! or on the periodic timer. Events without a type are refused at
//! [`EventBuffer::push`]. A flush that fails transiently (or is cancelled)
//! puts its events back at the front of the queue, so checkpoints survive an
//! outage and the next flush tries again. A batch the server rejects
//! outright is dropped with a warning instead, so it cannot wedge the queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{EventSink, SessionEvent};
use crate::error::ValidationError;
use crate::transport::{ResilientTransport, TransportError, best_effort};

/// Why [`EventBuffer::push`] failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The event was refused and never queued.
    #[error("event refused: {0}")]
    Invalid(#[from] ValidationError),

    /// The flush the push triggered did not deliver.
    #[error(transparent)]
    Delivery(#[from] TransportError),
}

impl BufferError {
    /// HTTP status of a delivery failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            BufferError::Delivery(e) => e.status(),
            BufferError::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Flush as soon as this many events are pending.
    pub max_batch: usize,
    /// Period of the background flush.
    pub flush_interval: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_batch: 50,
            flush_interval: Duration::from_secs(5),
        }
    }
}

pub struct EventBuffer {
    pending: Mutex<VecDeque<SessionEvent>>,
    sink: Arc<dyn EventSink>,
    transport: ResilientTransport,
    config: BufferConfig,
    /// Aborts an in-flight flush (and its retries).
    cancel: CancellationToken,
    /// One flush at a time, so re-queued events keep their order.
    flushing: tokio::sync::Mutex<()>,
}

impl EventBuffer {
    pub fn new(sink: Arc<dyn EventSink>, transport: ResilientTransport, config: BufferConfig) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            sink,
            transport,
            config,
            cancel: CancellationToken::new(),
            flushing: tokio::sync::Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort the in-flight flush and stop delivering. Pending events stay
    /// queued; later flushes fail with `Cancelled`.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Queue `event`. Flushes right away if it is a checkpoint or the
    /// batch is full, and returns how many events that flush delivered
    /// (0 when nothing was flushed). An event with a blank type is refused
    /// without touching the queue.
    pub async fn push(&self, event: SessionEvent) -> Result<usize, BufferError> {
        if !event.has_type() {
            return Err(ValidationError::MissingEventType { index: 0 }.into());
        }
        let checkpoint = event.checkpoint;
        let len = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.push_back(event);
            pending.len()
        };
        if checkpoint || len >= self.config.max_batch {
            debug!(checkpoint, pending = len, "flushing event buffer early");
            Ok(self.flush().await?)
        } else {
            Ok(0)
        }
    }

    /// Send everything pending. On a retryable failure or cancellation the
    /// events go back to the front of the queue in their original order. A
    /// terminal rejection drops the batch.
    pub async fn flush(&self) -> Result<usize, TransportError> {
        let _guard = self.flushing.lock().await;
        let batch: Vec<SessionEvent> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let sink = self.sink.as_ref();
        let outcome = self
            .transport
            .execute(&self.cancel, |_| sink.send(&batch))
            .await;

        match &outcome {
            Err(e) if e.is_retryable() || e.is_cancelled() => {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                for event in batch.into_iter().rev() {
                    pending.push_front(event);
                }
            }
            Err(e) => {
                warn!(
                    dropped = batch.len(),
                    checkpoints = batch.iter().filter(|ev| ev.checkpoint).count(),
                    "Event batch rejected, dropping it: {e}"
                );
            }
            Ok(_) => {}
        }
        outcome
    }

    /// Flush every `flush_interval` until `stop` fires, then flush once more.
    /// Failures are logged through [`best_effort`] and retried next tick.
    pub fn spawn_periodic_flush(self: &Arc<Self>, stop: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = best_effort("periodic event flush", this.flush()).await;
                    }
                }
            }
            let _ = best_effort("final event flush", this.flush()).await;
        })
    }
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer")
            .field("pending", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
