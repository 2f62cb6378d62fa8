//! Transport failure classification.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, reset).
    #[error("request failed: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the call. Never retried.
    #[error("cancelled")]
    Cancelled,

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Network failures, timeouts, 408, 429 and 5xx are transient. Everything
    /// else (cancellation, client rejections, undecodable bodies) is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout(_) => true,
            TransportError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            TransportError::Cancelled | TransportError::Decode(_) => false,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}
