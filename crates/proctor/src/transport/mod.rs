//! Resilient outbound transport.
//!
//! - [`ResilientTransport`]: retry with exponential backoff, per-attempt
//!   timeout, cancellation, optional connectivity wait.
//! - [`TransportConfig`]: knobs and the backoff schedule.
//! - [`Connectivity`]: shared online/offline flag.
//! - [`best_effort`]: explicit "log and hand back" wrapper for
//!   non-critical calls.
//! - [`HttpClient`]: reqwest wrapper that classifies failures.

mod best_effort;
mod connectivity;
mod error;
mod http;
mod resilient;
mod retry;

pub use best_effort::{BestEffort, best_effort};
pub use connectivity::{Connectivity, probe_once};
pub use error::TransportError;
pub use http::HttpClient;
pub use resilient::{ResilientTransport, RetryNotice, RetryObserver};
pub use retry::TransportConfig;
