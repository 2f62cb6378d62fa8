//! Explicit wrapper for operations whose failure must not stop the caller.
//!
//! A failed best-effort operation is logged at WARN and handed back as a
//! [`BestEffort`]. The caller decides whether to look at it; nothing is
//! swallowed implicitly.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

#[derive(Debug)]
pub struct BestEffort<T, E> {
    operation: &'static str,
    outcome: Result<T, E>,
}

impl<T, E> BestEffort<T, E> {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }

    pub fn ok(self) -> Option<T> {
        self.outcome.ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.outcome
    }
}

/// Await `fut`, logging a warning if it fails.
pub async fn best_effort<T, E, Fut>(operation: &'static str, fut: Fut) -> BestEffort<T, E>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    let outcome = fut.await;
    match &outcome {
        Ok(_) => debug!("{operation} succeeded"),
        Err(e) => warn!("Best-effort {operation} failed: {e}"),
    }
    BestEffort { operation, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failure_is_returned_not_swallowed() {
        let result = best_effort("reset conversation", async { Err::<(), _>("boom") }).await;
        assert!(!result.is_ok());
        assert_eq!(result.error(), Some(&"boom"));
        assert_eq!(result.operation(), "reset conversation");
    }

    #[tokio::test]
    async fn success_passes_value_through() {
        let result = best_effort("flush", async { Ok::<_, String>(3) }).await;
        assert_eq!(result.ok(), Some(3));
    }
}
