//! Retry, backoff, per-attempt timeout and cancellation around any
//! fallible async call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Connectivity, TransportConfig, TransportError};

/// Passed to the observer before each backoff wait.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryNotice {
    /// 1-based retry number.
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: TransportError,
}

pub type RetryObserver = Arc<dyn Fn(&RetryNotice) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ResilientTransport {
    config: TransportConfig,
    connectivity: Option<Connectivity>,
    observer: Option<RetryObserver>,
}

impl fmt::Debug for ResilientTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientTransport")
            .field("config", &self.config)
            .field("connectivity", &self.connectivity.is_some())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ResilientTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            connectivity: None,
            observer: None,
        }
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Call `observer` before every backoff wait, e.g. to show
    /// "retrying in 4s".
    pub fn with_observer(mut self, observer: impl Fn(&RetryNotice) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails terminally, or retries run out.
    ///
    /// `op` receives the 0-based attempt index. Each attempt races the
    /// cancellation token and `attempt_timeout`. Cancellation, whether
    /// during an attempt or a backoff wait, returns
    /// [`TransportError::Cancelled`] at once. After the last retry the last
    /// error is returned.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let timeout = self.config.attempt_timeout;
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportError::Cancelled),
                r = tokio::time::timeout(timeout, op(attempt)) => {
                    r.unwrap_or(Err(TransportError::Timeout(timeout)))
                }
            };
            let error = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("transport call succeeded after {attempt} retr(ies)");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= self.config.max_retries {
                warn!(
                    "Transport call failed after {} retries: {error}",
                    self.config.max_retries
                );
                return Err(error);
            }

            let delay = self.config.delay_for_attempt(attempt);
            warn!(
                "Transient transport error (attempt {}/{}): {error}. Retrying in {delay:?}...",
                attempt + 1,
                self.config.max_retries,
            );
            if let Some(observer) = &self.observer {
                observer(&RetryNotice {
                    attempt: attempt + 1,
                    max_retries: self.config.max_retries,
                    delay,
                    error: error.clone(),
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            if error.is_network()
                && let Some(connectivity) = &self.connectivity
                && let Some(wait) = self.config.connectivity_wait
                && !connectivity.is_online()
            {
                debug!("host offline, waiting up to {wait:?} for connectivity");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    online = connectivity.wait_for_online(wait) => {
                        if !online {
                            debug!("still offline after {wait:?}, retrying anyway");
                        }
                    }
                }
            }

            attempt += 1;
        }
    }
}
