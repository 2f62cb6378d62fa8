//! Retry and backoff configuration.
//!
//! Delays grow as `initial_delay * backoff_factor^attempt`, capped at
//! `max_delay`. There is no jitter: with the defaults the three retries wait
//! exactly 2s, 4s and 8s.

use std::time::Duration;

/// Configuration for [`ResilientTransport`](super::ResilientTransport).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Maximum number of retries after the first attempt (0 = fail immediately).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_factor: f64,
    /// Hard limit on each individual attempt.
    pub attempt_timeout: Duration,
    /// When set, a network failure while the host is offline waits up to
    /// this long for connectivity before the next attempt.
    pub connectivity_wait: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(16_000),
            backoff_factor: 2.0,
            attempt_timeout: Duration::from_secs(60),
            connectivity_wait: None,
        }
    }
}

impl TransportConfig {
    /// Default config with the given number of retries.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// A config that never retries.
    pub fn no_retries() -> Self {
        Self::with_retries(0)
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn connectivity_wait(mut self, wait: Option<Duration>) -> Self {
        self.connectivity_wait = wait;
        self
    }

    /// Delay before retry number `attempt` (0-indexed). Never negative and
    /// never above `max_delay`, whatever the factor.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}
