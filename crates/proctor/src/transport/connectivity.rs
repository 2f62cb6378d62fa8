//! Host connectivity state.
//!
//! A shared online/offline flag that the transport consults before retrying
//! a network failure. Whoever has the best view of reachability (an OS hook,
//! a browser bridge, or [`Connectivity::spawn_probe`]) calls
//! [`Connectivity::set_online`]; waiters are woken on the transition.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.tx.send_replace(online);
        if previous != online {
            info!(online, "connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the host is online or `timeout` elapses. Returns whether
    /// the host is online; never errors.
    pub async fn wait_for_online(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|online| *online).await.is_ok()
        })
        .await;
        waited.unwrap_or(false)
    }

    /// Probe `addr` (a `host:port`) with a TCP connect every `interval` and
    /// update the flag, until `cancel` fires.
    pub fn spawn_probe(
        &self,
        addr: String,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let online = probe_once(&addr, interval).await;
                debug!(%addr, online, "connectivity probe");
                this.set_online(online);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        })
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// One TCP reachability check.
pub async fn probe_once(addr: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn wait_for_online_times_out_with_false() {
        let conn = Connectivity::new(false);
        assert!(!conn.wait_for_online(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn wait_for_online_returns_immediately_when_online() {
        let conn = Connectivity::default();
        assert!(conn.wait_for_online(Duration::from_millis(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_online_wakes_on_transition() {
        let conn = Connectivity::new(false);
        let setter = conn.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            setter.set_online(true);
        });
        assert!(conn.wait_for_online(Duration::from_secs(10)).await);
        assert!(conn.is_online());
    }

    #[tokio::test]
    async fn probe_detects_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(probe_once(&addr, Duration::from_secs(1)).await);
    }
}
