//! Pending-resolution state for an external verification widget.
//!
//! The widget hands back a token asynchronously; whoever started the flow
//! waits for it. Each [`PendingVerification`] owns at most one outstanding
//! flow. Starting a new flow supersedes the previous one, and separate
//! instances never see each other's tokens.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

/// How a verification flow ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The widget produced this token.
    Resolved(String),
    /// A newer flow was started on the same instance.
    Superseded,
    /// The flow was cancelled, or the state object was dropped.
    Cancelled,
    /// No token arrived in time.
    TimedOut,
}

struct Slot {
    generation: u64,
    tx: oneshot::Sender<VerificationOutcome>,
}

#[derive(Default)]
pub struct PendingVerification {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_generation: u64,
    slot: Option<Slot>,
}

/// The waiting side of one flow.
#[derive(Debug)]
pub struct VerificationFlow {
    generation: u64,
    rx: oneshot::Receiver<VerificationOutcome>,
}

impl VerificationFlow {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn wait(self) -> VerificationOutcome {
        self.rx.await.unwrap_or(VerificationOutcome::Cancelled)
    }

    pub async fn wait_timeout(self, timeout: Duration) -> VerificationOutcome {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => VerificationOutcome::Cancelled,
            Err(_) => VerificationOutcome::TimedOut,
        }
    }
}

impl PendingVerification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a flow. Any flow still pending on this instance resolves to
    /// [`VerificationOutcome::Superseded`].
    pub fn begin(&self) -> VerificationFlow {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_generation += 1;
        let generation = inner.next_generation;
        if let Some(previous) = inner.slot.replace(Slot { generation, tx }) {
            debug!("verification flow {} superseded", previous.generation);
            let _ = previous.tx.send(VerificationOutcome::Superseded);
        }
        VerificationFlow { generation, rx }
    }

    /// Complete the current flow with `token`. Returns `false` if nothing
    /// was pending or the waiter had already gone away.
    pub fn resolve(&self, token: impl Into<String>) -> bool {
        let slot = self.take();
        match slot {
            Some(slot) => slot
                .tx
                .send(VerificationOutcome::Resolved(token.into()))
                .is_ok(),
            None => false,
        }
    }

    /// Cancel the current flow, if any.
    pub fn cancel(&self) -> bool {
        match self.take() {
            Some(slot) => slot.tx.send(VerificationOutcome::Cancelled).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.slot.as_ref().is_some_and(|s| !s.tx.is_closed())
    }

    fn take(&self) -> Option<Slot> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.slot.take()
    }
}

impl std::fmt::Debug for PendingVerification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingVerification")
            .field("pending", &self.is_pending())
            .finish()
    }
}
