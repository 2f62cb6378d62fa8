//! Per-candidate sandbox session table.
//!
//! One sandbox per candidate: [`SandboxSessions::acquire`] returns the bound
//! session, provisioning and binding one the first time. Provisioning runs
//! at most once per candidate in this process even when several tool calls
//! race for it.
//!
//! The sandbox file tree is shared mutable state, so every tool that talks to
//! a session holds [`SandboxSessions::lock`] for the duration of its
//! commands. Overlapping tool calls against the same candidate queue up
//! instead of interleaving reads and writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OnceCell, OwnedMutexGuard};
use tracing::{debug, info};

use super::{SandboxClient, SandboxResult, SandboxSession};
use crate::error::NotFoundError;
use crate::ids::{CandidateId, SandboxId};
use crate::store::{CandidateRecord, Store};

type SessionCell = Arc<OnceCell<SandboxSession>>;

pub struct SandboxSessions {
    client: Arc<dyn SandboxClient>,
    store: Arc<dyn Store>,
    sessions: Mutex<HashMap<CandidateId, SessionCell>>,
    locks: Mutex<HashMap<SandboxId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SandboxSessions {
    pub fn new(client: Arc<dyn SandboxClient>, store: Arc<dyn Store>) -> Self {
        Self {
            client,
            store,
            sessions: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying provider.
    pub fn client(&self) -> &dyn SandboxClient {
        self.client.as_ref()
    }

    fn cell(&self, candidate: &CandidateId) -> SessionCell {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.entry(candidate.clone()).or_default().clone()
    }

    /// Return the candidate's session, provisioning and binding one if the
    /// candidate has none yet.
    pub async fn acquire(&self, candidate: &CandidateId) -> SandboxResult<SandboxSession> {
        let cell = self.cell(candidate);
        let session = cell
            .get_or_try_init(|| async {
                let record = self
                    .store
                    .find_candidate(candidate)
                    .await?
                    .ok_or_else(|| NotFoundError::Candidate(candidate.clone()))?;
                if let Some(existing) = record.sandbox {
                    debug!(candidate = %candidate, sandbox = %existing.id, "reusing bound sandbox");
                    return Ok(existing);
                }
                let session = self.client.provision(candidate).await?;
                self.store.bind_sandbox(candidate, &session).await?;
                info!(candidate = %candidate, sandbox = %session.id, "provisioned sandbox");
                SandboxResult::Ok(session)
            })
            .await?;
        Ok(session.clone())
    }

    /// Return the candidate's session only if one is already bound. Never
    /// provisions.
    pub fn bound(&self, record: &CandidateRecord) -> Option<SandboxSession> {
        let cached = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.get(&record.id).and_then(|cell| cell.get().cloned())
        };
        cached.or_else(|| record.sandbox.clone())
    }

    /// Serialize commands against one sandbox. Hold the guard for as long
    /// as the caller's commands must not interleave with another tool call.
    pub async fn lock(&self, session: &SandboxSession) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(session.id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

impl std::fmt::Debug for SandboxSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("SandboxSessions")
            .field("candidates", &sessions.len())
            .finish()
    }
}
