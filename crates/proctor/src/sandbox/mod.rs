//! Client-side contract for the per-candidate remote execution environment.
//!
//! Everything that touches a candidate's code goes through the
//! [`SandboxClient`] trait: run a command, read a file, or execute a batch of
//! test cases. How the provider isolates the workload is its own business;
//! this module only fixes what the core needs from it.
//!
//! # Submodules
//!
//! - [`command`]: [`CommandSpec`] argument vectors, shell quoting, and
//!   workspace path normalization.
//! - [`batch`]: [`TestCase`], [`BatchRequest`] and [`BatchExecution`] for
//!   the batched test execution primitive.
//! - [`sessions`]: [`SandboxSessions`], the per-candidate session table with
//!   get-or-provision semantics and a per-session command lock.
//! - [`local`]: [`LocalSandbox`], a process-backed provider for the CLI
//!   and tests.
//! - [`error`]: [`SandboxError`] / [`SandboxResult`].

pub mod batch;
pub mod command;
pub mod error;
pub mod local;
pub mod sessions;

pub use batch::{BatchExecution, BatchRequest, CaseExecution, TestCase};
pub use command::{CommandSpec, normalize_workspace_path};
pub use error::{SandboxError, SandboxResult};
pub use local::LocalSandbox;
pub use sessions::SandboxSessions;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::{CandidateId, SandboxId};

/// The remote environment bound to one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxSession {
    pub id: SandboxId,
    pub candidate_id: CandidateId,
    /// Absolute path of the candidate's workspace inside the sandbox.
    pub workspace_root: String,
}

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capabilities the core requires from a sandbox provider.
#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// Create a new environment for `candidate`. Called at most once per
    /// candidate by [`SandboxSessions`]; existing sessions are reused.
    async fn provision(&self, candidate: &CandidateId) -> SandboxResult<SandboxSession>;

    /// Run one command. Output bounding (`CommandSpec::head_limit`) is applied
    /// inside the sandbox, not after transfer.
    async fn run_command(
        &self,
        session: &SandboxSession,
        command: &CommandSpec,
    ) -> SandboxResult<CommandOutput>;

    /// Read a file relative to the session's workspace root.
    async fn read_file(&self, session: &SandboxSession, path: &str) -> SandboxResult<String>;

    /// Run `request.code` against every case in a single round trip.
    async fn execute_batch(
        &self,
        session: &SandboxSession,
        request: &BatchRequest,
    ) -> SandboxResult<BatchExecution>;
}
