//! A [`SandboxClient`] backed by local processes.
//!
//! Each candidate gets a directory under `base_dir`; commands run through
//! `sh -c` inside it. Test batches are judged stdin/stdout style: the
//! solution file is run once per case with the case input on stdin, and the
//! case passes when trimmed stdout equals the trimmed expected output.
//!
//! This is not an isolation boundary. It exists for the CLI and for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{
    BatchExecution, BatchRequest, CaseExecution, CommandOutput, CommandSpec, SandboxClient,
    SandboxError, SandboxResult, SandboxSession, TestCase, normalize_workspace_path,
};
use crate::ids::{CandidateId, SandboxId};

/// Default wall-clock limit for a single command or test case.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LocalSandbox {
    base_dir: PathBuf,
    command_timeout: Duration,
    interpreters: HashMap<String, Vec<String>>,
}

impl LocalSandbox {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let interpreters = [
            ("python", vec!["python3"]),
            ("javascript", vec!["node"]),
            ("typescript", vec!["npx", "--yes", "tsx"]),
            ("ruby", vec!["ruby"]),
            ("bash", vec!["bash"]),
        ]
        .into_iter()
        .map(|(lang, cmd)| (lang.to_string(), cmd.into_iter().map(String::from).collect()))
        .collect();

        Self {
            base_dir: base_dir.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            interpreters,
        }
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Register (or replace) the interpreter command used for `language`.
    pub fn interpreter(mut self, language: impl Into<String>, command: Vec<String>) -> Self {
        self.interpreters.insert(language.into(), command);
        self
    }

    /// Build a session rooted at an existing directory without provisioning.
    pub fn session_at(candidate: &CandidateId, root: &Path) -> SandboxSession {
        SandboxSession {
            id: SandboxId::new(format!("local-{candidate}")),
            candidate_id: candidate.clone(),
            workspace_root: root.to_string_lossy().to_string(),
        }
    }

    async fn judge_case(
        &self,
        interpreter: &[String],
        file: &str,
        root: &str,
        case: &TestCase,
    ) -> CaseExecution {
        let start = Instant::now();
        let Some((program, prefix)) = interpreter.split_first() else {
            return CaseExecution {
                name: case.name.clone(),
                error: Some("empty interpreter command".into()),
                ..Default::default()
            };
        };

        let run = async {
            let mut child = Command::new(program)
                .args(prefix)
                .arg(file)
                .current_dir(root)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(case.input.as_bytes()).await?;
            }
            child.wait_with_output().await
        };

        let result = tokio::time::timeout(self.command_timeout, run).await;
        let duration_ms = Some(start.elapsed().as_millis() as u64);
        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let passed =
                    output.status.success() && stdout.trim() == case.expected_output.trim();
                let error = (!output.status.success()).then(|| match output.status.code() {
                    Some(code) => format!("exited with status {code}"),
                    None => "terminated by signal".to_string(),
                });
                CaseExecution {
                    name: case.name.clone(),
                    passed,
                    output: Some(stdout),
                    stderr: (!stderr.is_empty()).then_some(stderr),
                    error,
                    duration_ms,
                }
            }
            Ok(Err(e)) => CaseExecution {
                name: case.name.clone(),
                error: Some(format!("failed to run {program}: {e}")),
                duration_ms,
                ..Default::default()
            },
            Err(_) => CaseExecution {
                name: case.name.clone(),
                error: Some(format!(
                    "timed out after {}s",
                    self.command_timeout.as_secs()
                )),
                duration_ms,
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl SandboxClient for LocalSandbox {
    async fn provision(&self, candidate: &CandidateId) -> SandboxResult<SandboxSession> {
        let dir_name: String = candidate
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let root = self.base_dir.join(dir_name);
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self::session_at(candidate, &root))
    }

    async fn run_command(
        &self,
        session: &SandboxSession,
        command: &CommandSpec,
    ) -> SandboxResult<CommandOutput> {
        let line = command.to_shell_line()?;
        let workdir = command
            .working_dir()
            .unwrap_or(&session.workspace_root)
            .to_string();
        debug!(sandbox = %session.id, %line, "running local command");

        let run = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .current_dir(&workdir)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.command_timeout, run)
            .await
            .map_err(|_| SandboxError::Timeout(self.command_timeout))??;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn read_file(&self, session: &SandboxSession, path: &str) -> SandboxResult<String> {
        let full = normalize_workspace_path(&session.workspace_root, Some(path))?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SandboxError::FileNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn execute_batch(
        &self,
        session: &SandboxSession,
        request: &BatchRequest,
    ) -> SandboxResult<BatchExecution> {
        let interpreter = self
            .interpreters
            .get(&request.language.to_lowercase())
            .ok_or_else(|| {
                SandboxError::Provider(format!(
                    "no local interpreter for language '{}'",
                    request.language
                ))
            })?;

        let file = normalize_workspace_path(&session.workspace_root, Some(&request.file_name))?;
        tokio::fs::write(&file, &request.code).await?;

        let mut results = Vec::with_capacity(request.cases.len());
        for case in &request.cases {
            results.push(
                self.judge_case(interpreter, &file, &session.workspace_root, case)
                    .await,
            );
        }
        Ok(BatchExecution::from_results(results))
    }
}
