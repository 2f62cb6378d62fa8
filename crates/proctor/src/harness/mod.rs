//! Test execution harness.
//!
//! Turns the candidate's current solution file plus their problem's
//! declarative test cases into pass/fail results:
//!
//! 1. parse the stored cases (array or JSON string); none means an
//!    all-zero result,
//! 2. resolve the target file (agent override or `solution.<ext>`),
//! 3. read it from the bound sandbox,
//! 4. run every case in one [`SandboxClient::execute_batch`] call and check
//!    that each case came back exactly once,
//! 5. persist one [`TestOutcome`] per case in one store write,
//! 6. return the aggregate, with hidden cases reduced to name, pass flag
//!    and duration.
//!
//! [`SandboxClient::execute_batch`]: crate::sandbox::SandboxClient::execute_batch

pub mod cases;
pub mod language;

pub use cases::parse_test_cases;
pub use language::{default_file_name, extension_for, resolve_target_file};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{NotFoundError, ValidationError};
use crate::ids::CandidateId;
use crate::sandbox::{BatchRequest, CaseExecution, SandboxError, SandboxSessions, TestCase};
use crate::store::{StorageError, Store, TestOutcome};

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The candidate has no sandbox bound yet.
    #[error("sandbox not initialized")]
    SandboxNotInitialized,

    #[error("invalid test cases: {0}")]
    InvalidTestCases(String),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sandbox(SandboxError),

    /// Outcomes could not be written. Surfaced because scoring depends on them.
    #[error("failed to persist test outcomes: {0}")]
    Persistence(StorageError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<SandboxError> for HarnessError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::NotInitialized(_) => HarnessError::SandboxNotInitialized,
            SandboxError::Validation(e) => HarnessError::Validation(e),
            SandboxError::NotFound(e) => HarnessError::NotFound(e),
            other => HarnessError::Sandbox(other),
        }
    }
}

impl From<StorageError> for HarnessError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(e) => HarnessError::NotFound(e),
            other => HarnessError::Storage(other),
        }
    }
}

// ── Output ─────────────────────────────────────────────────────────

/// One case as reported to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl CaseReport {
    fn from_execution(exec: &CaseExecution, hidden: bool) -> Self {
        if hidden {
            return Self {
                name: exec.name.clone(),
                passed: exec.passed,
                output: None,
                error: None,
                duration: exec.duration_ms,
            };
        }
        Self {
            name: exec.name.clone(),
            passed: exec.passed,
            output: exec.output.clone(),
            error: exec.error.clone(),
            duration: exec.duration_ms,
        }
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTestsOutput {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<CaseReport>,
}

// ── Harness ────────────────────────────────────────────────────────

pub struct TestHarness {
    sessions: Arc<SandboxSessions>,
    store: Arc<dyn Store>,
}

impl TestHarness {
    pub fn new(sessions: Arc<SandboxSessions>, store: Arc<dyn Store>) -> Self {
        Self { sessions, store }
    }

    /// Run the candidate's test cases against their current solution file.
    pub async fn run(
        &self,
        candidate: &CandidateId,
        file_override: Option<&str>,
    ) -> Result<RunTestsOutput, HarnessError> {
        let record = self
            .store
            .find_candidate(candidate)
            .await?
            .ok_or_else(|| NotFoundError::Candidate(candidate.clone()))?;
        let session = self
            .sessions
            .bound(&record)
            .ok_or(HarnessError::SandboxNotInitialized)?;

        let cases = parse_test_cases(&record.test_cases)?;
        if cases.is_empty() {
            debug!(candidate = %candidate, "no test cases configured");
            return Ok(RunTestsOutput::default());
        }

        let file_name = resolve_target_file(file_override, &record.language);
        let _lock = self.sessions.lock(&session).await;
        let code = self.sessions.client().read_file(&session, &file_name).await?;

        let request = BatchRequest {
            language: record.language.clone(),
            file_name: file_name.clone(),
            code,
            cases,
        };
        let execution = self
            .sessions
            .client()
            .execute_batch(&session, &request)
            .await?;
        check_results_cover_cases(&request.cases, &execution.test_results)?;

        let hidden = hidden_flags(&request.cases, &execution.test_results);
        let now = Utc::now();
        let outcomes: Vec<TestOutcome> = execution
            .test_results
            .iter()
            .zip(&hidden)
            .map(|(exec, &hidden)| TestOutcome {
                id: uuid::Uuid::new_v4().to_string(),
                candidate_id: candidate.clone(),
                sandbox_id: session.id.clone(),
                test_name: exec.name.clone(),
                passed: exec.passed,
                stdout: exec.output.clone(),
                stderr: exec.stderr.clone(),
                error: exec.error.clone(),
                duration_ms: exec.duration_ms,
                hidden,
                created_at: now,
            })
            .collect();
        self.store
            .create_test_outcomes(outcomes)
            .await
            .map_err(HarnessError::Persistence)?;

        let results: Vec<CaseReport> = execution
            .test_results
            .iter()
            .zip(&hidden)
            .map(|(exec, &hidden)| CaseReport::from_execution(exec, hidden))
            .collect();
        let passed = results.iter().filter(|r| r.passed).count();
        let output = RunTestsOutput {
            passed,
            failed: results.len() - passed,
            total: results.len(),
            results,
        };
        info!(
            candidate = %candidate,
            file = %file_name,
            "tests: {}/{} passed",
            output.passed,
            output.total
        );
        Ok(output)
    }
}

/// The provider must answer every case it was sent, once, by name. Order
/// may differ.
fn check_results_cover_cases(
    cases: &[TestCase],
    results: &[CaseExecution],
) -> Result<(), SandboxError> {
    if results.len() != cases.len() {
        return Err(SandboxError::Provider(format!(
            "batch returned {} result(s) for {} case(s)",
            results.len(),
            cases.len()
        )));
    }
    let mut sent: Vec<&str> = cases.iter().map(|c| c.name.as_str()).collect();
    let mut got: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    sent.sort_unstable();
    got.sort_unstable();
    if sent != got {
        return Err(SandboxError::Provider(
            "batch results do not match the cases sent".into(),
        ));
    }
    Ok(())
}

/// Whether each result belongs to a hidden case. A result counts as hidden
/// if the case at the same position is hidden or any hidden case shares its
/// name, so a provider that reorders or renames cannot leak them.
fn hidden_flags(cases: &[TestCase], results: &[CaseExecution]) -> Vec<bool> {
    let hidden_names: HashSet<&str> = cases
        .iter()
        .filter(|c| c.hidden)
        .map(|c| c.name.as_str())
        .collect();
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            cases.get(i).is_some_and(|c| c.hidden) || hidden_names.contains(r.name.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SandboxId;
    use crate::sandbox::{
        BatchExecution, CommandOutput, CommandSpec, SandboxClient, SandboxResult, SandboxSession,
    };
    use crate::store::{CandidateRecord, InMemoryStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Passes a case when its expected output equals the code's length as a
    /// string, so tests can steer outcomes without a real interpreter.
    #[derive(Default)]
    struct EchoSandbox {
        batches: Mutex<Vec<BatchRequest>>,
        /// Report only this many results, as a faulty provider might.
        report_at_most: Option<usize>,
        rename_first: bool,
    }

    #[async_trait]
    impl SandboxClient for EchoSandbox {
        async fn provision(&self, candidate: &CandidateId) -> SandboxResult<SandboxSession> {
            Ok(session_for(candidate))
        }

        async fn run_command(
            &self,
            _session: &SandboxSession,
            _command: &CommandSpec,
        ) -> SandboxResult<CommandOutput> {
            Ok(CommandOutput::default())
        }

        async fn read_file(&self, _session: &SandboxSession, path: &str) -> SandboxResult<String> {
            if path.ends_with(".missing") {
                return Err(SandboxError::FileNotFound(path.into()));
            }
            Ok("abc".into())
        }

        async fn execute_batch(
            &self,
            _session: &SandboxSession,
            request: &BatchRequest,
        ) -> SandboxResult<BatchExecution> {
            self.batches.lock().unwrap().push(request.clone());
            let results = request
                .cases
                .iter()
                .take(self.report_at_most.unwrap_or(usize::MAX))
                .enumerate()
                .map(|(i, case)| {
                    let actual = request.code.len().to_string();
                    let name = if self.rename_first && i == 0 {
                        format!("{}_renamed", case.name)
                    } else {
                        case.name.clone()
                    };
                    CaseExecution {
                        name,
                        passed: actual == case.expected_output,
                        output: Some(actual),
                        stderr: None,
                        error: None,
                        duration_ms: Some(1),
                    }
                })
                .collect();
            Ok(BatchExecution::from_results(results))
        }
    }

    fn session_for(candidate: &CandidateId) -> SandboxSession {
        SandboxSession {
            id: SandboxId::new(format!("sb-{candidate}")),
            candidate_id: candidate.clone(),
            workspace_root: "/workspace".into(),
        }
    }

    struct Fixture {
        sandbox: Arc<EchoSandbox>,
        store: Arc<InMemoryStore>,
        harness: TestHarness,
    }

    fn fixture(test_cases: serde_json::Value, bind: bool) -> Fixture {
        fixture_with(EchoSandbox::default(), test_cases, bind)
    }

    fn fixture_with(sandbox: EchoSandbox, test_cases: serde_json::Value, bind: bool) -> Fixture {
        let sandbox = Arc::new(sandbox);
        let store = Arc::new(InMemoryStore::new());
        let mut record = CandidateRecord::new("c1", "python").with_test_cases(test_cases);
        if bind {
            record = record.with_sandbox(session_for(&CandidateId::new("c1")));
        }
        store.insert_candidate(record);
        let sessions = Arc::new(SandboxSessions::new(sandbox.clone(), store.clone()));
        let harness = TestHarness::new(sessions, store.clone());
        Fixture {
            sandbox,
            store,
            harness,
        }
    }

    #[tokio::test]
    async fn all_passing_cases_persist_one_outcome_each() {
        let f = fixture(
            json!([
                {"name": "a", "input": "", "expectedOutput": "3"},
                {"name": "b", "input": "", "expectedOutput": "3"},
                {"name": "c", "input": "", "expectedOutput": "3"}
            ]),
            true,
        );
        let out = f.harness.run(&CandidateId::new("c1"), None).await.unwrap();
        assert_eq!((out.passed, out.failed, out.total), (3, 0, 3));

        let outcomes = f.store.list_test_outcomes(&CandidateId::new("c1")).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(f.store.stats().outcome_writes(), 1);
        assert_eq!(f.sandbox.batches.lock().unwrap().len(), 1);
        assert_eq!(
            f.sandbox.batches.lock().unwrap()[0].file_name,
            "solution.py"
        );
    }

    #[tokio::test]
    async fn hidden_cases_reveal_only_name_pass_and_duration() {
        let f = fixture(
            json!([{"name": "secret", "input": "x", "expectedOutput": "999", "hidden": true}]),
            true,
        );
        let out = f.harness.run(&CandidateId::new("c1"), None).await.unwrap();
        let report = &out.results[0];
        assert_eq!(report.name, "secret");
        assert!(!report.passed);
        assert_eq!(report.output, None);
        assert_eq!(report.error, None);
        assert_eq!(report.duration, Some(1));

        let rendered = serde_json::to_string(&out).unwrap();
        assert!(!rendered.contains("999"));

        let outcomes = f.store.list_test_outcomes(&CandidateId::new("c1")).await.unwrap();
        assert!(outcomes[0].hidden);
    }

    #[tokio::test]
    async fn zero_cases_is_all_zero_without_batch() {
        let f = fixture(json!([]), true);
        let out = f.harness.run(&CandidateId::new("c1"), None).await.unwrap();
        assert_eq!(out, RunTestsOutput::default());
        assert!(f.sandbox.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn string_encoded_cases_are_parsed() {
        let cases = json!([{"name": "a", "input": "", "expectedOutput": "3"}]).to_string();
        let f = fixture(serde_json::Value::String(cases), true);
        let out = f.harness.run(&CandidateId::new("c1"), None).await.unwrap();
        assert_eq!(out.passed, 1);
    }

    #[tokio::test]
    async fn unparseable_cases_fail_without_partial_result() {
        let f = fixture(json!("{oops"), true);
        let err = f.harness.run(&CandidateId::new("c1"), None).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidTestCases(_)));
        assert_eq!(f.store.stats().outcome_writes(), 0);
    }

    #[tokio::test]
    async fn unbound_candidate_is_sandbox_not_initialized() {
        let f = fixture(json!([]), false);
        let err = f.harness.run(&CandidateId::new("c1"), None).await.unwrap_err();
        assert!(matches!(err, HarnessError::SandboxNotInitialized));
        assert_eq!(err.to_string(), "sandbox not initialized");
    }

    #[tokio::test]
    async fn unknown_candidate_is_not_found() {
        let f = fixture(json!([]), true);
        let err = f.harness.run(&CandidateId::new("ghost"), None).await.unwrap_err();
        assert!(matches!(err, HarnessError::NotFound(_)));
    }

    #[tokio::test]
    async fn persistence_failure_surfaces() {
        let f = fixture(json!([{"name": "a", "input": "", "expectedOutput": "3"}]), true);
        f.store.set_fail_writes(true);
        let err = f.harness.run(&CandidateId::new("c1"), None).await.unwrap_err();
        assert!(matches!(err, HarnessError::Persistence(_)));
    }

    #[tokio::test]
    async fn missing_file_is_sandbox_error() {
        let f = fixture(json!([{"name": "a", "input": "", "expectedOutput": "3"}]), true);
        let err = f
            .harness
            .run(&CandidateId::new("c1"), Some("nope.missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Sandbox(SandboxError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn zero_cases_never_reads_the_file() {
        let f = fixture(json!([]), true);
        let out = f
            .harness
            .run(&CandidateId::new("c1"), Some("nope.missing"))
            .await
            .unwrap();
        assert_eq!(out, RunTestsOutput::default());
    }

    #[tokio::test]
    async fn short_result_list_fails_without_persisting() {
        let f = fixture_with(
            EchoSandbox {
                report_at_most: Some(1),
                ..Default::default()
            },
            json!([
                {"name": "a", "input": "", "expectedOutput": "3"},
                {"name": "b", "input": "", "expectedOutput": "3"},
                {"name": "c", "input": "", "expectedOutput": "3"}
            ]),
            true,
        );
        let err = f.harness.run(&CandidateId::new("c1"), None).await.unwrap_err();
        assert!(matches!(err, HarnessError::Sandbox(SandboxError::Provider(_))));
        assert!(err.to_string().contains("1 result(s) for 3 case(s)"), "{err}");
        assert_eq!(f.store.stats().outcome_writes(), 0);
    }

    #[tokio::test]
    async fn renamed_result_fails_without_persisting() {
        let f = fixture_with(
            EchoSandbox {
                rename_first: true,
                ..Default::default()
            },
            json!([
                {"name": "a", "input": "", "expectedOutput": "3"},
                {"name": "b", "input": "", "expectedOutput": "3"}
            ]),
            true,
        );
        let err = f.harness.run(&CandidateId::new("c1"), None).await.unwrap_err();
        assert!(matches!(err, HarnessError::Sandbox(SandboxError::Provider(_))));
        assert_eq!(f.store.stats().outcome_writes(), 0);
    }
}
