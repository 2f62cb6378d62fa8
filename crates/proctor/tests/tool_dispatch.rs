//! End-to-end tool dispatch against a scripted sandbox and the in-memory
//! store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proctor::ids::{CandidateId, SandboxId};
use proctor::sandbox::{
    BatchExecution, BatchRequest, CaseExecution, CommandOutput, CommandSpec, SandboxClient,
    SandboxError, SandboxResult, SandboxSession, SandboxSessions,
};
use proctor::store::{CandidateRecord, InMemoryStore, Store};
use proctor::tools::{FailureReason, ToolContext, ToolRegistry};
use serde_json::json;

const ADD_JS: &str = "function add(a,b){return a+b;}";

/// Knows how to "run" one program: a JavaScript `add` that sums the JSON
/// array on stdin. Commands answer with a canned output.
struct ScriptedSandbox {
    files: Mutex<Vec<(String, String)>>,
    command_output: CommandOutput,
    commands: Mutex<Vec<CommandSpec>>,
}

impl ScriptedSandbox {
    fn new(command_output: CommandOutput) -> Self {
        Self {
            files: Mutex::new(vec![("solution.js".into(), ADD_JS.into())]),
            command_output,
            commands: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SandboxClient for ScriptedSandbox {
    async fn provision(&self, candidate: &CandidateId) -> SandboxResult<SandboxSession> {
        Ok(session(candidate))
    }

    async fn run_command(
        &self,
        _session: &SandboxSession,
        command: &CommandSpec,
    ) -> SandboxResult<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(self.command_output.clone())
    }

    async fn read_file(&self, _session: &SandboxSession, path: &str) -> SandboxResult<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, code)| code.clone())
            .ok_or_else(|| SandboxError::FileNotFound(path.to_string()))
    }

    async fn execute_batch(
        &self,
        _session: &SandboxSession,
        request: &BatchRequest,
    ) -> SandboxResult<BatchExecution> {
        let results = request
            .cases
            .iter()
            .map(|case| {
                let sum = if request.code.contains("return a+b") {
                    serde_json::from_str::<Vec<i64>>(&case.input)
                        .map(|xs| xs.iter().sum::<i64>().to_string())
                        .ok()
                } else {
                    None
                };
                CaseExecution {
                    name: case.name.clone(),
                    passed: sum.as_deref() == Some(case.expected_output.as_str()),
                    output: sum,
                    duration_ms: Some(3),
                    ..Default::default()
                }
            })
            .collect();
        Ok(BatchExecution::from_results(results))
    }
}

fn session(candidate: &CandidateId) -> SandboxSession {
    SandboxSession {
        id: SandboxId::new(format!("sb-{candidate}")),
        candidate_id: candidate.clone(),
        workspace_root: "/workspace".into(),
    }
}

struct Setup {
    store: Arc<InMemoryStore>,
    sandbox: Arc<ScriptedSandbox>,
    registry: ToolRegistry,
}

fn setup(test_cases: serde_json::Value, bound: bool, grep: CommandOutput) -> Setup {
    let store = Arc::new(InMemoryStore::new());
    let candidate = CandidateId::new("cand-1");
    let mut record = CandidateRecord::new(candidate.clone(), "javascript").with_test_cases(test_cases);
    if bound {
        record = record.with_sandbox(session(&candidate));
    }
    store.insert_candidate(record);

    let sandbox = Arc::new(ScriptedSandbox::new(grep));
    let sessions = Arc::new(SandboxSessions::new(sandbox.clone(), store.clone()));
    let registry = ToolRegistry::interview(sessions, store.clone(), 50);
    Setup {
        store,
        sandbox,
        registry,
    }
}

fn ctx() -> ToolContext {
    ToolContext::new("cand-1")
}

#[tokio::test]
async fn add_scenario_passes_one_of_one() {
    let s = setup(
        json!([{"name": "test_add", "input": "[2,3]", "expectedOutput": "5"}]),
        true,
        CommandOutput::default(),
    );

    let result = s.registry.dispatch(&ctx(), "run_tests", "{}").await;
    let value = result.to_value();
    assert_eq!(value["success"], true);
    assert_eq!(value["tool"], "run_tests");
    assert_eq!(value["passed"], 1);
    assert_eq!(value["failed"], 0);
    assert_eq!(value["total"], 1);
    assert_eq!(value["results"][0]["name"], "test_add");
    assert_eq!(value["results"][0]["passed"], true);
}

#[tokio::test]
async fn n_passing_cases_persist_n_outcomes() {
    let cases: Vec<_> = (1..=4)
        .map(|i| json!({"name": format!("case_{i}"), "input": [i, i], "expectedOutput": (2 * i).to_string()}))
        .collect();
    let s = setup(json!(cases), true, CommandOutput::default());

    let value = s.registry.dispatch(&ctx(), "run_tests", "{}").await.to_value();
    assert_eq!((value["passed"].as_u64(), value["failed"].as_u64(), value["total"].as_u64()), (Some(4), Some(0), Some(4)));

    let outcomes = s
        .store
        .list_test_outcomes(&CandidateId::new("cand-1"))
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.passed));
    assert_eq!(s.store.stats().outcome_writes(), 1);
}

#[tokio::test]
async fn run_tests_without_sandbox_reports_not_initialized() {
    let s = setup(json!([]), false, CommandOutput::default());
    let result = s.registry.dispatch(&ctx(), "run_tests", "{}").await;
    assert_eq!(result.failure_reason(), Some(FailureReason::SandboxNotInitialized));
    assert_eq!(result.to_value()["error"], "sandbox not initialized");
}

#[tokio::test]
async fn missing_solution_file_is_a_sandbox_failure() {
    let s = setup(
        json!([{"name": "test_add", "input": "[2,3]", "expectedOutput": "5"}]),
        true,
        CommandOutput::default(),
    );
    let result = s
        .registry
        .dispatch(&ctx(), "run_tests", r#"{"file": "other.js"}"#)
        .await;
    assert_eq!(result.failure_reason(), Some(FailureReason::SandboxExecution));
}

#[tokio::test]
async fn zero_match_search_is_success() {
    let s = setup(
        json!([]),
        false,
        CommandOutput {
            exit_code: 1,
            ..Default::default()
        },
    );
    let result = s
        .registry
        .dispatch(&ctx(), "search", r#"{"pattern": "nonexistent_symbol"}"#)
        .await;
    assert_eq!(
        result.to_value(),
        json!({"success": true, "tool": "search", "matches": [], "matchCount": 0})
    );

    // Search provisions on first use and binds the sandbox.
    let record = s
        .store
        .find_candidate(&CandidateId::new("cand-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.sandbox.unwrap().id.as_str(), "sb-cand-1");
}

#[tokio::test]
async fn search_pattern_reaches_sandbox_as_one_argument() {
    let s = setup(json!([]), true, CommandOutput::default());
    let hostile = "x\"; rm -rf / #";
    let args = json!({"pattern": hostile, "include": "*.js"}).to_string();
    let result = s.registry.dispatch(&ctx(), "search", &args).await;
    assert!(result.is_success());

    let commands = s.sandbox.commands.lock().unwrap();
    let line = commands[0].to_shell_line().unwrap();
    assert!(line.contains(&shlex::try_quote(hostile).unwrap().to_string()));
    assert!(commands[0].arguments().iter().any(|a| a == hostile));
}

#[tokio::test]
async fn schema_failures_return_success_false() {
    let s = setup(json!([]), true, CommandOutput::default());
    let cases = [
        ("search", "{}"),
        ("search", r#"{"pattern": ["a"]}"#),
        ("run_tests", r#"{"file": 7}"#),
        ("suggest_progression", r#"{"reason": "done"}"#),
        ("suggest_progression", "not json"),
    ];
    for (tool, args) in cases {
        let result = s.registry.dispatch(&ctx(), tool, args).await;
        let value = result.to_value();
        assert_eq!(value["success"], false, "{tool} {args}");
        assert_eq!(value["reason"], "validation", "{tool} {args}");
    }
    assert!(s.sandbox.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn progression_is_a_pure_acknowledgement() {
    let s = setup(json!([]), false, CommandOutput::default());
    let result = s
        .registry
        .dispatch(
            &ctx(),
            "suggest_progression",
            r#"{"reason": "solved", "performanceSummary": "clean and fast"}"#,
        )
        .await;
    let value = result.to_value();
    assert_eq!(value["success"], true);
    assert_eq!(value["acknowledged"], true);
    assert_eq!(value["performanceSummary"], "clean and fast");

    let record = s
        .store
        .find_candidate(&CandidateId::new("cand-1"))
        .await
        .unwrap()
        .unwrap();
    assert!(record.sandbox.is_none());
}

#[test]
fn interview_registry_exposes_three_tools() {
    let s = setup(json!([]), false, CommandOutput::default());
    let defs = s.registry.definitions();
    let names: Vec<&str> = defs.iter().map(|d| d.function.name.as_str()).collect();
    assert_eq!(names, ["search", "run_tests", "suggest_progression"]);
    for def in &defs {
        assert_eq!(def.function.parameters["type"], "object");
        assert!(!def.function.description.is_empty());
    }
}
