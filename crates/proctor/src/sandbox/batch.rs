//! Types for the batched test-execution primitive.
//!
//! The harness hands the sandbox the candidate's code plus every declarative
//! case in one [`BatchRequest`]; the sandbox answers with one
//! [`BatchExecution`]. Wire names are camelCase to match the provider API.

use serde::{Deserialize, Deserializer, Serialize};

/// One declarative test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    #[serde(deserialize_with = "string_or_json")]
    pub input: String,
    #[serde(alias = "expected_output", alias = "expected", deserialize_with = "string_or_json")]
    pub expected_output: String,
    /// Hidden cases run normally but their content is never shown to the agent.
    #[serde(default)]
    pub hidden: bool,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expected_output: expected_output.into(),
            hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Accept either a JSON string or any other JSON value (kept as its compact
/// JSON text), so `"input": [2, 3]` and `"input": "[2,3]"` both work.
fn string_or_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Everything the sandbox needs to run one batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub language: String,
    pub file_name: String,
    pub code: String,
    pub cases: Vec<TestCase>,
}

/// Per-case result reported by the sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseExecution {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration in milliseconds.
    #[serde(default, rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Aggregate result of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchExecution {
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_tests: usize,
    pub test_results: Vec<CaseExecution>,
}

impl BatchExecution {
    /// Build an aggregate whose counters are derived from `results`.
    pub fn from_results(test_results: Vec<CaseExecution>) -> Self {
        let passed_tests = test_results.iter().filter(|r| r.passed).count();
        Self {
            passed_tests,
            failed_tests: test_results.len() - passed_tests,
            total_tests: test_results.len(),
            test_results,
        }
    }
}
