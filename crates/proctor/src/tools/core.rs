//! Tool abstraction and dispatch.
//!
//! The [`Tool`] trait defines what every interviewer tool implements: a
//! static definition (name, description, JSON Schema) and an async
//! `execute`. Tools are collected into a [`ToolRegistry`] which validates
//! arguments against the schema, runs the tool under a timeout, and turns
//! every outcome (including panics) into a [`ToolResult`]. Nothing raised by
//! a tool crosses the dispatch boundary.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, trace, warn};

use super::names;
use super::progression::ProgressionOutput;
use super::search::SearchOutput;
use crate::ToolDef;
use crate::error::{NotFoundError, ValidationError};
use crate::harness::{HarnessError, RunTestsOutput};
use crate::ids::CandidateId;
use crate::sandbox::SandboxError;

/// Default timeout for one tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Boxed future returned by [`Tool::execute`]. Keeps the trait
/// dyn-compatible.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>>;

// ── Kinds and outputs ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Search,
    RunTests,
    SuggestProgression,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Search => names::SEARCH,
            ToolKind::RunTests => names::RUN_TESTS,
            ToolKind::SuggestProgression => names::SUGGEST_PROGRESSION,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful tool output, discriminated by tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolOutput {
    Search(SearchOutput),
    RunTests(RunTestsOutput),
    SuggestProgression(ProgressionOutput),
}

impl ToolOutput {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolOutput::Search(_) => ToolKind::Search,
            ToolOutput::RunTests(_) => ToolKind::RunTests,
            ToolOutput::SuggestProgression(_) => ToolKind::SuggestProgression,
        }
    }
}

/// Why a tool call failed. Lets the agent and UI tell "no sandbox yet"
/// apart from "tests failed" without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    UnknownTool,
    Validation,
    NotFound,
    SandboxNotInitialized,
    SandboxExecution,
    InvalidTestCases,
    Persistence,
    Timeout,
    Internal,
}

/// The envelope every tool call is answered with.
///
/// Serializes as the tool's own fields plus `success: true` and `tool`, or
/// as `{success: false, tool, reason, error}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(ToolOutput),
    Failure {
        tool: String,
        reason: FailureReason,
        error: String,
    },
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    pub fn output(&self) -> Option<&ToolOutput> {
        match self {
            ToolResult::Success(output) => Some(output),
            ToolResult::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            ToolResult::Success(_) => None,
            ToolResult::Failure { reason, .. } => Some(*reason),
        }
    }

    fn failure(tool: &str, reason: FailureReason, error: impl Into<String>) -> Self {
        ToolResult::Failure {
            tool: tool.to_string(),
            reason,
            error: error.into(),
        }
    }

    /// Render as the JSON value handed back to the agent.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"success": false, "error": format!("unserializable result: {e}")})
        })
    }
}

impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolResult::Success(output) => {
                let value = serde_json::to_value(output).map_err(S::Error::custom)?;
                let serde_json::Value::Object(fields) = value else {
                    return Err(S::Error::custom("tool output must be an object"));
                };
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("success", &true)?;
                for (k, v) in &fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            ToolResult::Failure {
                tool,
                reason,
                error,
            } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("tool", tool)?;
                map.serialize_entry("reason", reason)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Harness(#[from] HarnessError),
}

impl ToolError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ToolError::Validation(_) => FailureReason::Validation,
            ToolError::NotFound(_) => FailureReason::NotFound,
            ToolError::Sandbox(e) => sandbox_reason(e),
            ToolError::Harness(e) => match e {
                HarnessError::SandboxNotInitialized => FailureReason::SandboxNotInitialized,
                HarnessError::InvalidTestCases(_) => FailureReason::InvalidTestCases,
                HarnessError::NotFound(_) => FailureReason::NotFound,
                HarnessError::Validation(_) => FailureReason::Validation,
                HarnessError::Sandbox(e) => sandbox_reason(e),
                HarnessError::Persistence(_) => FailureReason::Persistence,
                HarnessError::Storage(_) => FailureReason::Internal,
            },
        }
    }
}

fn sandbox_reason(err: &SandboxError) -> FailureReason {
    match err {
        SandboxError::NotInitialized(_) => FailureReason::SandboxNotInitialized,
        SandboxError::Validation(_) => FailureReason::Validation,
        SandboxError::NotFound(_) => FailureReason::NotFound,
        SandboxError::Timeout(_) => FailureReason::Timeout,
        SandboxError::Storage(_) => FailureReason::Internal,
        SandboxError::CommandFailed { .. }
        | SandboxError::FileNotFound(_)
        | SandboxError::Io(_)
        | SandboxError::Provider(_) => FailureReason::SandboxExecution,
    }
}

// ── Tool trait ─────────────────────────────────────────────────────

/// The already-authorized caller a tool acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub candidate_id: CandidateId,
}

impl ToolContext {
    pub fn new(candidate_id: impl Into<CandidateId>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
        }
    }
}

/// A capability the interviewer agent can invoke.
///
/// `execute` receives arguments that already passed the tool's JSON Schema;
/// it still deserializes them into its own typed struct.
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// The definition sent to the agent.
    fn definition(&self) -> ToolDef;

    fn execute<'a>(&'a self, ctx: &'a ToolContext, arguments: serde_json::Value) -> ToolFuture<'a>;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Deserialize schema-checked arguments into the tool's argument type.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments)
        .map_err(|e| ValidationError::Arguments(format!("invalid arguments: {e}")).into())
}

// ── ToolRegistry ───────────────────────────────────────────────────

struct Registered {
    tool: Box<dyn Tool>,
    def: ToolDef,
    /// `None` if the tool's schema itself does not compile; such tools run
    /// without argument validation.
    validator: Option<jsonschema::Validator>,
}

/// The fixed set of tools an agent session can call.
///
/// ```ignore
/// let registry = ToolRegistry::new()
///     .with(SearchTool::new(sessions.clone(), GrepExecutor::default()))
///     .with(RunTestsTool::new(harness))
///     .with(SuggestProgressionTool)
///     .with_timeout(Some(Duration::from_secs(60)));
///
/// let result = registry.dispatch(&ToolContext::new("cand-1"), "search", r#"{"pattern":"add"}"#).await;
/// ```
pub struct ToolRegistry {
    tools: Vec<Registered>,
    index: HashMap<&'static str, usize>,
    timeout: Option<Duration>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            timeout: Some(DEFAULT_TOOL_TIMEOUT),
        }
    }

    /// Per-call timeout. `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool, replacing any tool of the same name. The definition
    /// and its schema validator are built once, here.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let def = tool.definition();
        let validator = match jsonschema::validator_for(&def.function.parameters) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Tool {} has an invalid parameter schema: {e}", tool.name());
                None
            }
        };
        let entry = Registered {
            tool: Box::new(tool),
            def,
            validator,
        };
        let name = entry.tool.name();
        match self.index.get(name) {
            Some(&i) => self.tools[i] = entry,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(entry);
            }
        }
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.def.clone()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch one tool call. Always returns a [`ToolResult`].
    pub async fn dispatch(&self, ctx: &ToolContext, name: &str, raw_arguments: &str) -> ToolResult {
        let Some(&i) = self.index.get(name) else {
            info!("[tool] unknown tool '{name}'");
            return ToolResult::failure(
                name,
                FailureReason::UnknownTool,
                format!("unknown tool '{name}'"),
            );
        };
        let entry = &self.tools[i];

        let arguments = match parse_raw_arguments(raw_arguments) {
            Ok(v) => v,
            Err(e) => return ToolResult::failure(name, FailureReason::Validation, e.to_string()),
        };
        if let Some(validator) = &entry.validator
            && let Err(e) = validate_tool_arguments(validator, name, &arguments)
        {
            debug!("[tool] {name} rejected: {e}");
            return ToolResult::failure(name, FailureReason::Validation, e.to_string());
        }

        log_tool_call(name, raw_arguments);
        let start = Instant::now();
        let call = AssertUnwindSafe(entry.tool.execute(ctx, arguments)).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(r) => r,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s",
                        start.elapsed().as_secs_f64()
                    );
                    return ToolResult::failure(
                        name,
                        FailureReason::Timeout,
                        format!("tool '{name}' timed out after {:.0} seconds", limit.as_secs_f64()),
                    );
                }
            },
            None => call.await,
        };

        let result = match outcome {
            Ok(Ok(output)) => ToolResult::Success(output),
            Ok(Err(e)) => ToolResult::failure(name, e.reason(), e.to_string()),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Tool {name} panicked: {message}");
                ToolResult::failure(
                    name,
                    FailureReason::Internal,
                    format!("tool '{name}' failed unexpectedly: {message}"),
                )
            }
        };

        debug!(
            "Tool {name} completed in {:.0}ms (success={})",
            start.elapsed().as_secs_f64() * 1000.0,
            result.is_success()
        );
        result
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Blank arguments mean `{}`; anything else must be a JSON value.
fn parse_raw_arguments(raw: &str) -> Result<serde_json::Value, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| ValidationError::Arguments(format!("invalid JSON arguments: {e}")))
}

/// Check `arguments` against a tool's compiled schema. Every violation is
/// listed so the agent can fix them all in one retry.
pub fn validate_tool_arguments(
    validator: &jsonschema::Validator,
    tool: &str,
    arguments: &serde_json::Value,
) -> Result<(), ValidationError> {
    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| {
            let path = e.instance_path().to_string();
            if path.is_empty() {
                format!("  - {e}")
            } else {
                format!("  - {path}: {e}")
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Arguments(format!(
            "argument validation failed for tool '{tool}':\n{}",
            errors.join("\n")
        )))
    }
}

/// Log a tool call at INFO with a truncated preview of its arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
