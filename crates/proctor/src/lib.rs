//! Sandboxed tool execution and reliable session recording for AI
//! interviewer agents.
//!
//! An interviewer agent inspects and runs a candidate's code through a small,
//! fixed set of tools. `proctor` is the core behind those tools: it
//! validates and dispatches tool calls, talks to the per-candidate sandbox,
//! turns declarative test cases into pass/fail results, and records every
//! interaction through a batched, retrying pipeline.
//!
//! # Getting started
//!
//! ```ignore
//! use proctor::prelude::*;
//!
//! let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
//! let sandbox = Arc::new(LocalSandbox::new("/tmp/proctor"));
//! let sessions = Arc::new(SandboxSessions::new(sandbox, store.clone()));
//!
//! let tools = ToolRegistry::interview(sessions, store.clone(), 50);
//! let ctx = ToolContext::new("cand-42");
//!
//! let result = tools.dispatch(&ctx, "run_tests", "{}").await;
//! println!("{}", result.to_value());
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tools`] | [`Tool`](tools::Tool) trait, [`ToolRegistry`](tools::ToolRegistry), `search` / `run_tests` / `suggest_progression` |
//! | [`sandbox`] | [`SandboxClient`](sandbox::SandboxClient) contract, per-candidate sessions, quoted command construction, a local provider |
//! | [`harness`] | [`TestHarness`](harness::TestHarness): read solution, run one batch, persist outcomes |
//! | [`transport`] | [`ResilientTransport`](transport::ResilientTransport): retry with backoff, timeouts, cancellation, connectivity |
//! | [`recorder`] | [`EventRecorder`](recorder::EventRecorder) and the client-side [`EventBuffer`](recorder::EventBuffer) |
//! | [`store`] | [`Store`](store::Store) persistence boundary and an in-memory implementation |
//! | [`verification`] | Per-instance pending-token state for external verification |
//! | [`config`], [`logging`] | Runtime configuration and tracing setup |
//!
//! # Design principles
//!
//! 1. **The agent never sees a raw error.** Every tool call answers with a
//!    [`ToolResult`](tools::ToolResult) envelope, whether the tool succeeded,
//!    rejected its arguments, timed out or panicked.
//!
//! 2. **Commands are argument vectors.** Agent-supplied strings reach the
//!    sandbox only as individually quoted arguments.
//!
//! 3. **Telemetry never blocks the interview.** Events are buffered and
//!    flushed in the background; failed flushes keep their events.

pub mod config;
pub mod error;
pub mod harness;
pub mod ids;
pub mod logging;
pub mod prelude;
pub mod recorder;
pub mod sandbox;
pub mod store;
pub mod tools;
pub mod transport;
pub mod verification;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{Error, Result};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Tool argument structs derive `JsonSchema`, so
/// the schema the agent sees and the struct the tool deserializes into
/// cannot drift apart.
///
/// # Example
///
/// ```
/// use proctor::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct SearchArgs {
///     pattern: String,
///     #[serde(default)]
///     path: Option<String>,
/// }
///
/// let schema = json_schema_for::<SearchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"pattern".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition handed to the agent (function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_def_serializes_in_function_calling_shape() {
        let def = ToolDef::new("search", "Search code.", serde_json::json!({"type": "object"}));
        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "search");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }
}
