//! The interviewer agent's tools.
//!
//! Every agent capability is a [`Tool`] implementor. Tools are collected into
//! a [`ToolRegistry`] which handles schema validation, timeouts and the
//! success/failure envelope. The agent never sees a raw error.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolRegistry`], [`ToolResult`] and
//!   [`ToolOutput`].
//! - [`search`]: `search`, backed by [`GrepExecutor`].
//! - [`run_tests`]: `run_tests`, backed by [`TestHarness`].
//! - [`progression`]: `suggest_progression`.
//! - [`spec`]: [`ToolSpec`](spec::ToolSpec) builder for structured tool
//!   descriptions with `when_to_use` / `when_not_to_use` guidance.
//! - [`names`]: canonical tool names.

pub mod core;
pub mod names;
pub mod progression;
pub mod run_tests;
pub mod search;
pub mod spec;

pub use core::{
    DEFAULT_TOOL_TIMEOUT, FailureReason, Tool, ToolContext, ToolError, ToolFuture, ToolKind,
    ToolOutput, ToolRegistry, ToolResult, log_tool_call, parse_tool_args, validate_tool_arguments,
};
pub use progression::{ProgressionArgs, ProgressionOutput, SuggestProgressionTool};
pub use run_tests::{RunTestsArgs, RunTestsTool};
pub use search::{
    GrepExecutor, SearchArgs, SearchMatch, SearchOutput, SearchTool, parse_grep_output,
};

use std::sync::Arc;

use crate::harness::TestHarness;
use crate::sandbox::SandboxSessions;
use crate::store::Store;

impl ToolRegistry {
    /// The standard interviewer registry: `search`, `run_tests` and
    /// `suggest_progression`, sharing one session table.
    pub fn interview(
        sessions: Arc<SandboxSessions>,
        store: Arc<dyn Store>,
        search_max_lines: usize,
    ) -> Self {
        let harness = Arc::new(TestHarness::new(sessions.clone(), store));
        ToolRegistry::new()
            .with(SearchTool::new(sessions, GrepExecutor::new(search_max_lines)))
            .with(RunTestsTool::new(harness))
            .with(SuggestProgressionTool)
    }
}
