//! Convenience re-exports for common `proctor` types.
//!
//! ```ignore
//! use proctor::prelude::*;
//! ```
//!
//! Pulls in the tool registry, the sandbox and store contracts with their
//! in-process implementations, the recorder, and the transport. Wire-level
//! types (ingest payloads, batch requests) stay in their modules.

pub use std::sync::Arc;

// ── Core types ──────────────────────────────────────────────────────
pub use crate::ids::{CandidateId, RecordingId, SandboxId};
pub use crate::{Error, Result, ToolDef, json_schema_for};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::spec::ToolSpec;
pub use crate::tools::{
    FailureReason, Tool, ToolContext, ToolError, ToolFuture, ToolKind, ToolOutput, ToolRegistry,
    ToolResult, parse_tool_args,
};

// ── Sandbox and harness ─────────────────────────────────────────────
pub use crate::harness::{RunTestsOutput, TestHarness};
pub use crate::sandbox::{
    CommandSpec, LocalSandbox, SandboxClient, SandboxError, SandboxSession, SandboxSessions,
    TestCase,
};

// ── Persistence ─────────────────────────────────────────────────────
pub use crate::store::{CandidateRecord, InMemoryStore, Store};

// ── Recording and transport ─────────────────────────────────────────
pub use crate::recorder::{
    BufferConfig, BufferError, EventBuffer, EventRecorder, EventSink, RecorderSink, SessionEvent,
};
pub use crate::transport::{
    Connectivity, ResilientTransport, TransportConfig, TransportError, best_effort,
};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::config::ProctorConfig;
