//! Regex search over the candidate's workspace.
//!
//! [`GrepExecutor`] turns [`SearchArgs`] into a quoted `grep` argument
//! vector, runs it in the sandbox with stdout bounded on the sandbox side,
//! and parses `path:line:content` output. grep exits 1 when nothing
//! matched; that is a successful, empty search, not an error.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::core::{Tool, ToolContext, ToolFuture, ToolKind, ToolOutput, parse_tool_args};
use super::names;
use super::spec::ToolSpec;
use crate::ToolDef;
use crate::sandbox::{
    CommandOutput, CommandSpec, SandboxError, SandboxResult, SandboxSession, SandboxSessions,
    normalize_workspace_path,
};

/// Default cap on grep output lines.
pub const DEFAULT_MAX_LINES: usize = 50;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Regular expression (grep basic syntax).
    pub pattern: String,
    /// Directory or file to search, relative to the workspace root.
    /// Defaults to the whole workspace.
    #[serde(default)]
    pub path: Option<String>,
    /// Only search files whose name matches this glob, e.g. `*.py`.
    #[serde(default)]
    pub include: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Path relative to the workspace root.
    pub file: String,
    pub line: u32,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutput {
    pub matches: Vec<SearchMatch>,
    pub match_count: usize,
}

impl SearchOutput {
    pub fn from_matches(matches: Vec<SearchMatch>) -> Self {
        Self {
            match_count: matches.len(),
            matches,
        }
    }
}

// ── GrepExecutor ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GrepExecutor {
    max_lines: usize,
}

impl Default for GrepExecutor {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl GrepExecutor {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
        }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Build the grep command for `args` against `root`.
    pub fn command(&self, root: &str, args: &SearchArgs) -> SandboxResult<CommandSpec> {
        let target = normalize_workspace_path(root, args.path.as_deref())?;
        let mut spec = CommandSpec::new("grep").args(["-rn", "-H", "-Z", "--color=never"]);
        if let Some(glob) = args.include.as_deref().map(str::trim)
            && !glob.is_empty()
        {
            spec = spec.arg(format!("--include={glob}"));
        }
        Ok(spec
            .arg("-e")
            .arg(args.pattern.as_str())
            .arg("--")
            .arg(target)
            .head_limit(self.max_lines))
    }

    /// Interpret grep's exit status and output.
    pub fn interpret(
        &self,
        command: &CommandSpec,
        root: &str,
        output: CommandOutput,
    ) -> SandboxResult<SearchOutput> {
        let clean = output.stderr.trim().is_empty();
        match output.exit_code {
            0 if clean => Ok(SearchOutput::from_matches(parse_grep_output(
                &output.stdout,
                root,
            ))),
            1 if clean => Ok(SearchOutput::default()),
            code => Err(SandboxError::CommandFailed {
                command: command.to_string(),
                exit_code: code,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    pub async fn search(
        &self,
        sessions: &SandboxSessions,
        session: &SandboxSession,
        args: &SearchArgs,
    ) -> SandboxResult<SearchOutput> {
        let command = self.command(&session.workspace_root, args)?;
        let output = {
            let _lock = sessions.lock(session).await;
            sessions.client().run_command(session, &command).await?
        };
        let result = self.interpret(&command, &session.workspace_root, output)?;
        debug!(
            sandbox = %session.id,
            "search '{}' matched {} line(s)",
            args.pattern,
            result.match_count
        );
        Ok(result)
    }
}

/// Parse grep's `path\0line:content` lines (`-Z`), falling back to plain
/// `path:line:content` for greps without `-Z`. The path is made relative to
/// `root`; lines without a numeric line field are skipped.
pub fn parse_grep_output(stdout: &str, root: &str) -> Vec<SearchMatch> {
    let prefix = format!("{}/", root.trim_end_matches('/'));
    stdout
        .lines()
        .filter_map(|line| {
            let (file, rest) = match line.split_once('\0') {
                Some(split) => split,
                None => line.split_once(':')?,
            };
            let (line_no, content) = rest.split_once(':').unwrap_or((rest, ""));
            let line_no = line_no.parse::<u32>().ok()?;
            Some(SearchMatch {
                file: file.strip_prefix(&prefix).unwrap_or(file).to_string(),
                line: line_no,
                content: content.to_string(),
            })
        })
        .collect()
}

// ── SearchTool ─────────────────────────────────────────────────────

pub struct SearchTool {
    sessions: Arc<SandboxSessions>,
    grep: GrepExecutor,
}

impl SearchTool {
    pub fn new(sessions: Arc<SandboxSessions>, grep: GrepExecutor) -> Self {
        Self { sessions, grep }
    }
}

impl Tool for SearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(
            names::SEARCH,
            "Search the candidate's workspace for a regular expression",
        )
        .when_to_use("To find where a function, variable or pattern appears in the candidate's code")
        .when_not_to_use("To check whether the code is correct; use run_tests")
        .parameters_for::<SearchArgs>()
        .example(
            r#"search(pattern="def add", include="*.py")"#,
            r#"{"matches":[{"file":"solution.py","line":1,"content":"def add(a, b):"}],"matchCount":1}"#,
        )
        .output_format(format!(
            "{{matches: [{{file, line, content}}], matchCount}}; at most {} lines",
            self.grep.max_lines()
        ))
        .disambiguate(
            "Deciding whether the solution passes",
            names::RUN_TESTS,
            "search only reads files and never executes them",
        )
        .to_tool_def()
    }

    fn execute<'a>(&'a self, ctx: &'a ToolContext, arguments: serde_json::Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: SearchArgs = parse_tool_args(arguments)?;
            let session = self.sessions.acquire(&ctx.candidate_id).await?;
            let output = self.grep.search(&self.sessions, &session, &args).await?;
            Ok(ToolOutput::Search(output))
        })
    }
}
