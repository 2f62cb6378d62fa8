//! Operator CLI for proctor.
//!
//! Runs the interviewer tools against a local directory and replays event
//! ingestion requests, both backed by an in-memory store.
//!
//! # Examples
//!
//! ```sh
//! # Print the tool definitions the agent sees
//! proctor tools
//!
//! # Search a local workspace
//! proctor call --workdir ./candidate --language python search '{"pattern": "def "}'
//!
//! # Run tests against solution.py
//! proctor call --workdir ./candidate --language python --cases cases.json run_tests
//!
//! # Validate and record an ingestion payload
//! proctor ingest --file events.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use proctor::config::ProctorConfig;
use proctor::ids::CandidateId;
use proctor::recorder::{EventRecorder, IngestRequest};
use proctor::sandbox::{LocalSandbox, SandboxSessions};
use proctor::store::{CandidateRecord, InMemoryStore, Store};
use proctor::tools::{ToolContext, ToolRegistry};
use tracing::debug;

/// Sandboxed tool execution and session recording for interviewer agents.
#[derive(Parser)]
#[command(name = "proctor")]
struct Cli {
    /// JSON config file. Every field is optional.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tool definitions as JSON.
    Tools,

    /// Dispatch one tool call against a local workspace.
    Call {
        /// Candidate workspace directory.
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Solution language, e.g. `python` or `javascript`.
        #[arg(long)]
        language: String,

        /// JSON file with the problem's test cases.
        #[arg(long)]
        cases: Option<PathBuf>,

        #[arg(long, default_value = "cli")]
        candidate: String,

        /// Tool name.
        tool: String,

        /// Tool arguments as a JSON object.
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Validate and record an event ingestion request.
    Ingest {
        /// JSON file with `{"events": [...]}`.
        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "cli")]
        candidate: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match ProctorConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ProctorConfig::default(),
    };
    let config = if cli.json_logs {
        config.with_json_logs(true)
    } else {
        config
    };
    proctor::logging::init(&config.logging);

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &ProctorConfig) -> proctor::Result<ExitCode> {
    match command {
        Command::Tools => {
            let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
            let registry = build_registry(config, store);
            println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call {
            workdir,
            language,
            cases,
            candidate,
            tool,
            arguments,
        } => {
            let workdir = std::fs::canonicalize(&workdir).unwrap_or(workdir);
            let test_cases = match cases {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => serde_json::Value::Null,
            };

            let candidate = CandidateId::new(candidate);
            let store = Arc::new(InMemoryStore::new());
            store.insert_candidate(
                CandidateRecord::new(candidate.clone(), language)
                    .with_test_cases(test_cases)
                    .with_sandbox(LocalSandbox::session_at(&candidate, &workdir)),
            );
            debug!(workdir = %workdir.display(), "dispatching {tool}");

            let registry = build_registry(config, store);
            let result = registry
                .dispatch(&ToolContext::new(candidate), &tool, &arguments)
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Ingest { file, candidate } => {
            let request: IngestRequest = serde_json::from_str(&std::fs::read_to_string(file)?)?;
            let candidate = CandidateId::new(candidate);
            let store = Arc::new(InMemoryStore::new());
            store.insert_candidate(CandidateRecord::new(candidate.clone(), "text"));

            let recorder = EventRecorder::new(store);
            match recorder.ingest(&candidate, request).await {
                Ok(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    let body = serde_json::json!({
                        "success": false,
                        "status": e.status_code(),
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// The candidate's sandbox is bound to `--workdir` up front, so the local
/// provider's base directory is only used if something provisions anew.
fn build_registry(config: &ProctorConfig, store: Arc<dyn Store>) -> ToolRegistry {
    let sandbox = Arc::new(
        LocalSandbox::new(config.local_base_dir()).command_timeout(config.command_timeout()),
    );
    let sessions = Arc::new(SandboxSessions::new(sandbox, store.clone()));
    ToolRegistry::interview(sessions, store, config.sandbox.search_max_lines)
        .with_timeout(config.tool_timeout())
}
