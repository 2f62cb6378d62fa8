//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working configuration:
//!
//! ```ignore
//! let config = ProctorConfig::load("proctor.json")?
//!     .with_search_max_lines(100)
//!     .with_retries(5);
//! let transport = ResilientTransport::new(config.transport_config());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::recorder::BufferConfig;
use crate::tools::search::DEFAULT_MAX_LINES;
use crate::transport::TransportConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    pub sandbox: SandboxConfig,
    pub tools: ToolsConfig,
    pub transport: TransportSettings,
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
}

// ── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory under which the local sandbox creates candidate
    /// workspaces. Defaults to `<tmp>/proctor`.
    pub base_dir: Option<PathBuf>,
    pub search_max_lines: usize,
    pub command_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            search_max_lines: DEFAULT_MAX_LINES,
            command_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Per-call timeout. 0 disables it.
    pub call_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: crate::tools::DEFAULT_TOOL_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub attempt_timeout_secs: u64,
    /// Wait for connectivity before retrying a network failure. Unset
    /// retries on the normal schedule.
    pub connectivity_wait_ms: Option<u64>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            max_retries: defaults.max_retries,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            attempt_timeout_secs: defaults.attempt_timeout.as_secs(),
            connectivity_wait_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub max_batch: usize,
    pub flush_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let defaults = BufferConfig::default();
        Self {
            max_batch: defaults.max_batch,
            flush_interval_ms: defaults.flush_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `proctor=debug`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ── Loading and builders ───────────────────────────────────────────

impl ProctorConfig {
    /// Read a JSON config file. Missing sections and fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the runtime misbehave.
    pub fn validate(&self) -> Result<()> {
        let factor = self.transport.backoff_factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(Error::Config(format!(
                "transport.backoff_factor must be a finite number >= 1, got {factor}"
            )));
        }
        Ok(())
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sandbox.base_dir = Some(dir.into());
        self
    }

    pub fn with_search_max_lines(mut self, lines: usize) -> Self {
        self.sandbox.search_max_lines = lines;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.sandbox.command_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tools.call_timeout_secs = timeout.map_or(0, |t| t.as_secs());
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.transport.max_retries = max_retries;
        self
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.recorder.max_batch = max_batch;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.logging.json = json;
        self
    }

    /// Where the local sandbox provisions candidate directories.
    pub fn local_base_dir(&self) -> PathBuf {
        self.sandbox
            .base_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("proctor"))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox.command_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tools.call_timeout_secs > 0).then(|| Duration::from_secs(self.tools.call_timeout_secs))
    }

    pub fn transport_config(&self) -> TransportConfig {
        let t = &self.transport;
        TransportConfig {
            max_retries: t.max_retries,
            initial_delay: Duration::from_millis(t.initial_delay_ms),
            max_delay: Duration::from_millis(t.max_delay_ms),
            backoff_factor: t.backoff_factor,
            attempt_timeout: Duration::from_secs(t.attempt_timeout_secs),
            connectivity_wait: t.connectivity_wait_ms.map(Duration::from_millis),
        }
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            max_batch: self.recorder.max_batch.max(1),
            flush_interval: Duration::from_millis(self.recorder.flush_interval_ms.max(1)),
        }
    }
}
