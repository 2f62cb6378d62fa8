//! Tracing setup for the `proctor` binary and embedders.
//!
//! [`init`] installs a global subscriber with an `EnvFilter` and a fmt
//! layer, plain or JSON, writing to stderr. `PROCTOR_LOG` overrides the
//! configured level.
//! Only the first call in a process takes effect.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Environment variable that overrides [`LoggingConfig::level`].
pub const LOG_ENV: &str = "PROCTOR_LOG";

/// Build the filter: `PROCTOR_LOG` if set and valid, else the configured
/// level, else `info`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = env_filter(config);
    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.is_ok()
}
