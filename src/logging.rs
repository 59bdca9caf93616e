// src/logging.rs

//! `tracing` subscriber setup for the `runwarden` binary.
//!
//! The filter comes from the first of these that is set:
//! 1. `--log-level` on the command line,
//! 2. `RUNWARDEN_LOG`, which accepts full `EnvFilter` directives such as
//!    `runwarden::exec=debug,warn`,
//! 3. `info`.
//!
//! Everything goes to stderr; stdout carries the captured command output.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "RUNWARDEN_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_env_filter(resolve_filter(cli_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn resolve_filter(cli_level: Option<LogLevel>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::default().add_directive(Level::from(level).into());
    }

    match std::env::var(LOG_ENV_VAR) {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(directives.trim()).unwrap_or_else(|err| {
                eprintln!("runwarden: ignoring invalid {LOG_ENV_VAR}: {err}");
                EnvFilter::new("info")
            })
        }
        _ => EnvFilter::new("info"),
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
