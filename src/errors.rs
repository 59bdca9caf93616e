// src/errors.rs

//! Crate-wide error types and helpers.
//!
//! Two families live here:
//! - [`RunwardenError`] covers configuration, IO and CLI plumbing and is
//!   returned through the crate [`Result`] alias.
//! - [`OperationError`] describes why a managed operation failed. It is never
//!   returned as `Err` from the operation API; it travels as data into
//!   `on_error` callbacks and `CaptureResult::error`.

use std::fmt::Display;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RunwardenError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunwardenError>;

/// Failure of a single managed operation.
#[derive(Error, Debug)]
pub enum OperationError {
    /// The OS refused to create the process (missing binary, permissions).
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// The process was running but the OS reported an error for it.
    #[error("process error: {0}")]
    Process(#[source] io::Error),

    /// The operation exceeded its deadline and was killed.
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl OperationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OperationError::TimedOut(_))
    }
}

/// Swallow a best-effort failure, leaving a trace at debug level.
///
/// Used for termination noise, registration misuse and stdin writes: none of
/// those may surface to the caller or interrupt cleanup.
pub fn ignore_and_log<T, E: Display>(context: &str, result: std::result::Result<T, E>) {
    if let Err(err) = result {
        debug!(context, error = %err, "ignoring best-effort failure");
    }
}
