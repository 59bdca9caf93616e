// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::OperationKind;

/// Command-line arguments for `runwarden`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runwarden",
    version,
    about = "Run a command under supervision, enforce a timeout and capture its output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Runwarden.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Kill the command after this many milliseconds.
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Encoding used to decode the command's output (e.g. utf-8, latin1).
    #[arg(long, value_name = "LABEL")]
    pub encoding: Option<String>,

    /// Text written to the command's stdin before it is closed.
    #[arg(long, value_name = "TEXT")]
    pub stdin: Option<String>,

    /// Working directory for the command.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable for the command. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Start the command with an empty environment (plus any `--env`).
    #[arg(long)]
    pub clear_env: bool,

    /// Kind of operation to register (process or mount).
    #[arg(long, value_name = "KIND", default_value = "process")]
    pub kind: OperationKind,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNWARDEN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve config and options, print them, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// The program to run followed by its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
