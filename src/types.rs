// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// What a registered operation represents.
///
/// Both kinds are managed identically; the kind is carried for the host's
/// benefit (e.g. to show mounts differently from one-shot commands).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Process,
    Mount,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Process => f.write_str("process"),
            OperationKind::Mount => f.write_str("mount"),
        }
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "process" => Ok(OperationKind::Process),
            "mount" => Ok(OperationKind::Mount),
            other => Err(format!(
                "invalid operation kind: {other} (expected \"process\" or \"mount\")"
            )),
        }
    }
}

/// The single terminal state a managed operation settles into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalState {
    TimedOut,
    Closed,
    Errored,
    Stopped,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalState::TimedOut => "timed_out",
            TerminalState::Closed => "closed",
            TerminalState::Errored => "errored",
            TerminalState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// How the exit of a process was reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number (Unix only).
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Final, immutable outcome of a capture invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub timed_out: bool,
}

impl CaptureResult {
    /// True when the process exited on its own with code 0.
    pub fn success(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }
}

/// Whether termination should reach the whole descendant tree.
///
/// - `Auto`: tree-kill only on platforms where orphans are a known risk.
/// - `Always`: always tree-kill.
/// - `Never`: only ever signal the immediate process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKillMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for TreeKillMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(TreeKillMode::Auto),
            "always" => Ok(TreeKillMode::Always),
            "never" => Ok(TreeKillMode::Never),
            other => Err(format!(
                "invalid tree_kill: {other} (expected \"auto\", \"always\" or \"never\")"
            )),
        }
    }
}
