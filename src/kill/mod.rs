// src/kill/mod.rs

//! Platform-specific process termination.
//!
//! The rest of the crate only ever talks to a [`KillStrategy`] trait object,
//! selected once when the invoker (or CLI) is constructed:
//!
//! - [`SignalKill`] signals the immediate process only.
//! - [`TreeKill`] additionally forces termination of every descendant. This is
//!   the default on Windows, where children survive the death of their parent
//!   and keep holding file locks and mount points.
//!
//! Every strategy is best-effort: it never returns an error and never panics.
//! Failures (typically "no such process" because the child already exited)
//! are termination noise and are only logged at debug level.

use std::fmt::Debug;
use std::sync::Arc;

use crate::types::TreeKillMode;

mod signal;
mod tree;

pub use signal::SignalKill;
pub use tree::TreeKill;

/// Strategy for terminating a managed process.
pub trait KillStrategy: Send + Sync + Debug {
    /// Request termination of the process with the given id.
    ///
    /// `None` (the process never started, or its id is unknown) is a no-op.
    /// Calling this for a process that already exited is also a no-op.
    fn terminate(&self, pid: Option<u32>);

    /// Whether spawned children should be placed in their own process group
    /// so that the whole group can later be signalled.
    fn isolates_process_group(&self) -> bool {
        false
    }
}

/// The strategy appropriate for the current platform.
pub fn platform_default() -> Arc<dyn KillStrategy> {
    if cfg!(windows) {
        Arc::new(TreeKill)
    } else {
        Arc::new(SignalKill)
    }
}

/// Resolve a configured [`TreeKillMode`] into a concrete strategy.
pub fn strategy_for(mode: TreeKillMode) -> Arc<dyn KillStrategy> {
    match mode {
        TreeKillMode::Auto => platform_default(),
        TreeKillMode::Always => Arc::new(TreeKill),
        TreeKillMode::Never => Arc::new(SignalKill),
    }
}

/// Convert a pid into something safe to signal.
///
/// Pid 0 would address our own process group on Unix, so it is rejected
/// along with anything that does not fit in a `pid_t`.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn signal_target(pid: Option<u32>) -> Option<i32> {
    let pid = pid?;
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(raw),
        _ => None,
    }
}
