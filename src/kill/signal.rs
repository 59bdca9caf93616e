// src/kill/signal.rs

use tracing::debug;

use super::KillStrategy;

/// Terminate only the immediate process.
///
/// - Unix: `SIGTERM` to the pid.
/// - Windows: `taskkill /PID <pid> /F`, spawned and not awaited.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalKill;

impl KillStrategy for SignalKill {
    fn terminate(&self, pid: Option<u32>) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            let Some(raw) = super::signal_target(pid) else {
                return;
            };
            debug!(pid = raw, "sending SIGTERM");
            crate::errors::ignore_and_log(
                "SIGTERM to process",
                kill(Pid::from_raw(raw), Signal::SIGTERM),
            );
        }

        #[cfg(windows)]
        {
            let Some(pid) = pid else {
                return;
            };
            debug!(pid, "running taskkill for process");
            super::tree::spawn_taskkill(pid, false);
        }
    }
}
