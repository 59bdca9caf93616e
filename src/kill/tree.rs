// src/kill/tree.rs

use tracing::debug;

use super::KillStrategy;

/// Forced, recursive termination of a process and all of its descendants.
///
/// - Windows: `taskkill /PID <pid> /T /F`. Fire-and-forget; if the process
///   already exited, taskkill fails and nobody looks at its status.
/// - Unix: `SIGTERM` to the pid, then `SIGKILL` to the process group it
///   leads. Only effective for children spawned while
///   [`KillStrategy::isolates_process_group`] was honoured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeKill;

impl KillStrategy for TreeKill {
    fn terminate(&self, pid: Option<u32>) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill, killpg};
            use nix::unistd::Pid;

            let Some(raw) = super::signal_target(pid) else {
                return;
            };
            debug!(pid = raw, "killing process tree");
            crate::errors::ignore_and_log(
                "SIGTERM to process",
                kill(Pid::from_raw(raw), Signal::SIGTERM),
            );
            crate::errors::ignore_and_log(
                "SIGKILL to process group",
                killpg(Pid::from_raw(raw), Signal::SIGKILL),
            );
        }

        #[cfg(windows)]
        {
            let Some(pid) = pid else {
                return;
            };
            debug!(pid, "killing process tree");
            spawn_taskkill(pid, true);
        }
    }

    fn isolates_process_group(&self) -> bool {
        cfg!(unix)
    }
}

#[cfg(windows)]
pub(super) fn spawn_taskkill(pid: u32, tree: bool) {
    use std::process::{Command, Stdio};

    let mut cmd = Command::new("taskkill");
    cmd.arg("/PID").arg(pid.to_string());
    if tree {
        cmd.arg("/T");
    }
    cmd.arg("/F")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // The child handle is dropped without waiting.
    crate::errors::ignore_and_log("spawning taskkill", cmd.spawn());
}
