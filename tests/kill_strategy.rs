use runwarden::kill::{KillStrategy, SignalKill, TreeKill, platform_default, strategy_for};
use runwarden::types::TreeKillMode;

#[test]
fn unknown_pid_is_a_no_op() {
    SignalKill.terminate(None);
    TreeKill.terminate(None);
}

#[test]
fn unsignalable_pids_are_ignored() {
    // 0 would address our own process group; u32::MAX is not a valid pid.
    SignalKill.terminate(Some(0));
    TreeKill.terminate(Some(0));
    SignalKill.terminate(Some(u32::MAX));
    TreeKill.terminate(Some(u32::MAX));
}

#[test]
fn strategy_selection_follows_tree_kill_mode() {
    assert!(!strategy_for(TreeKillMode::Never).isolates_process_group());
    assert_eq!(strategy_for(TreeKillMode::Always).isolates_process_group(), cfg!(unix));
    assert_eq!(
        strategy_for(TreeKillMode::Auto).isolates_process_group(),
        platform_default().isolates_process_group()
    );
}

#[cfg(unix)]
mod unix {
    use std::os::unix::process::{CommandExt, ExitStatusExt};
    use std::process::Command;

    use super::*;

    #[test]
    fn signal_kill_terminates_the_process() {
        let mut child = Command::new("sleep").arg("5").spawn().expect("spawn sleep");

        SignalKill.terminate(Some(child.id()));

        let status = child.wait().expect("wait for sleep");
        assert_eq!(status.signal(), Some(nix::sys::signal::Signal::SIGTERM as i32));
    }

    #[test]
    fn tree_kill_terminates_a_group_leader() {
        let mut child = Command::new("sleep")
            .arg("5")
            .process_group(0)
            .spawn()
            .expect("spawn sleep");

        TreeKill.terminate(Some(child.id()));

        let status = child.wait().expect("wait for sleep");
        assert!(status.signal().is_some());
    }

    #[test]
    fn terminating_a_reaped_child_is_harmless() {
        let mut child = Command::new("true").spawn().expect("spawn true");
        let pid = child.id();
        child.wait().expect("wait for true");

        // The group is gone, so killpg reports an error that must be swallowed.
        TreeKill.terminate(Some(pid));
    }
}
