use std::time::Duration;

use clap::Parser;

use runwarden::cli::CliArgs;
use runwarden::config::ConfigFile;
use runwarden::types::{CaptureResult, OperationKind};
use runwarden::{TIMEOUT_EXIT_CODE, capture_options, exit_code_for};

fn parse(args: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("runwarden").chain(args.iter().copied()))
        .expect("valid arguments")
}

#[test]
fn trailing_command_keeps_its_own_flags() {
    let args = parse(&["--timeout-ms", "250", "ls", "-la", "--color"]);

    assert_eq!(args.timeout_ms, Some(250));
    assert_eq!(args.command, vec!["ls", "-la", "--color"]);
    assert_eq!(args.kind, OperationKind::Process);
}

#[test]
fn command_is_required_and_timeout_must_be_positive() {
    assert!(CliArgs::try_parse_from(["runwarden"]).is_err());
    assert!(CliArgs::try_parse_from(["runwarden", "--timeout-ms", "0", "true"]).is_err());
    assert!(CliArgs::try_parse_from(["runwarden", "--env", "NOVALUE", "true"]).is_err());
    assert!(CliArgs::try_parse_from(["runwarden", "--kind", "daemon", "true"]).is_err());
}

#[test]
fn options_merge_flags_over_config() {
    let args = parse(&[
        "--timeout-ms",
        "100",
        "--encoding",
        "latin1",
        "--stdin",
        "input",
        "--cwd",
        "/tmp",
        "--kind",
        "mount",
        "--clear-env",
        "--env",
        "A=1",
        "--env",
        "B=x=y",
        "cat",
    ]);

    let options = capture_options(&args, &ConfigFile::default()).expect("options");

    assert_eq!(options.timeout, Some(Duration::from_millis(100)));
    assert_eq!(options.encoding.map(|e| e.name()), Some("windows-1252"));
    assert_eq!(options.stdin.as_deref(), Some(&b"input"[..]));
    assert_eq!(options.cwd.as_deref(), Some(std::path::Path::new("/tmp")));
    assert_eq!(options.kind, OperationKind::Mount);

    let env = options.env.expect("explicit env");
    assert_eq!(env.len(), 2);
    assert_eq!(env.get("A").map(String::as_str), Some("1"));
    assert_eq!(env.get("B").map(String::as_str), Some("x=y"));
}

#[test]
fn env_is_inherited_unless_overridden() {
    let args = parse(&["true"]);
    let options = capture_options(&args, &ConfigFile::default()).expect("options");
    assert!(options.env.is_none());
    assert_eq!(options.timeout, None);
    assert_eq!(options.encoding.map(|e| e.name()), Some("UTF-8"));
}

#[test]
fn unknown_encoding_flag_is_an_error() {
    let args = parse(&["--encoding", "klingon", "true"]);
    assert!(capture_options(&args, &ConfigFile::default()).is_err());
}

#[test]
fn exit_codes_follow_the_capture_outcome() {
    let exited = CaptureResult {
        exit_code: Some(3),
        ..CaptureResult::default()
    };
    assert_eq!(exit_code_for(&exited), 3);

    let timed_out = CaptureResult {
        error: Some("timed out after 10ms".to_string()),
        timed_out: true,
        ..CaptureResult::default()
    };
    assert_eq!(exit_code_for(&timed_out), TIMEOUT_EXIT_CODE);

    let failed = CaptureResult {
        error: Some("failed to spawn process: not found".to_string()),
        ..CaptureResult::default()
    };
    assert_eq!(exit_code_for(&failed), 1);

    let signalled = CaptureResult::default();
    assert_eq!(exit_code_for(&signalled), 1);
}
