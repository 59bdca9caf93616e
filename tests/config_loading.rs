use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use runwarden::config::{ConfigFile, load_and_validate, load_from_path, load_or_default};
use runwarden::errors::RunwardenError;
use runwarden::types::TreeKillMode;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn full_config_is_loaded() {
    let file = write_config(
        r#"
[capture]
timeout_ms = 2500
encoding = "latin1"

[kill]
tree_kill = "always"
"#,
    );

    let cfg = load_and_validate(file.path()).expect("valid config");

    assert_eq!(cfg.default_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(cfg.encoding().name(), "windows-1252");
    assert_eq!(cfg.kill.tree_kill, TreeKillMode::Always);
    assert_eq!(cfg.kill_strategy().isolates_process_group(), cfg!(unix));

    let defaults = cfg.capture_defaults();
    assert_eq!(defaults.timeout, Some(Duration::from_millis(2500)));
    assert_eq!(defaults.encoding, cfg.encoding());
}

#[test]
fn empty_config_uses_defaults() {
    let file = write_config("");

    let cfg = load_and_validate(file.path()).expect("valid config");

    assert_eq!(cfg.default_timeout(), None);
    assert_eq!(cfg.capture.encoding, "utf-8");
    assert_eq!(cfg.kill.tree_kill, TreeKillMode::Auto);
}

#[test]
fn zero_timeout_is_rejected() {
    let file = write_config("[capture]\ntimeout_ms = 0\n");

    let err = load_and_validate(file.path()).unwrap_err();
    match err {
        RunwardenError::ConfigError(msg) => assert!(msg.contains("timeout_ms"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_encoding_is_rejected() {
    let file = write_config("[capture]\nencoding = \"klingon\"\n");

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, RunwardenError::ConfigError(ref msg) if msg.contains("klingon")));
}

#[test]
fn unknown_tree_kill_mode_is_a_toml_error() {
    let file = write_config("[kill]\ntree_kill = \"sometimes\"\n");

    let err = load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, RunwardenError::TomlError(_)));
}

#[test]
fn missing_optional_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("Runwarden.toml");

    let cfg = load_or_default(&path, false).expect("defaults");
    assert_eq!(cfg.default_timeout(), ConfigFile::default().default_timeout());

    let err = load_or_default(&path, true).unwrap_err();
    assert!(matches!(err, RunwardenError::IoError(_)));
}
