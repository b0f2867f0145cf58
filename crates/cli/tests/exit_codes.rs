//! Exit statuses of the `conductor` binary as seen by a calling script

use std::path::Path;
use std::process::{Command, Output};

fn conductor(argv: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_conductor"))
        .args(argv)
        .env("RUST_LOG", "conductor=warn")
        .env_remove("CONDUCTOR_CAPTURE_DIR")
        .env_remove("CONDUCTOR_ARCHIVE_DIR")
        .env_remove("CONDUCTOR_ARTIFACT_PATTERN")
        .output()
        .expect("conductor binary should start")
}

fn reconcile(captures: &Path, destination: &Path, extra: &[&str]) -> Output {
    let mut argv = vec![
        "reconcile",
        captures.to_str().unwrap(),
        destination.to_str().unwrap(),
    ];
    argv.extend_from_slice(extra);
    conductor(&argv)
}

#[test]
fn test_reconcile_single_capture_exits_zero() {
    let captures = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(captures.path().join("webrtc_receive_stream_9.ivf"), b"frames").unwrap();
    let destination = out.path().join("trial_001.ivf");

    let output = reconcile(captures.path(), &destination, &[]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        destination.to_str().unwrap()
    );
    assert_eq!(std::fs::read(&destination).unwrap(), b"frames");
}

#[test]
fn test_reconcile_without_capture_exits_one() {
    let captures = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let output = reconcile(captures.path(), &out.path().join("trial_001.ivf"), &[]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_reconcile_with_two_captures_exits_two() {
    let captures = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(captures.path().join("webrtc_receive_stream_1.ivf"), b"a").unwrap();
    std::fs::write(captures.path().join("webrtc_receive_stream_2.ivf"), b"b").unwrap();

    let output = reconcile(captures.path(), &out.path().join("trial_001.ivf"), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(std::fs::read_dir(captures.path()).unwrap().count(), 0);
}

#[test]
fn test_reconcile_bad_pattern_exits_three() {
    let captures = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(captures.path().join("webrtc_receive_stream_1.ivf"), b"a").unwrap();

    let output = reconcile(
        captures.path(),
        &out.path().join("trial_001.ivf"),
        &["--pattern", "webrtc_[.ivf"],
    );

    assert_eq!(output.status.code(), Some(3));
    assert!(captures.path().join("webrtc_receive_stream_1.ivf").exists());
}

#[test]
fn test_missing_arguments_exit_three() {
    let output = conductor(&["reconcile"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_help_exits_zero() {
    let output = conductor(&["--help"]);

    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_restart_launch_failure_exits_one() {
    let base = tempfile::tempdir().unwrap();
    let missing = base.path().join("not_deployed");

    let output = Command::new(env!("CARGO_BIN_EXE_conductor"))
        .args(["restart", missing.to_str().unwrap(), "--by-command"])
        .args(["--settle-ms", "100", "--grace-ms", "50"])
        .env("RUST_LOG", "conductor=warn")
        .env_remove("CONDUCTOR_PORT")
        .env_remove("CONDUCTOR_EXECUTABLE")
        .env_remove("CONDUCTOR_LOG_FILE")
        .env_remove("CONDUCTOR_INHIBIT")
        .output()
        .expect("conductor binary should start");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}
