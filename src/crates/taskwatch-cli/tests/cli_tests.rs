//! Integration tests for the taskwatch binary
//!
//! These run the built executable and check:
//! - Argument handling
//! - Exit codes for fail-open and fail-closed paths
//! - Config file loading

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Nothing listens here, so every request is refused.
const DEAD_URL: &str = "http://127.0.0.1:1/ml_app/api/datasets/1/audit/";

fn taskwatch(args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_taskwatch"));
    for key in [
        "TASKWATCH_CONFIG",
        "TASKWATCH_BASE_URL",
        "TASKWATCH_CSRF_TOKEN",
        "TASKWATCH_COOKIE",
        "TASKWATCH_INTERVAL_MS",
        "TASKWATCH_MAX_ATTEMPTS",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("Failed to run taskwatch")
}

#[test]
fn test_help_lists_commands() {
    let output = taskwatch(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["status", "launch", "poll", "run"] {
        assert!(stdout.contains(command), "missing {}", command);
    }
}

#[test]
fn test_status_fails_open_on_network_error() {
    let output = taskwatch(&["status", DEAD_URL, "--timeout-secs", "2"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "No prior task");
}

#[test]
fn test_status_json_output() {
    let output = taskwatch(&["status", DEAD_URL, "--format", "json"]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["outcome"], "no_prior_task");
}

#[test]
fn test_launch_network_error_exits_nonzero() {
    let output = taskwatch(&["launch", DEAD_URL, "--format", "json"]);
    assert!(!output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["outcome"], "failed");
    assert_eq!(value["error"]["kind"], "transport");
}

#[test]
fn test_poll_network_error_exits_nonzero() {
    let output = taskwatch(&["poll", DEAD_URL, "abc", "--interval-ms", "10"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Task failed (transport)"));
}

#[test]
fn test_relative_url_needs_base_url() {
    let output = taskwatch(&["status", "/ml_app/api/datasets/1/audit/"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("base_url"));
}

#[test]
fn test_invalid_body_is_rejected() {
    let output = taskwatch(&["launch", DEAD_URL, "--body", "{oops"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--body"));
}

#[test]
fn test_config_file_base_url_and_presets() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("taskwatch.yaml");
    fs::write(
        &path,
        "base_url: http://127.0.0.1:1\n\
         presets:\n  quick:\n    interval_ms: 10\n    max_attempts: 1\n",
    )
    .unwrap();
    let config = path.to_str().unwrap();

    let output = taskwatch(&["--config", config, "status", "/ml_app/api/datasets/1/audit/"]);
    assert!(output.status.success());

    let output = taskwatch(&["--config", config, "--preset", "quick", "poll", "/x/", "abc"]);
    assert!(!output.status.success());

    let output = taskwatch(&["--config", config, "--preset", "turbo", "status", "/x/"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("turbo"));
}
