//! CLI integration tests.
//!
//! These tests run the devpilot binary end-to-end against temporary repos.

use devpilot_test_utils::{edit_json, TestProject};
use std::path::Path;
use std::process::{Command, Output};

fn devpilot(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_devpilot"))
        .arg("--config-dir")
        .arg(config_dir)
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_devpilot"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("patch application engine"));
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("apply"));
}

#[test]
fn test_scan_reports_file_count() {
    let project = TestProject::new()
        .with_file("src/main.rs", "fn main() {}")
        .with_file("node_modules/pkg/index.js", "")
        .build();
    let config = tempfile::tempdir().unwrap();

    let output = devpilot(config.path(), &["scan", &project.root_str()]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["files"], 1);
}

#[test]
fn test_scan_missing_root_fails() {
    let config = tempfile::tempdir().unwrap();
    let output = devpilot(config.path(), &["scan", "/definitely/not/a/real/root"]);
    assert!(!output.status.success());
}

#[test]
fn test_plan_apply_revert() {
    let project = TestProject::new().with_file("a.txt", "hello").build();
    let config = tempfile::tempdir().unwrap();
    let root = project.root_str();

    let edits_file = config.path().join("edits.json");
    let edits = serde_json::json!({ "files": [edit_json("a.txt", "world", Some("hello"))] });
    std::fs::write(&edits_file, edits.to_string()).unwrap();
    let edits_arg = edits_file.to_string_lossy().into_owned();

    let output = devpilot(config.path(), &["plan", "--root", &root, "--edits", &edits_arg]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["summary"]["update"], 1);
    assert_eq!(project.read_file("a.txt"), "hello");

    let output = devpilot(
        config.path(),
        &["apply", "--root", &root, "--edits", &edits_arg, "--dry-run"],
    );
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["dry_run"], true);
    assert_eq!(project.read_file("a.txt"), "hello");

    let output = devpilot(config.path(), &["apply", "--root", &root, "--edits", &edits_arg]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["written"][0], "a.txt");
    assert_eq!(project.read_file("a.txt"), "world");
    assert_eq!(project.read_backup("a.txt").as_deref(), Some("hello"));

    let output = devpilot(config.path(), &["revert", "--root", &root, "a.txt"]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["restored"][0], "a.txt");
    assert_eq!(project.read_file("a.txt"), "hello");
}

#[test]
fn test_apply_rejects_escaping_path() {
    let project = TestProject::new().with_file("a.txt", "hello").build();
    let config = tempfile::tempdir().unwrap();

    let edits_file = config.path().join("edits.json");
    let edits = serde_json::json!([edit_json("../escape.txt", "x", None)]);
    std::fs::write(&edits_file, edits.to_string()).unwrap();
    let root = project.root_str();
    let edits_arg = edits_file.to_string_lossy().into_owned();

    let output = devpilot(config.path(), &["apply", "--root", &root, "--edits", &edits_arg]);
    assert!(!output.status.success());
    assert!(!project.path().parent().unwrap().join("escape.txt").exists());
}
