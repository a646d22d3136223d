//! Integration tests for the fim CLI binary.
//!
//! These tests exercise the actual compiled binary using assert_cmd. Every
//! test keeps its database, logs and backups in its own temporary state
//! directory.

use std::path::Path;

use assert_cmd::Command;
use fim_test_utils::TestTree;
use predicates::prelude::*;

/// A `fim` command isolated to the tree's state directory
fn fim(tree: &TestTree) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fim"));
    cmd.env_remove("FIM_CONFIG")
        .env("XDG_CONFIG_HOME", tree.state_dir())
        .env("RUST_LOG", "warn")
        .arg("--data-dir")
        .arg(tree.state_dir());
    cmd
}

/// Start and immediately stop a poll-mode session over the tree root.
fn monitor_once(tree: &TestTree) -> assert_cmd::assert::Assert {
    fim(tree)
        .args(["monitor", "--once", "--mode", "poll", "--no-backup"])
        .arg(tree.root())
        .assert()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_output() {
    let tree = TestTree::new();
    fim(&tree)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("File Integrity Monitor"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("baseline"));
}

#[test]
fn test_version_output() {
    let tree = TestTree::new();
    fim(&tree)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fim"));
}

#[test]
fn test_no_command_shows_help_hint() {
    let tree = TestTree::new();
    fim(&tree)
        .assert()
        .success()
        .stdout(predicate::str::contains("fim --help"));
}

#[test]
fn test_completions_bash() {
    let tree = TestTree::new();
    fim(&tree)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fim"));
}

// ============================================================================
// Monitor Command Tests
// ============================================================================

#[test]
fn test_monitor_once_records_baseline() {
    let tree = TestTree::new();
    tree.write("index.html", "<h1>hello</h1>");
    tree.write("css/site.css", "body {}");

    monitor_once(&tree)
        .success()
        .stdout(predicate::str::contains("Monitoring stopped"))
        .stdout(predicate::str::contains("Changes since last run").not());

    fim(&tree)
        .args(["baseline", "view"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("(3 entries)"))
        .stdout(predicate::str::contains("css/site.css"))
        .stdout(predicate::str::contains("current"));
}

#[test]
fn test_monitor_reports_drift_since_last_run() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");
    monitor_once(&tree).success();

    tree.append("a.txt", " world");
    tree.write("b.txt", "new");

    monitor_once(&tree)
        .success()
        .stdout(predicate::str::contains("Changes since last run (2)"))
        .stdout(predicate::str::contains("modified"))
        .stdout(predicate::str::contains("added"));

    fim(&tree)
        .arg("history")
        .arg(tree.path("a.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("modified"))
        .stdout(predicate::str::contains("a.txt"));

    fim(&tree)
        .args(["recent", "--hours", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("b.txt"));
}

#[test]
fn test_monitor_json_report() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");

    fim(&tree)
        .args(["monitor", "--once", "--json", "--mode", "poll", "--no-backup"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"started\""))
        .stdout(predicate::str::contains("\"failures\": []"));
}

#[test]
fn test_monitor_missing_directory_fails() {
    let tree = TestTree::new();
    fim(&tree)
        .args(["monitor", "--once", "--mode", "poll", "--no-backup"])
        .arg(tree.path("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("No monitored directory could be started"));
}

#[test]
fn test_monitor_partial_failure_still_starts() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");

    fim(&tree)
        .args(["monitor", "--once", "--mode", "poll", "--no-backup"])
        .arg(tree.root())
        .arg(tree.path("missing"))
        .assert()
        .success()
        .stdout(predicate::str::contains("missing"))
        .stdout(predicate::str::contains("Monitoring stopped"));
}

#[test]
fn test_monitor_excluded_subtree_not_in_baseline() {
    let tree = TestTree::new();
    tree.write("keep.txt", "1");
    tree.write("cache/tmp.bin", "2");

    fim(&tree)
        .args(["monitor", "--once", "--mode", "poll", "--no-backup", "-x"])
        .arg(tree.path("cache"))
        .arg(tree.root())
        .assert()
        .success();

    fim(&tree)
        .args(["baseline", "view"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("keep.txt"))
        .stdout(predicate::str::contains("cache").not());
}

#[test]
fn test_monitor_requires_directories() {
    let tree = TestTree::new();
    fim(&tree).arg("monitor").assert().failure();
}

// ============================================================================
// Baseline Command Tests
// ============================================================================

#[test]
fn test_baseline_view_empty() {
    let tree = TestTree::new();
    fim(&tree)
        .args(["baseline", "view"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No baselines recorded"));
}

#[test]
fn test_baseline_view_json() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");
    monitor_once(&tree).success();

    fim(&tree)
        .args(["baseline", "view", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["))
        .stdout(predicate::str::contains("\"directory\""))
        .stdout(predicate::str::contains("\"status\": \"current\""));
}

#[test]
fn test_baseline_reset_without_session() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");
    tree.write("b.txt", "world");

    fim(&tree)
        .args(["baseline", "reset"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries"));

    monitor_once(&tree)
        .success()
        .stdout(predicate::str::contains("Changes since last run").not());
}

#[test]
fn test_baseline_accept_promotes_drift() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");
    monitor_once(&tree).success();
    tree.write("a.txt", "changed");
    monitor_once(&tree).success();

    fim(&tree)
        .args(["baseline", "view"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("modified"));

    fim(&tree)
        .args(["baseline", "accept"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("Accepted 1 changes"));

    fim(&tree)
        .args(["baseline", "view"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("modified").not());
}

#[test]
fn test_unmonitor_purges_records() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");
    monitor_once(&tree).success();

    fim(&tree)
        .arg("unmonitor")
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("no longer monitored"));

    fim(&tree)
        .args(["baseline", "view"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No baselines recorded"));
}

// ============================================================================
// Logs, Backups and Config Tests
// ============================================================================

#[test]
fn test_logs_show_directory_log() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");
    monitor_once(&tree).success();

    fim(&tree)
        .arg("logs")
        .assert()
        .success()
        .stdout(predicate::str::contains("FIM_watched_"))
        .stdout(predicate::str::contains("Monitoring started"))
        .stdout(predicate::str::contains("Monitoring stopped"));

    fim(&tree)
        .args(["logs", "--json"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"file\": \"FIM_watched_"));
}

#[test]
fn test_backup_on_start_and_restore() {
    let tree = TestTree::new();
    tree.write("a.txt", "hello");
    tree.write("docs/readme.md", "read me");

    fim(&tree)
        .args(["monitor", "--once", "--mode", "poll"])
        .arg(tree.root())
        .assert()
        .success();

    fim(&tree)
        .arg("backups")
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 files"));

    let snapshot = std::fs::read_dir(tree.state_dir().join("backups"))
        .unwrap()
        .map(|dirent| dirent.unwrap().path())
        .find(|path| path.is_dir())
        .expect("snapshot directory");
    let destination = tree.sibling("restored");

    fim(&tree)
        .args(["restore", &path_arg(&snapshot), &path_arg(&destination)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 files"));
    TestTree::assert_file_contains(&destination.join("docs/readme.md"), "read me");
}

#[test]
fn test_restore_missing_snapshot_fails() {
    let tree = TestTree::new();
    fim(&tree)
        .arg("restore")
        .arg(tree.path("nope"))
        .arg(tree.sibling("dest"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snapshot not found"));
}

#[test]
fn test_config_init_and_show() {
    let tree = TestTree::new();
    let file = tree.state_dir().join("fim.toml");

    fim(&tree)
        .args(["config", "init"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written"));
    assert!(file.is_file());

    fim(&tree)
        .args(["config", "init"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    fim(&tree)
        .arg("--config")
        .arg(&file)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Poll interval"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_missing_config_file_fails() {
    let tree = TestTree::new();
    fim(&tree)
        .args(["--config", "/nonexistent/fim.toml", "logs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}
