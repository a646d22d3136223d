//! End-to-end session tests
//!
//! These drive complete monitoring sessions through their real schedulers:
//! the background poll loop and the platform filesystem watcher. Assertions
//! wait on the persisted store state rather than on timing.

use std::path::Path;
use std::time::Duration;

use fim_core::monitor::normalize;
use fim_core::{
    BaselineStore, Classification, EntryStatus, Monitor, MonitorConfig, MonitorMode, MonitorState,
    SqliteStore,
};
use fim_fs::EntryKind;
use fim_test_utils::{TestTree, wait_until};
use pretty_assertions::assert_eq;

const TIMEOUT: Duration = Duration::from_secs(10);

fn config(tree: &TestTree, mode: MonitorMode) -> MonitorConfig {
    let mut config = MonitorConfig::with_data_dir(tree.state_dir());
    config.mode = mode;
    config.poll_interval_secs = 1;
    config.backup_on_start = false;
    config.owner = "integration".to_string();
    config
}

fn status(monitor: &Monitor, tree: &TestTree, path: &Path) -> Option<EntryStatus> {
    monitor
        .store()
        .entry(&normalize(&tree.root()), &normalize(path))
        .unwrap()
        .map(|entry| entry.status)
}

#[test]
fn test_poll_loop_detects_modification_in_background() {
    let tree = TestTree::new();
    let file = tree.write("report.csv", "a,b\n1,2\n");

    let mut monitor = Monitor::open(config(&tree, MonitorMode::Poll)).unwrap();
    monitor.start(&[tree.root()], &[]).unwrap();
    assert_eq!(status(&monitor, &tree, &file), Some(EntryStatus::Current));

    tree.append("report.csv", "3,4\n");
    assert!(
        wait_until(TIMEOUT, || status(&monitor, &tree, &file) == Some(EntryStatus::Modified)),
        "poll loop never recorded the modification"
    );

    monitor.stop().unwrap();
    assert_eq!(monitor.state(), MonitorState::Idle);

    let history = monitor.file_history(&file, 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].classification, Classification::Modified);

    let log = &monitor.view_logs(Some(&tree.root())).unwrap()[0].1;
    assert!(log.contains("| ERROR | integration | File modified"));
}

#[test]
fn test_platform_watcher_reports_creation_and_deletion() {
    let tree = TestTree::new();
    let doomed = tree.write("doomed.txt", "bye");

    let mut monitor = Monitor::open(config(&tree, MonitorMode::Watch)).unwrap();
    monitor.start(&[tree.root()], &[]).unwrap();

    let created = tree.write("fresh.txt", "hi");
    assert!(
        wait_until(TIMEOUT, || status(&monitor, &tree, &created).is_some()),
        "watcher never recorded the new file"
    );

    tree.remove("doomed.txt");
    assert!(
        wait_until(TIMEOUT, || status(&monitor, &tree, &doomed).is_none()),
        "watcher never recorded the deletion"
    );

    monitor.stop().unwrap();
    let history = monitor.file_history(&doomed, 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].classification, Classification::Deleted);

    // Newest first; the creation may be followed by a content write
    let created_history = monitor.file_history(&created, 10).unwrap();
    assert_eq!(
        created_history.last().map(|event| event.classification),
        Some(Classification::Added)
    );
}

#[test]
fn test_rename_detection_pairs_moved_file() {
    let tree = TestTree::new();
    tree.write("inbox/invoice.pdf", "%PDF-1.7 invoice");
    tree.mkdir("archive");

    let mut config = config(&tree, MonitorMode::Poll);
    config.poll_interval_secs = 3600;
    config.detect_renames = true;
    let mut monitor = Monitor::open(config).unwrap();
    monitor.start(&[tree.root()], &[]).unwrap();

    tree.rename("inbox/invoice.pdf", "archive/invoice.pdf");
    let report = monitor.poll_once().unwrap();

    let files: Vec<_> = report
        .changes
        .iter()
        .filter(|change| change.kind == EntryKind::File)
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].classification, Classification::Renamed);
    assert_eq!(files[0].path, normalize(&tree.path("archive/invoice.pdf")));
    assert_eq!(
        files[0].previous_path,
        Some(normalize(&tree.path("inbox/invoice.pdf")))
    );

    assert_eq!(status(&monitor, &tree, &tree.path("inbox/invoice.pdf")), None);
    assert_eq!(
        status(&monitor, &tree, &tree.path("archive/invoice.pdf")),
        Some(EntryStatus::Added)
    );
    monitor.stop().unwrap();
}

#[test]
fn test_moved_file_without_rename_detection_is_delete_plus_add() {
    let tree = TestTree::new();
    tree.write("inbox/invoice.pdf", "%PDF-1.7 invoice");
    tree.mkdir("archive");

    let mut config = config(&tree, MonitorMode::Poll);
    config.poll_interval_secs = 3600;
    let mut monitor = Monitor::open(config).unwrap();
    monitor.start(&[tree.root()], &[]).unwrap();

    tree.rename("inbox/invoice.pdf", "archive/invoice.pdf");
    let report = monitor.poll_once().unwrap();

    let mut files: Vec<_> = report
        .changes
        .iter()
        .filter(|change| change.kind == EntryKind::File)
        .map(|change| change.classification)
        .collect();
    files.sort();
    assert_eq!(files, vec![Classification::Deleted, Classification::Added]);
    monitor.stop().unwrap();
}

#[test]
fn test_state_survives_process_restart() {
    let tree = TestTree::new();
    let file = tree.write("config.ini", "[main]\nport=80\n");
    let other = tree.sibling("other");
    std::fs::write(other.join("notes.txt"), "n").unwrap();

    {
        let mut monitor = Monitor::open(config(&tree, MonitorMode::Poll)).unwrap();
        monitor.start(&[tree.root(), other.clone()], &[]).unwrap();
        monitor.stop().unwrap();
    }

    tree.write("config.ini", "[main]\nport=8080\n");

    let mut monitor = Monitor::open(config(&tree, MonitorMode::Poll)).unwrap();
    let report = monitor.start(&[tree.root(), other.clone()], &[]).unwrap();
    assert_eq!(report.started.len(), 2);
    assert_eq!(report.initial.changes.len(), 1);
    assert_eq!(report.initial.changes[0].path, normalize(&file));
    monitor.stop().unwrap();
    drop(monitor);

    let database = tree.state_dir().join("fim.db");
    let store = SqliteStore::open(&database, 2).unwrap();
    let mut directories = store.monitored_directories().unwrap();
    directories.sort();
    let mut expected = vec![normalize(&tree.root()), normalize(&other)];
    expected.sort();
    assert_eq!(directories, expected);
    assert_eq!(store.file_history(&normalize(&file), 10).unwrap().len(), 1);
}
