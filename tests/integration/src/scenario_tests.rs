//! Scenario tests for the integrity properties of the engine
//!
//! Each test walks one realistic scenario across the filesystem layer, the
//! reconciler and the store, and checks the observable outcome.

use std::path::Path;

use fim_core::monitor::normalize;
use fim_core::{
    BaselineStore, Classification, EntryStatus, Monitor, MonitorConfig, MonitorMode, ReconcileReport,
};
use fim_fs::{EntryKind, ExclusionSet, Scanner, hash_file, hash_folder};
use fim_test_utils::TestTree;
use pretty_assertions::assert_eq;

fn started(tree: &TestTree, directories: &[&Path]) -> Monitor {
    let mut config = MonitorConfig::with_data_dir(tree.state_dir());
    config.mode = MonitorMode::Poll;
    config.poll_interval_secs = 3600;
    config.backup_on_start = false;
    let mut monitor = Monitor::open(config).unwrap();
    let directories: Vec<_> = directories.iter().map(|d| d.to_path_buf()).collect();
    monitor.start(&directories, &[]).unwrap();
    monitor
}

fn classified(report: &ReconcileReport) -> Vec<(String, EntryKind, Classification)> {
    let mut changes: Vec<_> = report
        .changes
        .iter()
        .map(|c| (c.path.file_name().unwrap_or("").to_string(), c.kind, c.classification))
        .collect();
    changes.sort();
    changes
}

#[test]
fn test_folder_fingerprint_is_deterministic_and_content_sensitive() {
    let tree = TestTree::new();
    tree.write("site/index.html", "<h1>home</h1>");
    tree.write("site/about/index.html", "<h1>about</h1>");
    tree.write("site/assets/logo.svg", "<svg/>");

    let first = hash_folder(&tree.root());
    let second = hash_folder(&tree.root());
    assert!(first.is_some());
    assert_eq!(first, second);

    let scanner = Scanner::new(ExclusionSet::new());
    let a = scanner.scan(&tree.root()).unwrap();
    let b = scanner.scan(&tree.root()).unwrap();
    assert_eq!(a.root_fingerprint, first);
    let fingerprints = |s: &fim_fs::Snapshot| {
        s.iter()
            .map(|e| (e.path.clone(), e.fingerprint.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(fingerprints(&a), fingerprints(&b));

    // A change three levels down reaches the root
    tree.write("site/about/index.html", "<h1>about us</h1>");
    assert_ne!(hash_folder(&tree.root()), first);
}

#[test]
fn test_content_edit_flows_from_fingerprint_to_history() {
    let tree = TestTree::new();
    let file = tree.write("a.txt", "hello");
    let h1 = hash_file(&file);

    let mut monitor = started(&tree, &[&tree.root()]);
    tree.append("a.txt", " world");
    let h2 = hash_file(&file);

    let report = monitor.poll_once().unwrap();
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].fingerprint, h2);

    tree.remove("a.txt");
    let report = monitor.poll_once().unwrap();
    assert_eq!(classified(&report), vec![("a.txt".into(), EntryKind::File, Classification::Deleted)]);
    assert_eq!(report.changes[0].fingerprint, h2);

    monitor.stop().unwrap();
    let history = monitor.file_history(&file, 10).unwrap();
    let fingerprints: Vec<_> = history
        .iter()
        .map(|event| (event.classification, event.previous_fingerprint.clone()))
        .collect();
    assert_eq!(
        fingerprints,
        vec![
            (Classification::Deleted, h2.clone()),
            (Classification::Modified, h1.clone()),
        ]
    );
}

#[test]
fn test_net_zero_edit_between_polls_is_quiet() {
    let tree = TestTree::new();
    tree.write("settings.json", "{\"debug\": false}");
    let monitor = started(&tree, &[&tree.root()]);

    tree.write("settings.json", "{\"debug\": true}");
    tree.write("settings.json", "{\"debug\": false}");
    assert!(monitor.poll_once().unwrap().is_quiet());
}

#[test]
fn test_reverted_edit_returns_entry_to_baseline() {
    let tree = TestTree::new();
    let file = tree.write("settings.json", "{\"debug\": false}");
    let mut monitor = started(&tree, &[&tree.root()]);
    let root = normalize(&tree.root());

    tree.write("settings.json", "{\"debug\": true}");
    assert_eq!(monitor.poll_once().unwrap().changes.len(), 1);

    tree.write("settings.json", "{\"debug\": false}");
    let report = monitor.poll_once().unwrap();
    assert!(report.changes.is_empty());
    assert_eq!(report.collapsed.len(), 1);

    let entry = monitor.store().entry(&root, &normalize(&file)).unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Current);
    assert_eq!(entry.fingerprint, hash_file(&file));

    monitor.stop().unwrap();
    assert_eq!(monitor.file_history(&file, 10).unwrap().len(), 1);
    let log = &monitor.view_logs(Some(&tree.root())).unwrap()[0].1;
    assert!(log.contains("(back to baseline state)"));
}

#[test]
fn test_nested_addition_and_kind_swap() {
    let tree = TestTree::new();
    tree.write("x", "plain file");
    let monitor = started(&tree, &[&tree.root()]);

    tree.write("sub/b.txt", "b");
    assert_eq!(
        classified(&monitor.poll_once().unwrap()),
        vec![
            ("b.txt".into(), EntryKind::File, Classification::Added),
            ("sub".into(), EntryKind::Folder, Classification::Added),
        ]
    );

    tree.remove("x");
    tree.write("x/inner.txt", "now a folder");
    assert_eq!(
        classified(&monitor.poll_once().unwrap()),
        vec![
            ("inner.txt".into(), EntryKind::File, Classification::Added),
            ("x".into(), EntryKind::File, Classification::Deleted),
            ("x".into(), EntryKind::Folder, Classification::Added),
        ]
    );
}

#[test]
fn test_directories_are_isolated_from_each_other() {
    let tree = TestTree::new();
    tree.write("a.txt", "a");
    let other = tree.sibling("other");
    std::fs::write(other.join("b.txt"), "b").unwrap();
    std::fs::create_dir_all(other.join("logs")).unwrap();
    std::fs::write(other.join("logs/app.log"), "line").unwrap();

    let mut config = MonitorConfig::with_data_dir(tree.state_dir());
    config.mode = MonitorMode::Poll;
    config.poll_interval_secs = 3600;
    config.backup_on_start = false;
    let mut monitor = Monitor::open(config).unwrap();
    monitor
        .start(&[tree.root(), other.clone()], &[other.join("logs")])
        .unwrap();

    // Churn in the excluded folder is invisible
    std::fs::write(other.join("logs/app.log"), "line\nline").unwrap();
    assert!(monitor.poll_once().unwrap().is_quiet());

    let other_baseline = &monitor.view_baseline(Some(&other)).unwrap()[0].entries;
    assert_eq!(other_baseline.len(), 1);

    // Forgetting one directory leaves the other intact
    assert_eq!(monitor.unmonitor(&other).unwrap(), 1);
    let remaining: Vec<_> = monitor
        .view_baseline(None)
        .unwrap()
        .into_iter()
        .map(|b| (b.directory, b.entries.len()))
        .collect();
    assert_eq!(remaining, vec![(normalize(&tree.root()), 1)]);

    tree.write("a.txt", "changed");
    std::fs::write(other.join("b.txt"), "changed").unwrap();
    let report = monitor.poll_once().unwrap();
    assert_eq!(classified(&report), vec![("a.txt".into(), EntryKind::File, Classification::Modified)]);
    monitor.stop().unwrap();
}
