//! Scanner behavior over real directory trees

use assert_fs::prelude::*;
use fim_fs::{EntryKind, ExclusionSet, NormalizedPath, Scanner, hash_file};
use predicates::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_scan_twice_is_identical() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("a.txt").write_str("hello").unwrap();
    temp.child("sub/b.txt").write_str("b").unwrap();
    temp.child("sub/empty").create_dir_all().unwrap();

    let scanner = Scanner::default();
    let first = scanner.scan(temp.path()).unwrap();
    let second = scanner.scan(temp.path()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_appending_changes_only_the_file_and_its_ancestors() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("docs/a.txt").write_str("hello").unwrap();
    temp.child("other/c.txt").write_str("c").unwrap();

    let scanner = Scanner::default();
    let before = scanner.scan(temp.path()).unwrap();
    temp.child("docs/a.txt").write_str("hello world").unwrap();
    let after = scanner.scan(temp.path()).unwrap();

    let root = NormalizedPath::new(temp.path());
    let changed: Vec<_> = after
        .iter()
        .filter(|e| before.get(&e.path).map(|b| &b.fingerprint) != Some(&e.fingerprint))
        .map(|e| e.path.clone())
        .collect();

    assert_eq!(changed, vec![root.join("docs"), root.join("docs/a.txt")]);
    assert_ne!(before.root_fingerprint, after.root_fingerprint);
}

#[test]
fn test_file_entries_carry_file_fingerprints() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("a.txt");
    file.write_str("hello").unwrap();

    let snapshot = Scanner::default().scan(temp.path()).unwrap();
    let entry = snapshot.get(&NormalizedPath::new(file.path())).unwrap();

    assert_eq!(entry.kind, EntryKind::File);
    assert_eq!(entry.fingerprint, hash_file(file.path()));
    assert!(predicate::str::is_match(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$")
        .unwrap()
        .eval(&entry.last_modified));
}

#[test]
fn test_excluded_directory_is_not_scanned() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("keep.txt").write_str("k").unwrap();
    temp.child("cache/blob.bin").write_str("x").unwrap();

    let mut exclusions = ExclusionSet::new();
    exclusions.insert(temp.child("cache").path());
    let snapshot = Scanner::new(exclusions).scan(temp.path()).unwrap();

    let paths: Vec<_> = snapshot.iter().map(|e| e.path.as_str().to_string()).collect();
    assert_eq!(paths.len(), 1);
    assert!(predicate::str::ends_with("keep.txt").eval(&paths[0]));
}

#[test]
fn test_missing_root_is_an_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    let result = Scanner::default().scan(&temp.path().join("absent"));
    assert!(result.unwrap_err().is_not_found());
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_recorded_not_followed() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("real/data.txt").write_str("d").unwrap();
    std::os::unix::fs::symlink(temp.path(), temp.child("real/up").path()).unwrap();

    let snapshot = Scanner::default().scan(temp.path()).unwrap();
    let link = snapshot.get(&NormalizedPath::new(temp.child("real/up").path())).unwrap();

    assert_eq!(link.kind, EntryKind::File);
    assert!(link.fingerprint.is_some());
    assert_eq!(snapshot.len(), 3);
}
