//! [`TestTree`] builder for monitoring scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding a tree to monitor (`watched/`) and a
/// sibling directory for engine state (`state/`), so the engine's own
/// database and logs never appear inside the monitored tree.
///
/// # Example
///
/// ```rust,no_run
/// use fim_test_utils::TestTree;
///
/// let tree = TestTree::new();
/// tree.write("a.txt", "hello");
/// tree.mkdir("sub/empty");
/// tree.assert_exists("sub/empty");
/// ```
pub struct TestTree {
    temp_dir: TempDir,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create an empty monitored directory and state directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("watched")).unwrap();
        fs::create_dir_all(temp_dir.path().join("state")).unwrap();
        Self { temp_dir }
    }

    /// Root of the monitored tree.
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("watched")
    }

    /// Directory for the engine's database, logs and backups.
    pub fn state_dir(&self) -> PathBuf {
        self.temp_dir.path().join("state")
    }

    /// Absolute path of `relative` inside the monitored tree.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write `content` to `relative`, creating parent folders.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Append `content` to an existing file.
    pub fn append(&self, relative: &str, content: &str) {
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.path(relative))
            .unwrap_or_else(|e| panic!("TestTree::append: cannot open {relative}: {e}"));
        file.write_all(content.as_bytes()).unwrap();
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Remove a file or a whole folder.
    pub fn remove(&self, relative: &str) {
        let path = self.path(relative);
        if path.is_dir() {
            fs::remove_dir_all(&path).unwrap();
        } else {
            fs::remove_file(&path).unwrap();
        }
    }

    pub fn rename(&self, from: &str, to: &str) {
        let target = self.path(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::rename(self.path(from), target).unwrap();
    }

    /// Create another directory to monitor next to `watched/`.
    pub fn sibling(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Assert that `relative` exists in the monitored tree.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_exists(&self, relative: &str) {
        let full_path = self.path(relative);
        assert!(full_path.exists(), "Expected path to exist: {}", full_path.display());
    }

    /// Assert that `relative` does **not** exist in the monitored tree.
    pub fn assert_not_exists(&self, relative: &str) {
        let full_path = self.path(relative);
        assert!(!full_path.exists(), "Expected path NOT to exist: {}", full_path.display());
    }

    /// Assert that the file at `path` (absolute) contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(path: &Path, content: &str) {
        let file_content = fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", path.display()));
        assert!(
            file_content.contains(content),
            "Expected {} to contain {:?}, got:\n{}",
            path.display(),
            content,
            file_content
        );
    }
}
