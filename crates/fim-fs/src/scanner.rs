//! Directory scanning into snapshots

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::entry::{Entry, EntryKind, Snapshot};
use crate::fingerprint::{self, FolderDigest};
use crate::{Error, NormalizedPath, Result, timestamp};

/// Paths that are never scanned, hashed or reported.
///
/// Matching is by whole path component: excluding `/data/tmp` also excludes
/// everything below it, but not `/data/tmp2`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    paths: Vec<NormalizedPath>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<NormalizedPath>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.paths.iter().any(|excluded| path.is_within(excluded))
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        !self.paths.is_empty() && self.contains(&NormalizedPath::new(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<P: Into<NormalizedPath>> FromIterator<P> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// Walks a directory tree once and measures every entry in it.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    exclusions: ExclusionSet,
}

impl Scanner {
    pub fn new(exclusions: ExclusionSet) -> Self {
        Self { exclusions }
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Produce a snapshot of every file and folder below `root`.
    ///
    /// Symbolic links are recorded as files and never followed. Entries that
    /// vanish or cannot be read during the walk are kept with no fingerprint
    /// or skipped; only a missing or non-directory root is an error.
    ///
    /// Folder fingerprints are built bottom-up from the children already
    /// measured in this walk, so each file is read exactly once and every
    /// folder fingerprint equals `hash_folder_filtered` with the same
    /// exclusions.
    pub fn scan(&self, root: &Path) -> Result<Snapshot> {
        let metadata = fs::symlink_metadata(root).map_err(|e| Error::io(root, e))?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut snapshot = Snapshot {
            root: NormalizedPath::new(root),
            ..Snapshot::default()
        };
        let mut open: HashMap<PathBuf, FolderDigest> = HashMap::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|dirent| dirent.depth() == 0 || !self.exclusions.is_excluded(dirent.path()));

        for item in walker {
            let dirent = match item {
                Ok(dirent) => dirent,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable entry during scan");
                    continue;
                }
            };

            let path = dirent.path();
            let metadata = dirent.metadata().ok();
            let last_modified = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map(timestamp::format_system_time)
                .unwrap_or_else(timestamp::now);

            if dirent.file_type().is_dir() {
                let digest = open
                    .remove(path)
                    .unwrap_or_else(|| FolderDigest::new(dirent.file_name()));
                let folder_fingerprint = digest.finish();

                if dirent.depth() == 0 {
                    snapshot.root_fingerprint = Some(folder_fingerprint);
                    continue;
                }

                parent_digest(&mut open, path).child_folder(dirent.file_name(), &folder_fingerprint);
                let entry = Entry {
                    path: NormalizedPath::new(path),
                    kind: EntryKind::Folder,
                    fingerprint: Some(folder_fingerprint),
                    size: None,
                    last_modified,
                };
                snapshot.entries.insert(entry.path.clone(), entry);
            } else {
                let leaf_fingerprint = if dirent.path_is_symlink() {
                    fingerprint::hash_link(path)
                } else {
                    fingerprint::hash_file(path)
                };
                if leaf_fingerprint.is_none() {
                    tracing::warn!(path = %path.display(), "Entry is currently unmeasurable");
                }

                parent_digest(&mut open, path).child_file(dirent.file_name(), leaf_fingerprint.as_ref());
                let entry = Entry {
                    path: NormalizedPath::new(path),
                    kind: EntryKind::File,
                    fingerprint: leaf_fingerprint,
                    size: metadata.as_ref().map(|m| m.len()),
                    last_modified,
                };
                snapshot.entries.insert(entry.path.clone(), entry);
            }
        }

        tracing::debug!(root = %snapshot.root, entries = snapshot.len(), "Scan complete");
        Ok(snapshot)
    }
}

fn parent_digest<'a>(open: &'a mut HashMap<PathBuf, FolderDigest>, path: &Path) -> &'a mut FolderDigest {
    let parent = path.parent().unwrap_or(path).to_path_buf();
    open.entry(parent).or_insert_with_key(|parent| {
        let name = parent
            .file_name()
            .unwrap_or(parent.as_os_str())
            .to_os_string();
        FolderDigest::new(&name)
    })
}
