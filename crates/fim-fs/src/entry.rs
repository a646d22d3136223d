//! Observed filesystem entries and directory snapshots

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fingerprint::{self, Fingerprint};
use crate::{NormalizedPath, timestamp};

/// Whether an entry is a leaf or a folder. Part of entry identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Folder => "folder",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(EntryKind::File),
            "folder" => Ok(EntryKind::Folder),
            other => Err(format!("unknown entry kind '{other}'")),
        }
    }
}

/// One filesystem object at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: NormalizedPath,
    pub kind: EntryKind,
    /// `None` when the object could not be measured.
    pub fingerprint: Option<Fingerprint>,
    /// Byte length, files only.
    pub size: Option<u64>,
    pub last_modified: String,
}

impl Entry {
    /// Measure a single path as it is right now.
    ///
    /// Returns `None` when the path no longer exists. Folders are hashed with
    /// `include` applied to their descendants.
    pub fn observe(path: &Path, include: &dyn Fn(&Path) -> bool) -> Option<Self> {
        let metadata = fs::symlink_metadata(path).ok()?;
        let last_modified = metadata
            .modified()
            .map(timestamp::format_system_time)
            .unwrap_or_else(|_| timestamp::now());

        let entry = if metadata.is_dir() {
            Self {
                path: NormalizedPath::new(path),
                kind: EntryKind::Folder,
                fingerprint: fingerprint::hash_folder_filtered(path, include),
                size: None,
                last_modified,
            }
        } else {
            Self {
                path: NormalizedPath::new(path),
                kind: EntryKind::File,
                fingerprint: fingerprint::hash_leaf(path),
                size: Some(metadata.len()),
                last_modified,
            }
        };
        Some(entry)
    }
}

/// Result of scanning one monitored directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub root: NormalizedPath,
    /// Fingerprint of the root folder itself, equal to `hash_folder(root)`
    /// with the same exclusions.
    pub root_fingerprint: Option<Fingerprint>,
    /// Every entry below the root, keyed by path. The root is not included.
    pub entries: BTreeMap<NormalizedPath, Entry>,
}

impl Snapshot {
    pub fn get(&self, path: &NormalizedPath) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }
}
