//! Change records produced by reconciliation

use std::str::FromStr;

use fim_fs::{EntryKind, Fingerprint, NormalizedPath};
use serde::{Deserialize, Serialize};

/// How an entry differs from its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    // Declaration order is the processing order for one path: a kind change
    // deletes the old entry before adding the new one.
    Deleted,
    Added,
    Modified,
    /// A deletion and an addition of identical content, paired up
    Renamed,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Added => "added",
            Classification::Modified => "modified",
            Classification::Deleted => "deleted",
            Classification::Renamed => "renamed",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(Classification::Added),
            "modified" => Ok(Classification::Modified),
            "deleted" => Ok(Classification::Deleted),
            "renamed" => Ok(Classification::Renamed),
            other => Err(format!("unknown classification '{other}'")),
        }
    }
}

/// One classified difference between an observation and the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Monitored directory the entry belongs to
    pub directory: NormalizedPath,
    pub path: NormalizedPath,
    pub kind: EntryKind,
    /// Observed fingerprint; for deletions, the last known fingerprint
    pub fingerprint: Option<Fingerprint>,
    /// Baseline fingerprint before this change, when there was one
    pub previous_fingerprint: Option<Fingerprint>,
    /// Source path of a rename
    pub previous_path: Option<NormalizedPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub last_modified: String,
    pub classification: Classification,
}

impl ChangeRecord {
    /// Ledger identity: path plus kind.
    pub fn key(&self) -> (NormalizedPath, EntryKind) {
        (self.path.clone(), self.kind)
    }

    /// Human-readable one-line description, used for directory logs.
    pub fn describe(&self) -> String {
        let noun = match self.kind {
            EntryKind::File => "File",
            EntryKind::Folder => "Folder",
        };
        match (&self.classification, &self.previous_path) {
            (Classification::Renamed, Some(from)) => {
                format!("{noun} renamed: {from} -> {}", self.path)
            }
            (classification, _) => format!("{noun} {classification}: {}", self.path),
        }
    }
}
