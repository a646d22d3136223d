//! Persisted baseline data model

use std::collections::BTreeMap;
use std::str::FromStr;

use fim_fs::{Entry, EntryKind, Fingerprint, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::ledger::{ChangeRecord, Classification};

/// Row identity of a monitored directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryId(pub i64);

/// Status tag of a persisted entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Matches the accepted baseline
    Current,
    Added,
    Modified,
    /// Kept for history; no longer part of the live baseline
    Deleted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Current => "current",
            EntryStatus::Added => "added",
            EntryStatus::Modified => "modified",
            EntryStatus::Deleted => "deleted",
        }
    }

    /// Status written for an entry after a classification was recorded.
    pub fn for_classification(classification: Classification) -> Self {
        match classification {
            Classification::Added | Classification::Renamed => EntryStatus::Added,
            Classification::Modified => EntryStatus::Modified,
            Classification::Deleted => EntryStatus::Deleted,
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(EntryStatus::Current),
            "added" => Ok(EntryStatus::Added),
            "modified" => Ok(EntryStatus::Modified),
            "deleted" => Ok(EntryStatus::Deleted),
            other => Err(format!("unknown entry status '{other}'")),
        }
    }
}

/// One persisted entry of a directory baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub path: NormalizedPath,
    pub kind: EntryKind,
    pub fingerprint: Option<Fingerprint>,
    pub size: Option<u64>,
    pub last_modified: String,
    pub status: EntryStatus,
    /// When the status was last written
    pub detected_at: String,
}

/// Live entries of one directory, keyed by path
pub type Baseline = BTreeMap<NormalizedPath, BaselineEntry>;

/// An upsert of one entry's state, keyed by `(directory, path)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub directory: NormalizedPath,
    pub path: NormalizedPath,
    pub kind: EntryKind,
    pub fingerprint: Option<Fingerprint>,
    pub size: Option<u64>,
    pub last_modified: String,
    pub status: EntryStatus,
}

impl FileEvent {
    pub fn from_entry(directory: &NormalizedPath, entry: &Entry, status: EntryStatus) -> Self {
        Self {
            directory: directory.clone(),
            path: entry.path.clone(),
            kind: entry.kind,
            fingerprint: entry.fingerprint.clone(),
            size: entry.size,
            last_modified: entry.last_modified.clone(),
            status,
        }
    }

    pub fn from_record(record: &ChangeRecord, status: EntryStatus) -> Self {
        Self {
            directory: record.directory.clone(),
            path: record.path.clone(),
            kind: record.kind,
            fingerprint: record.fingerprint.clone(),
            size: record.size,
            last_modified: record.last_modified.clone(),
            status,
        }
    }
}

/// A flushed change record as stored in the history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub directory: NormalizedPath,
    pub path: NormalizedPath,
    pub kind: EntryKind,
    pub classification: Classification,
    pub fingerprint: Option<Fingerprint>,
    pub previous_fingerprint: Option<Fingerprint>,
    pub previous_path: Option<NormalizedPath>,
    pub last_modified: String,
    pub detected_at: String,
}

impl HistoryEvent {
    pub fn from_record(record: &ChangeRecord, detected_at: &str) -> Self {
        Self {
            directory: record.directory.clone(),
            path: record.path.clone(),
            kind: record.kind,
            classification: record.classification,
            fingerprint: record.fingerprint.clone(),
            previous_fingerprint: record.previous_fingerprint.clone(),
            previous_path: record.previous_path.clone(),
            last_modified: record.last_modified.clone(),
            detected_at: detected_at.to_string(),
        }
    }
}
