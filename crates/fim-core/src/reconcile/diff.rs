//! Pure comparison of an observation against a baseline

use std::collections::BTreeMap;

use fim_fs::{Entry, EntryKind, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::ledger::{ChangeRecord, Classification};
use crate::store::{Baseline, BaselineEntry};

/// Classified differences between a baseline and an observation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// Changes ordered by path, deletions before additions on the same path
    pub changes: Vec<ChangeRecord>,
    /// Paths that exist but could not be measured; never classified Modified
    pub unmeasurable: Vec<NormalizedPath>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn observed_change(directory: &NormalizedPath, entry: &Entry, classification: Classification) -> ChangeRecord {
    ChangeRecord {
        directory: directory.clone(),
        path: entry.path.clone(),
        kind: entry.kind,
        fingerprint: entry.fingerprint.clone(),
        previous_fingerprint: None,
        previous_path: None,
        size: entry.size,
        last_modified: entry.last_modified.clone(),
        classification,
    }
}

fn deletion(directory: &NormalizedPath, known: &BaselineEntry) -> ChangeRecord {
    ChangeRecord {
        directory: directory.clone(),
        path: known.path.clone(),
        kind: known.kind,
        fingerprint: known.fingerprint.clone(),
        previous_fingerprint: known.fingerprint.clone(),
        previous_path: None,
        size: known.size,
        last_modified: known.last_modified.clone(),
        classification: Classification::Deleted,
    }
}

/// Classify every difference between `baseline` and `observed`.
///
/// Identity is `(path, kind)`: a path whose kind changed yields a deletion
/// of the old kind and an addition of the new one. With `detect_renames`,
/// a deleted file and an added file with equal fingerprints become one
/// Renamed record. Because file fingerprints include the base name, only
/// moves between folders can match; the first candidate in path order wins.
pub fn diff(
    directory: &NormalizedPath,
    baseline: &Baseline,
    observed: &BTreeMap<NormalizedPath, Entry>,
    detect_renames: bool,
) -> Diff {
    let mut result = Diff::default();
    let mut added = Vec::new();
    let mut deleted = Vec::new();

    for (path, entry) in observed {
        let Some(known) = baseline.get(path) else {
            added.push(observed_change(directory, entry, Classification::Added));
            continue;
        };

        if known.kind != entry.kind {
            deleted.push(deletion(directory, known));
            added.push(observed_change(directory, entry, Classification::Added));
            continue;
        }

        if entry.fingerprint.is_none() {
            result.unmeasurable.push(path.clone());
            continue;
        }

        if entry.fingerprint != known.fingerprint {
            let mut change = observed_change(directory, entry, Classification::Modified);
            change.previous_fingerprint = known.fingerprint.clone();
            result.changes.push(change);
        }
    }

    for (path, known) in baseline {
        if !observed.contains_key(path) {
            deleted.push(deletion(directory, known));
        }
    }

    if detect_renames {
        deleted.retain(|gone| {
            if gone.kind != EntryKind::File || gone.fingerprint.is_none() {
                return true;
            }
            let candidate = added.iter().position(|new| {
                new.kind == EntryKind::File
                    && new.previous_path.is_none()
                    && new.fingerprint == gone.fingerprint
            });
            match candidate {
                Some(index) => {
                    let new = &mut added[index];
                    new.classification = Classification::Renamed;
                    new.previous_path = Some(gone.path.clone());
                    new.previous_fingerprint = gone.fingerprint.clone();
                    false
                }
                None => true,
            }
        });
    }

    result.changes.extend(deleted);
    result.changes.extend(added);
    result
        .changes
        .sort_by(|a, b| (&a.path, a.classification).cmp(&(&b.path, b.classification)));
    result
}
