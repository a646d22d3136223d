//! In-memory change ledger
//!
//! The ledger holds every classified change of a monitoring session in three
//! maps (`added`, `modified`, `deleted`) keyed by `(path, kind)`. A key lives
//! in at most one map at a time. The ledger decides whether a fresh
//! classification is new information, a duplicate of what is already
//! recorded, or cancels out an earlier change.
//!
//! Entries are *pending* until [`ChangeLedger::drain`] hands them out, and
//! *reported* afterwards. Reported entries stay in the ledger so the same
//! drift is not reported again on the next cycle.

mod record;

pub use record::{ChangeRecord, Classification};

use std::collections::HashMap;

use fim_fs::{EntryKind, Fingerprint, NormalizedPath};

/// Ledger key: identity of an entry
pub type LedgerKey = (NormalizedPath, EntryKind);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    record: ChangeRecord,
    reported: bool,
    /// A deletion of an entry the baseline never accepted
    unaccepted: bool,
}

impl Slot {
    fn pending(record: ChangeRecord) -> Self {
        Self {
            record,
            reported: false,
            unaccepted: false,
        }
    }

    /// Fingerprint the accepted baseline holds for this entry.
    fn baseline_fingerprint(&self) -> Option<Fingerprint> {
        self.record
            .previous_fingerprint
            .clone()
            .or_else(|| self.record.fingerprint.clone())
    }
}

/// Result of offering a classification to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// New information. Carries the effective record, whose classification
    /// may differ from the one offered (e.g. a modified addition stays Added).
    Recorded(ChangeRecord),
    /// Identical to what the ledger already holds
    Duplicate,
    /// Cancelled out an earlier change; the entry is back to its baseline
    /// state, or never existed from the baseline's point of view
    Collapsed(ChangeRecord),
}

/// Saved state of one key, used to undo a change whose persistence failed.
#[derive(Debug, Clone)]
pub struct SavedSlot {
    key: LedgerKey,
    added: Option<Slot>,
    modified: Option<Slot>,
    deleted: Option<Slot>,
}

/// Three-way classification store with de-duplication.
#[derive(Debug, Default)]
pub struct ChangeLedger {
    added: HashMap<LedgerKey, Slot>,
    modified: HashMap<LedgerKey, Slot>,
    deleted: HashMap<LedgerKey, Slot>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a classification for an entry.
    pub fn record(&mut self, record: ChangeRecord) -> LedgerOutcome {
        let key = record.key();
        match record.classification {
            Classification::Added | Classification::Renamed => self.record_added(key, record),
            Classification::Modified => self.record_modified(key, record),
            Classification::Deleted => self.record_deleted(key, record),
        }
    }

    fn record_added(&mut self, key: LedgerKey, record: ChangeRecord) -> LedgerOutcome {
        if let Some(slot) = self.added.get(&key)
            && slot.record.fingerprint == record.fingerprint
            && slot.record.classification == record.classification
        {
            return LedgerOutcome::Duplicate;
        }

        if let Some(deleted) = self.deleted.remove(&key)
            && !deleted.unaccepted
        {
            let original = deleted.baseline_fingerprint();
            if original == record.fingerprint {
                return LedgerOutcome::Collapsed(record);
            }
            // Back with different content: relative to the baseline, a modification
            let modified = ChangeRecord {
                classification: Classification::Modified,
                previous_fingerprint: original,
                previous_path: None,
                ..record
            };
            self.modified.insert(key, Slot::pending(modified.clone()));
            return LedgerOutcome::Recorded(modified);
        }

        self.modified.remove(&key);
        self.added.insert(key, Slot::pending(record.clone()));
        LedgerOutcome::Recorded(record)
    }

    fn record_modified(&mut self, key: LedgerKey, record: ChangeRecord) -> LedgerOutcome {
        if let Some(slot) = self.added.get_mut(&key) {
            if slot.record.fingerprint == record.fingerprint {
                return LedgerOutcome::Duplicate;
            }
            // Still an addition from the baseline's point of view
            slot.record.fingerprint = record.fingerprint;
            slot.record.size = record.size;
            slot.record.last_modified = record.last_modified;
            slot.reported = false;
            return LedgerOutcome::Recorded(slot.record.clone());
        }

        if let Some(slot) = self.modified.get(&key) {
            if slot.record.fingerprint == record.fingerprint {
                return LedgerOutcome::Duplicate;
            }
            let original = slot.record.previous_fingerprint.clone();
            if original.is_some() && original == record.fingerprint {
                self.modified.remove(&key);
                return LedgerOutcome::Collapsed(record);
            }
            let updated = ChangeRecord {
                previous_fingerprint: original,
                ..record
            };
            self.modified.insert(key, Slot::pending(updated.clone()));
            return LedgerOutcome::Recorded(updated);
        }

        if let Some(deleted) = self.deleted.remove(&key)
            && deleted.unaccepted
        {
            let added = ChangeRecord {
                classification: Classification::Added,
                previous_fingerprint: None,
                ..record
            };
            self.added.insert(key, Slot::pending(added.clone()));
            return LedgerOutcome::Recorded(added);
        }
        self.modified.insert(key, Slot::pending(record.clone()));
        LedgerOutcome::Recorded(record)
    }

    fn record_deleted(&mut self, key: LedgerKey, record: ChangeRecord) -> LedgerOutcome {
        if self.deleted.contains_key(&key) {
            return LedgerOutcome::Duplicate;
        }

        if let Some(added) = self.added.remove(&key) {
            if !added.reported {
                return LedgerOutcome::Collapsed(record);
            }
            // A reappearance must be reported as an addition again
            let record = ChangeRecord {
                previous_fingerprint: None,
                ..record
            };
            self.deleted.insert(
                key,
                Slot {
                    unaccepted: true,
                    ..Slot::pending(record.clone())
                },
            );
            return LedgerOutcome::Recorded(record);
        }

        let record = match self.modified.remove(&key) {
            Some(modified) => ChangeRecord {
                previous_fingerprint: modified.record.previous_fingerprint,
                ..record
            },
            None => record,
        };
        self.deleted.insert(key, Slot::pending(record.clone()));
        LedgerOutcome::Recorded(record)
    }

    /// Forget an entry entirely.
    pub fn clear(&mut self, key: &LedgerKey) -> Option<ChangeRecord> {
        self.added
            .remove(key)
            .or_else(|| self.modified.remove(key))
            .or_else(|| self.deleted.remove(key))
            .map(|slot| slot.record)
    }

    /// Forget every entry of one monitored directory. Returns how many were removed.
    pub fn clear_directory(&mut self, directory: &NormalizedPath) -> usize {
        let before = self.len();
        for map in [&mut self.added, &mut self.modified, &mut self.deleted] {
            map.retain(|_, slot| &slot.record.directory != directory);
        }
        before - self.len()
    }

    /// Hand out every pending record and mark it reported.
    pub fn drain(&mut self) -> Vec<ChangeRecord> {
        self.drain_where(|_| true)
    }

    /// Like [`drain`](Self::drain), limited to one monitored directory.
    pub fn drain_directory(&mut self, directory: &NormalizedPath) -> Vec<ChangeRecord> {
        self.drain_where(|record| &record.directory == directory)
    }

    fn drain_where(&mut self, filter: impl Fn(&ChangeRecord) -> bool) -> Vec<ChangeRecord> {
        let mut drained = Vec::new();
        for map in [&mut self.added, &mut self.modified, &mut self.deleted] {
            for slot in map.values_mut() {
                if !slot.reported && filter(&slot.record) {
                    slot.reported = true;
                    drained.push(slot.record.clone());
                }
            }
        }
        drained.sort_by(|a, b| {
            (&a.path, a.classification).cmp(&(&b.path, b.classification))
        });
        drained
    }

    /// Capture the state of one key before a change is applied.
    pub fn save(&self, key: &LedgerKey) -> SavedSlot {
        SavedSlot {
            key: key.clone(),
            added: self.added.get(key).cloned(),
            modified: self.modified.get(key).cloned(),
            deleted: self.deleted.get(key).cloned(),
        }
    }

    /// Put a key back exactly as it was when saved.
    pub fn restore(&mut self, saved: SavedSlot) {
        let SavedSlot {
            key,
            added,
            modified,
            deleted,
        } = saved;
        for (map, slot) in [
            (&mut self.added, added),
            (&mut self.modified, modified),
            (&mut self.deleted, deleted),
        ] {
            match slot {
                Some(slot) => {
                    map.insert(key.clone(), slot);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&ChangeRecord> {
        self.added
            .get(key)
            .or_else(|| self.modified.get(key))
            .or_else(|| self.deleted.get(key))
            .map(|slot| &slot.record)
    }

    pub fn contains(&self, key: &LedgerKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of records not yet drained.
    pub fn pending(&self) -> usize {
        [&self.added, &self.modified, &self.deleted]
            .iter()
            .map(|map| map.values().filter(|slot| !slot.reported).count())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fp(n: u8) -> Option<Fingerprint> {
        Fingerprint::parse(&format!("sha256:{}", format!("{n:02x}").repeat(32)))
    }

    fn change(path: &str, classification: Classification, fingerprint: Option<Fingerprint>) -> ChangeRecord {
        ChangeRecord {
            directory: NormalizedPath::new("/data"),
            path: NormalizedPath::new(path),
            kind: EntryKind::File,
            fingerprint,
            previous_fingerprint: None,
            previous_path: None,
            size: None,
            last_modified: "2024-01-01 00:00:00".to_string(),
            classification,
        }
    }

    fn modified(path: &str, from: u8, to: u8) -> ChangeRecord {
        ChangeRecord {
            previous_fingerprint: fp(from),
            ..change(path, Classification::Modified, fp(to))
        }
    }

    #[test]
    fn repeated_modification_is_a_duplicate() {
        let mut ledger = ChangeLedger::new();
        assert!(matches!(ledger.record(modified("/data/a.txt", 1, 2)), LedgerOutcome::Recorded(_)));
        assert_eq!(ledger.record(modified("/data/a.txt", 1, 2)), LedgerOutcome::Duplicate);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn further_modification_keeps_original_fingerprint() {
        let mut ledger = ChangeLedger::new();
        ledger.record(modified("/data/a.txt", 1, 2));
        match ledger.record(modified("/data/a.txt", 2, 3)) {
            LedgerOutcome::Recorded(record) => {
                assert_eq!(record.previous_fingerprint, fp(1));
                assert_eq!(record.fingerprint, fp(3));
            }
            other => panic!("expected Recorded, got {:?}", other),
        }
    }

    #[test]
    fn reverting_content_collapses_modification() {
        let mut ledger = ChangeLedger::new();
        ledger.record(modified("/data/a.txt", 1, 2));
        let outcome = ledger.record(modified("/data/a.txt", 2, 1));
        assert!(matches!(outcome, LedgerOutcome::Collapsed(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn pending_addition_then_deletion_leaves_nothing() {
        let mut ledger = ChangeLedger::new();
        ledger.record(change("/data/tmp.txt", Classification::Added, fp(1)));
        let outcome = ledger.record(change("/data/tmp.txt", Classification::Deleted, fp(1)));
        assert!(matches!(outcome, LedgerOutcome::Collapsed(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn reported_addition_then_deletion_is_reported() {
        let mut ledger = ChangeLedger::new();
        ledger.record(change("/data/tmp.txt", Classification::Added, fp(1)));
        assert_eq!(ledger.drain().len(), 1);

        let outcome = ledger.record(change("/data/tmp.txt", Classification::Deleted, fp(1)));
        assert!(matches!(outcome, LedgerOutcome::Recorded(ref r) if r.classification == Classification::Deleted));
        assert_eq!(ledger.drain().len(), 1);
    }

    #[test]
    fn modified_addition_stays_added() {
        let mut ledger = ChangeLedger::new();
        ledger.record(change("/data/new.txt", Classification::Added, fp(1)));
        match ledger.record(change("/data/new.txt", Classification::Modified, fp(2))) {
            LedgerOutcome::Recorded(record) => {
                assert_eq!(record.classification, Classification::Added);
                assert_eq!(record.fingerprint, fp(2));
            }
            other => panic!("expected Recorded, got {:?}", other),
        }
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn deletion_then_restore_collapses() {
        let mut ledger = ChangeLedger::new();
        ledger.record(change("/data/a.txt", Classification::Deleted, fp(1)));
        let outcome = ledger.record(change("/data/a.txt", Classification::Added, fp(1)));
        assert!(matches!(outcome, LedgerOutcome::Collapsed(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn reported_addition_deleted_then_restored_is_added_again() {
        let mut ledger = ChangeLedger::new();
        ledger.record(change("/data/dropped.bin", Classification::Added, fp(1)));
        ledger.drain();
        ledger.record(change("/data/dropped.bin", Classification::Deleted, fp(1)));
        ledger.drain();

        match ledger.record(change("/data/dropped.bin", Classification::Added, fp(1))) {
            LedgerOutcome::Recorded(record) => {
                assert_eq!(record.classification, Classification::Added);
                assert_eq!(record.previous_fingerprint, None);
            }
            other => panic!("expected Recorded, got {:?}", other),
        }
        assert_eq!(ledger.pending(), 1);
        assert_eq!(
            ledger.record(change("/data/dropped.bin", Classification::Added, fp(1))),
            LedgerOutcome::Duplicate
        );
    }

    #[test]
    fn modified_then_deleted_restores_only_to_baseline_content() {
        let mut ledger = ChangeLedger::new();
        ledger.record(modified("/data/a.txt", 1, 2));
        ledger.record(ChangeRecord {
            previous_fingerprint: fp(2),
            ..change("/data/a.txt", Classification::Deleted, fp(2))
        });

        match ledger.record(change("/data/a.txt", Classification::Added, fp(2))) {
            LedgerOutcome::Recorded(record) => {
                assert_eq!(record.classification, Classification::Modified);
                assert_eq!(record.previous_fingerprint, fp(1));
            }
            other => panic!("expected Recorded, got {:?}", other),
        }
    }

    #[test]
    fn deletion_then_different_content_is_modification() {
        let mut ledger = ChangeLedger::new();
        ledger.record(change("/data/a.txt", Classification::Deleted, fp(1)));
        match ledger.record(change("/data/a.txt", Classification::Added, fp(2))) {
            LedgerOutcome::Recorded(record) => {
                assert_eq!(record.classification, Classification::Modified);
                assert_eq!(record.previous_fingerprint, fp(1));
            }
            other => panic!("expected Recorded, got {:?}", other),
        }
    }

    #[test]
    fn kind_is_part_of_identity() {
        let mut ledger = ChangeLedger::new();
        ledger.record(change("/data/x", Classification::Deleted, fp(1)));
        let folder = ChangeRecord {
            kind: EntryKind::Folder,
            ..change("/data/x", Classification::Added, fp(2))
        };
        assert!(matches!(ledger.record(folder), LedgerOutcome::Recorded(_)));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn drain_marks_reported_but_keeps_deduplicating() {
        let mut ledger = ChangeLedger::new();
        ledger.record(modified("/data/a.txt", 1, 2));
        assert_eq!(ledger.pending(), 1);
        assert_eq!(ledger.drain().len(), 1);
        assert_eq!(ledger.pending(), 0);
        assert!(ledger.drain().is_empty());
        assert_eq!(ledger.record(modified("/data/a.txt", 1, 2)), LedgerOutcome::Duplicate);
    }

    #[test]
    fn drain_directory_leaves_other_directories_pending() {
        let mut ledger = ChangeLedger::new();
        ledger.record(modified("/data/a.txt", 1, 2));
        ledger.record(ChangeRecord {
            directory: NormalizedPath::new("/srv"),
            ..modified("/srv/b.txt", 1, 2)
        });
        let drained = ledger.drain_directory(&NormalizedPath::new("/srv"));
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].path, NormalizedPath::new("/srv/b.txt"));
        assert_eq!(ledger.pending(), 1);
    }

    #[test]
    fn restore_undoes_a_recorded_change() {
        let mut ledger = ChangeLedger::new();
        ledger.record(modified("/data/a.txt", 1, 2));
        let key = (NormalizedPath::new("/data/a.txt"), EntryKind::File);
        let saved = ledger.save(&key);

        ledger.record(change("/data/a.txt", Classification::Deleted, fp(2)));
        assert_eq!(ledger.get(&key).unwrap().classification, Classification::Deleted);

        ledger.restore(saved);
        assert_eq!(ledger.get(&key).unwrap().classification, Classification::Modified);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn clear_directory_removes_only_that_directory() {
        let mut ledger = ChangeLedger::new();
        ledger.record(modified("/data/a.txt", 1, 2));
        ledger.record(ChangeRecord {
            directory: NormalizedPath::new("/srv"),
            ..modified("/srv/b.txt", 1, 2)
        });
        assert_eq!(ledger.clear_directory(&NormalizedPath::new("/data")), 1);
        assert_eq!(ledger.len(), 1);
    }
}
