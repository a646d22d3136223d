//! Reconciliation of observations against the persisted baseline
//!
//! The [`Reconciler`] compares either a full [`Snapshot`] (poll mode) or one
//! changed path and its subtree (watch mode) with the baseline, offers every
//! difference to the shared [`ChangeLedger`], and writes the outcome through
//! to the store:
//!
//! - `Recorded` writes the entry with the status of its classification
//! - `Collapsed` writes the entry back as `current` (or `deleted` when the
//!   change that collapsed it was a deletion)
//! - `Duplicate` writes nothing
//!
//! Every store write runs in a transaction with the ledger locked inside it.
//! If the transaction fails, the ledger slots it touched are restored so the
//! change is offered again on the next cycle or event. A transaction for a
//! directory whose records have been purged writes nothing.

mod diff;

pub use diff::{Diff, diff};

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fim_fs::{Entry, EntryKind, NormalizedPath, Scanner, Snapshot, timestamp};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::ledger::{ChangeLedger, ChangeRecord, Classification, LedgerOutcome, SavedSlot};
use crate::store::{Baseline, BaselineStore, BaselineTx, EntryStatus, FileEvent, transact};

/// A change that could not be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub path: NormalizedPath,
    pub reason: String,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// New information written to the store, as the ledger recorded it
    pub changes: Vec<ChangeRecord>,
    /// Changes that cancelled an earlier one
    pub collapsed: Vec<ChangeRecord>,
    /// Changes the ledger already held
    pub duplicates: usize,
    pub unmeasurable: Vec<NormalizedPath>,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    /// True when nothing was recorded, collapsed or failed.
    pub fn is_quiet(&self) -> bool {
        self.changes.is_empty() && self.collapsed.is_empty() && self.failures.is_empty()
    }

    pub fn merge(&mut self, other: ReconcileReport) {
        self.changes.extend(other.changes);
        self.collapsed.extend(other.collapsed);
        self.duplicates += other.duplicates;
        self.unmeasurable.extend(other.unmeasurable);
        self.failures.extend(other.failures);
    }

    fn absorb(&mut self, offered: ChangeRecord, outcome: LedgerOutcome) {
        match outcome {
            LedgerOutcome::Recorded(record) => self.changes.push(record),
            LedgerOutcome::Collapsed(_) => self.collapsed.push(offered),
            LedgerOutcome::Duplicate => self.duplicates += 1,
        }
    }
}

/// Diffs observations against the baseline and persists the result.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn BaselineStore>,
    ledger: Arc<Mutex<ChangeLedger>>,
    scanner: Scanner,
    detect_renames: bool,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("scanner", &self.scanner)
            .field("detect_renames", &self.detect_renames)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(store: Arc<dyn BaselineStore>, ledger: Arc<Mutex<ChangeLedger>>, scanner: Scanner) -> Self {
        Self {
            store,
            ledger,
            scanner,
            detect_renames: false,
        }
    }

    /// Pair deletions and additions with equal file fingerprints as renames.
    pub fn with_rename_detection(mut self, enabled: bool) -> Self {
        self.detect_renames = enabled;
        self
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    fn lock_ledger(&self) -> MutexGuard<'_, ChangeLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconcile a full scan of one monitored directory.
    ///
    /// Each change is persisted in its own transaction; a failed write is
    /// reported and the remaining changes still apply.
    pub fn reconcile_snapshot(&self, snapshot: &Snapshot) -> Result<ReconcileReport> {
        let directory = &snapshot.root;
        let mut baseline = self.store.get_current_baseline(directory)?;
        baseline.retain(|path, _| !self.scanner.exclusions().contains(path));

        let diff = diff(directory, &baseline, &snapshot.entries, self.detect_renames);
        let mut report = ReconcileReport {
            unmeasurable: diff.unmeasurable,
            ..ReconcileReport::default()
        };
        for path in &report.unmeasurable {
            tracing::warn!(directory = %directory, path = %path, "Entry is currently unmeasurable");
        }

        for change in diff.changes {
            let path = change.path.clone();
            match self.apply_all(directory, std::slice::from_ref(&change)) {
                Ok(outcomes) => {
                    for (offered, outcome) in outcomes {
                        report.absorb(offered, outcome);
                    }
                }
                Err(e) => {
                    tracing::error!(directory = %directory, path = %path, error = %e, "Failed to persist change");
                    report.failures.push(ReconcileFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            directory = %directory,
            changes = report.changes.len(),
            collapsed = report.collapsed.len(),
            duplicates = report.duplicates,
            "Snapshot reconciled"
        );
        Ok(report)
    }

    /// Reconcile one path, and its subtree when it is or was a folder.
    ///
    /// The measurement, the baseline read, the comparison and every
    /// resulting write happen in a single transaction. Events for a folder
    /// and for a path inside it are handled by different workers; holding
    /// the write lock while measuring means the last commit always carries
    /// the newest reading.
    pub fn reconcile_path(&self, directory: &NormalizedPath, path: &NormalizedPath) -> Result<ReconcileReport> {
        if path == directory || !path.is_within(directory) || self.scanner.exclusions().contains(path) {
            return Ok(ReconcileReport::default());
        }

        let mut unmeasurable = Vec::new();
        let outcomes = self.apply_diff(directory, path, &mut unmeasurable);

        let mut report = ReconcileReport {
            unmeasurable,
            ..ReconcileReport::default()
        };
        for path in &report.unmeasurable {
            tracing::warn!(directory = %directory, path = %path, "Entry is currently unmeasurable");
        }
        match outcomes {
            Ok(outcomes) => {
                for (offered, outcome) in outcomes {
                    report.absorb(offered, outcome);
                }
            }
            Err(e) => {
                tracing::error!(directory = %directory, path = %path, error = %e, "Failed to persist change");
                report.failures.push(ReconcileFailure {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(report)
    }

    fn apply_diff(
        &self,
        directory: &NormalizedPath,
        path: &NormalizedPath,
        unmeasurable: &mut Vec<NormalizedPath>,
    ) -> Result<Vec<(ChangeRecord, LedgerOutcome)>> {
        let mut saved = Vec::new();
        let result = transact(&*self.store, |tx| {
            if !tx.has_directory(directory)? {
                return Ok(Vec::new());
            }
            let observed = self.observe(path);
            let mut baseline = Baseline::new();
            if let Some(entry) = tx.entry(directory, path)? {
                baseline.insert(entry.path.clone(), entry);
            }
            for entry in tx.live_descendants(directory, path)? {
                baseline.insert(entry.path.clone(), entry);
            }

            let diff = diff(directory, &baseline, &observed, self.detect_renames);
            *unmeasurable = diff.unmeasurable;

            let mut ledger = self.lock_ledger();
            diff.changes
                .into_iter()
                .map(|change| apply_change(tx, &mut ledger, &mut saved, change))
                .collect()
        });
        if result.is_err() {
            self.restore(saved);
        }
        result
    }

    /// Apply already-classified changes in one transaction.
    fn apply_all(
        &self,
        directory: &NormalizedPath,
        changes: &[ChangeRecord],
    ) -> Result<Vec<(ChangeRecord, LedgerOutcome)>> {
        let mut saved = Vec::new();
        let result = transact(&*self.store, |tx| {
            if !tx.has_directory(directory)? {
                return Ok(Vec::new());
            }
            let mut ledger = self.lock_ledger();
            changes
                .iter()
                .cloned()
                .map(|change| apply_change(tx, &mut ledger, &mut saved, change))
                .collect()
        });
        if result.is_err() {
            self.restore(saved);
        }
        result
    }

    fn restore(&self, saved: Vec<SavedSlot>) {
        let mut ledger = self.lock_ledger();
        for slot in saved.into_iter().rev() {
            ledger.restore(slot);
        }
    }

    /// Measure `path` as it is now. A vanished path yields nothing; a folder
    /// yields itself plus its whole subtree.
    fn observe(&self, path: &NormalizedPath) -> BTreeMap<NormalizedPath, Entry> {
        let native = path.to_native();
        let mut observed = BTreeMap::new();

        let Ok(metadata) = fs::symlink_metadata(&native) else {
            return observed;
        };

        if metadata.is_dir() {
            match self.scanner.scan(&native) {
                Ok(snapshot) => {
                    observed = snapshot.entries;
                    let last_modified = metadata
                        .modified()
                        .map(timestamp::format_system_time)
                        .unwrap_or_else(|_| timestamp::now());
                    observed.insert(
                        path.clone(),
                        Entry {
                            path: path.clone(),
                            kind: EntryKind::Folder,
                            fingerprint: snapshot.root_fingerprint,
                            size: None,
                            last_modified,
                        },
                    );
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Folder could not be scanned");
                }
            }
        } else {
            let exclusions = self.scanner.exclusions();
            let include = |p: &std::path::Path| !exclusions.is_excluded(p);
            if let Some(entry) = Entry::observe(&native, &include) {
                observed.insert(entry.path.clone(), entry);
            }
        }
        observed
    }
}

/// Offer one change to the ledger and write the outcome through to the store.
fn apply_change(
    tx: &dyn BaselineTx,
    ledger: &mut ChangeLedger,
    saved: &mut Vec<SavedSlot>,
    change: ChangeRecord,
) -> Result<(ChangeRecord, LedgerOutcome)> {
    saved.push(ledger.save(&change.key()));
    if let Some(from) = &change.previous_path
        && change.classification == Classification::Renamed
    {
        let from_key = (from.clone(), change.kind);
        saved.push(ledger.save(&from_key));
        ledger.clear(&from_key);
    }

    let outcome = ledger.record(change.clone());
    match &outcome {
        LedgerOutcome::Recorded(record) => {
            if let (Classification::Renamed, Some(from)) = (record.classification, &record.previous_path) {
                tx.record_file_event(&FileEvent {
                    directory: record.directory.clone(),
                    path: from.clone(),
                    kind: record.kind,
                    fingerprint: record.previous_fingerprint.clone(),
                    size: record.size,
                    last_modified: record.last_modified.clone(),
                    status: EntryStatus::Deleted,
                })?;
            }
            tx.record_file_event(&FileEvent::from_record(
                record,
                EntryStatus::for_classification(record.classification),
            ))?;
        }
        LedgerOutcome::Collapsed(record) => {
            let status = match change.classification {
                Classification::Deleted => EntryStatus::Deleted,
                _ => EntryStatus::Current,
            };
            tx.record_file_event(&FileEvent::from_record(record, status))?;
        }
        LedgerOutcome::Duplicate => {}
    }
    Ok((change, outcome))
}
