//! State shared by every thread of one monitoring session

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use fim_fs::{NormalizedPath, timestamp};

use super::events::FsEvent;
use crate::ledger::ChangeLedger;
use crate::logging::{DirectoryLogger, LoggerRegistry};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::{BaselineStore, HistoryEvent, transact};

/// Canonical identity of a user-supplied path.
///
/// Existing paths are canonicalized. For a path that does not exist yet,
/// the parent is canonicalized and the name re-attached, so engine
/// locations created later still compare equal to scanned paths.
pub fn normalize(path: &Path) -> NormalizedPath {
    if let Ok(resolved) = NormalizedPath::resolve(path) {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            normalize(parent).join(&name.to_string_lossy())
        }
        _ => NormalizedPath::new(path),
    }
}

/// Everything a poll cycle or watch worker needs, owned by the session
/// instead of living in process-wide state.
pub(crate) struct SessionContext {
    pub owner: String,
    pub store: Arc<dyn BaselineStore>,
    pub ledger: Arc<Mutex<ChangeLedger>>,
    pub loggers: Arc<LoggerRegistry>,
    pub reconciler: Reconciler,
    directories: Mutex<Vec<NormalizedPath>>,
}

impl SessionContext {
    pub fn new(
        owner: String,
        store: Arc<dyn BaselineStore>,
        ledger: Arc<Mutex<ChangeLedger>>,
        loggers: Arc<LoggerRegistry>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            owner,
            store,
            ledger,
            loggers,
            reconciler,
            directories: Mutex::new(Vec::new()),
        }
    }

    pub fn directories(&self) -> Vec<NormalizedPath> {
        self.directories.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_monitored(&self, directory: &NormalizedPath) -> bool {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(directory)
    }

    /// Returns false if the directory was already monitored.
    pub fn add_directory(&self, directory: NormalizedPath) -> bool {
        let mut directories = self.directories.lock().unwrap_or_else(PoisonError::into_inner);
        if directories.contains(&directory) {
            return false;
        }
        directories.push(directory);
        true
    }

    pub fn remove_directory(&self, directory: &NormalizedPath) -> bool {
        let mut directories = self.directories.lock().unwrap_or_else(PoisonError::into_inner);
        let before = directories.len();
        directories.retain(|d| d != directory);
        directories.len() != before
    }

    pub fn logger(&self, directory: &NormalizedPath) -> Arc<DirectoryLogger> {
        self.loggers.get_or_create_logger(&self.owner, directory)
    }

    /// Log what a reconciliation did besides recording new changes, which
    /// are logged when flushed.
    pub fn report(&self, directory: &NormalizedPath, report: &ReconcileReport) {
        if report.collapsed.is_empty() && report.failures.is_empty() && report.unmeasurable.is_empty() {
            return;
        }
        let logger = self.logger(directory);
        for record in &report.collapsed {
            logger.info(&format!("{} (back to baseline state)", record.describe()));
        }
        for path in &report.unmeasurable {
            logger.warning(&format!("Unable to measure: {path}"));
        }
        for failure in &report.failures {
            logger.error(&format!("Failed to record change for {}: {}", failure.path, failure.reason));
        }
    }

    /// Drain pending ledger records into the change history and the
    /// directory logs. Returns the number of records flushed.
    ///
    /// The ledger lock is released before the store is written.
    pub fn flush(&self, directory: Option<&NormalizedPath>) -> usize {
        let drained = {
            let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            match directory {
                Some(directory) => ledger.drain_directory(directory),
                None => ledger.drain(),
            }
        };
        if drained.is_empty() {
            return 0;
        }

        // Records of a directory purged since they were drained are dropped
        let detected_at = timestamp::now();
        let written = transact(&*self.store, |tx| {
            let mut kept = Vec::with_capacity(drained.len());
            for record in &drained {
                if tx.has_directory(&record.directory)? {
                    kept.push(record);
                }
            }
            let history: Vec<HistoryEvent> = kept
                .iter()
                .map(|record| HistoryEvent::from_record(record, &detected_at))
                .collect();
            if !history.is_empty() {
                tx.append_history(&history)?;
            }
            Ok(kept)
        });
        let kept = match written {
            Ok(kept) => kept,
            Err(e) => {
                tracing::error!(error = %e, records = drained.len(), "Failed to append change history");
                drained.iter().collect()
            }
        };

        for record in &kept {
            self.logger(&record.directory).change(record);
        }
        kept.len()
    }

    /// One full scan and reconciliation of every monitored directory.
    pub fn poll_cycle(&self) -> ReconcileReport {
        let mut total = ReconcileReport::default();
        for directory in self.directories() {
            total.merge(self.poll_directory(&directory));
        }
        total
    }

    pub fn poll_directory(&self, directory: &NormalizedPath) -> ReconcileReport {
        let result = self
            .reconciler
            .scanner()
            .scan(&directory.to_native())
            .map_err(crate::Error::from)
            .and_then(|snapshot| self.reconciler.reconcile_snapshot(&snapshot));

        match result {
            Ok(report) => {
                self.report(directory, &report);
                self.flush(Some(directory));
                report
            }
            Err(e) => {
                tracing::error!(directory = %directory, error = %e, "Poll cycle failed");
                self.logger(directory).error(&format!("Scan failed: {e}"));
                ReconcileReport::default()
            }
        }
    }

    /// Reconcile the path of one filesystem event.
    pub fn handle_event(&self, event: &FsEvent) {
        if !self.is_monitored(&event.directory) {
            return;
        }
        tracing::trace!(directory = %event.directory, path = %event.path, kind = ?event.kind, "Filesystem event");

        match self.reconciler.reconcile_path(&event.directory, &event.path) {
            Ok(report) => {
                self.report(&event.directory, &report);
                if !report.changes.is_empty() {
                    self.flush(Some(&event.directory));
                }
            }
            Err(e) => {
                tracing::error!(directory = %event.directory, path = %event.path, error = %e, "Event handling failed");
            }
        }
    }
}
