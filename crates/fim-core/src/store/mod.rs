//! Persistence gateway
//!
//! The engine talks to durable storage only through [`BaselineStore`]
//! (connection-level operations and read queries) and [`BaselineTx`] (the
//! operations available inside one unit of work). Every write happens in a
//! transaction that commits when the closure returns `Ok` and rolls back
//! otherwise.
//!
//! Lock ordering: a caller that also needs the change ledger acquires it
//! *inside* the transaction, never the other way round.

mod sqlite;
mod types;

pub use sqlite::{ReadPool, SqliteStore};
pub use types::{Baseline, BaselineEntry, DirectoryId, EntryStatus, FileEvent, HistoryEvent};

use fim_fs::{Entry, NormalizedPath};

use crate::{Error, Result};

/// Operations available inside one transaction.
pub trait BaselineTx {
    fn get_or_create_directory(&self, directory: &NormalizedPath) -> Result<DirectoryId>;

    /// Whether `directory` has a record, without creating one.
    fn has_directory(&self, directory: &NormalizedPath) -> Result<bool>;

    /// Idempotent upsert keyed by `(directory, path)`.
    fn record_file_event(&self, event: &FileEvent) -> Result<()>;

    /// Every entry of `directory` whose status is not `deleted`.
    fn get_current_baseline(&self, directory: &NormalizedPath) -> Result<Baseline>;

    /// One live entry, if present.
    fn entry(&self, directory: &NormalizedPath, path: &NormalizedPath) -> Result<Option<BaselineEntry>>;

    /// Live entries strictly below `folder`.
    fn live_descendants(&self, directory: &NormalizedPath, folder: &NormalizedPath) -> Result<Vec<BaselineEntry>>;

    /// Remove the directory and, by cascade, all of its entries and history.
    /// Returns the number of entries removed.
    fn delete_directory_records(&self, directory: &NormalizedPath) -> Result<usize>;

    /// Replace all entries of `directory` with `entries`, status `current`.
    /// History is left alone.
    fn replace_baseline(&self, directory: &NormalizedPath, entries: &[Entry]) -> Result<usize>;

    /// Accept drift: `added`/`modified` become `current`, `deleted` rows go away.
    fn promote_to_current(&self, directory: &NormalizedPath) -> Result<usize>;

    fn append_history(&self, events: &[HistoryEvent]) -> Result<()>;
}

/// Durable storage of monitored directories and their baselines.
///
/// Implementations must support concurrent callers.
pub trait BaselineStore: Send + Sync {
    /// Run `work` as one unit of work: commit on `Ok`, roll back on `Err`.
    fn transaction(&self, work: &mut dyn FnMut(&dyn BaselineTx) -> Result<()>) -> Result<()>;

    fn get_current_baseline(&self, directory: &NormalizedPath) -> Result<Baseline>;

    fn entry(&self, directory: &NormalizedPath, path: &NormalizedPath) -> Result<Option<BaselineEntry>>;

    /// Whether a baseline, possibly empty, has been recorded for `directory`.
    fn has_baseline(&self, directory: &NormalizedPath) -> Result<bool>;

    fn monitored_directories(&self) -> Result<Vec<NormalizedPath>>;

    /// Most recent history events for one path, newest first.
    fn file_history(&self, path: &NormalizedPath, limit: usize) -> Result<Vec<HistoryEvent>>;

    /// History events detected at or after `since`, newest first.
    fn recent_changes(&self, since: &str) -> Result<Vec<HistoryEvent>>;

    /// Drop idle connections and flush pending state to disk.
    fn release(&self) -> Result<()>;

    fn get_or_create_directory(&self, directory: &NormalizedPath) -> Result<DirectoryId> {
        transact(self, |tx| tx.get_or_create_directory(directory))
    }

    fn record_file_event(&self, event: &FileEvent) -> Result<()> {
        transact(self, |tx| tx.record_file_event(event))
    }

    fn delete_directory_records(&self, directory: &NormalizedPath) -> Result<usize> {
        transact(self, |tx| tx.delete_directory_records(directory))
    }

    fn replace_baseline(&self, directory: &NormalizedPath, entries: &[Entry]) -> Result<usize> {
        transact(self, |tx| tx.replace_baseline(directory, entries))
    }

    fn promote_to_current(&self, directory: &NormalizedPath) -> Result<usize> {
        transact(self, |tx| tx.promote_to_current(directory))
    }

    fn append_history(&self, events: &[HistoryEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        transact(self, |tx| tx.append_history(events))
    }
}

/// Run a value-returning closure inside [`BaselineStore::transaction`].
pub fn transact<S, T, F>(store: &S, work: F) -> Result<T>
where
    S: BaselineStore + ?Sized,
    F: FnOnce(&dyn BaselineTx) -> Result<T>,
{
    let mut work = Some(work);
    let mut output = None;
    store.transaction(&mut |tx| {
        let work = work
            .take()
            .ok_or_else(|| Error::store("transaction body invoked twice"))?;
        output = Some(work(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| Error::store("transaction finished without a result"))
}
