//! SQLite persistence: one serialized writer plus a bounded read pool.

mod pool;
mod queries;
mod schema;

pub use pool::{PooledConnection, ReadPool};

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use backoff::ExponentialBackoff;
use fim_fs::{Entry, NormalizedPath};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::store::{Baseline, BaselineEntry, BaselineStore, BaselineTx, DirectoryId, FileEvent, HistoryEvent};
use crate::{Error, Result};

/// Longest time spent retrying a busy database before giving up.
const MAX_BUSY_RETRY: Duration = Duration::from_secs(2);

/// SQLite-backed [`BaselineStore`].
///
/// Writes are serialized through a single connection guarded by a mutex and
/// run in `BEGIN IMMEDIATE` transactions. Reads use pooled read-only
/// connections, so readers never wait for the write lock.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    /// `None` for in-memory databases, whose readers cannot share the writer's data
    readers: Option<ReadPool>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file, apply pragmas and migrations.
    pub fn open(path: &Path, read_pool_size: usize) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let writer = Connection::open(path)?;
        schema::apply_pragmas(&writer)?;
        schema::migrate(&writer)?;
        tracing::debug!(path = %path.display(), read_pool_size, "Opened baseline store");

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Some(ReadPool::new(path, read_pool_size)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        schema::apply_pragmas(&writer)?;
        schema::migrate(&writer)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: None,
            path: None,
        })
    }

    /// Database file path (None for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn read_pool(&self) -> Option<&ReadPool> {
        self.readers.as_ref()
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| Error::store("write lock poisoned"))
    }

    fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        match &self.readers {
            Some(pool) => {
                let conn = pool.checkout()?;
                f(&conn)
            }
            None => {
                let conn = self.lock_writer()?;
                f(&conn)
            }
        }
    }
}

/// Start a `BEGIN IMMEDIATE` transaction, retrying while another process
/// holds the database lock.
fn begin_immediate(conn: &Connection) -> Result<Transaction<'_>> {
    let policy = ExponentialBackoff {
        max_elapsed_time: Some(MAX_BUSY_RETRY),
        ..ExponentialBackoff::default()
    };
    backoff::retry(policy, || {
        Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(|e| {
            let error = Error::from(e);
            if error.is_busy() {
                tracing::debug!("Database busy, retrying transaction start");
                backoff::Error::transient(error)
            } else {
                backoff::Error::permanent(error)
            }
        })
    })
    .map_err(|e| match e {
        backoff::Error::Permanent(error) => error,
        backoff::Error::Transient { err, .. } => err,
    })
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl SqliteTx<'_> {
    fn existing(&self, directory: &NormalizedPath) -> Result<Option<DirectoryId>> {
        queries::directory_id(self.conn, directory)
    }
}

impl BaselineTx for SqliteTx<'_> {
    fn get_or_create_directory(&self, directory: &NormalizedPath) -> Result<DirectoryId> {
        queries::get_or_create_directory(self.conn, directory)
    }

    fn has_directory(&self, directory: &NormalizedPath) -> Result<bool> {
        Ok(self.existing(directory)?.is_some())
    }

    fn record_file_event(&self, event: &FileEvent) -> Result<()> {
        let directory = queries::get_or_create_directory(self.conn, &event.directory)?;
        queries::upsert_entry(self.conn, directory, event)
    }

    fn get_current_baseline(&self, directory: &NormalizedPath) -> Result<Baseline> {
        match self.existing(directory)? {
            Some(id) => queries::live_entries(self.conn, id),
            None => Ok(Baseline::new()),
        }
    }

    fn entry(&self, directory: &NormalizedPath, path: &NormalizedPath) -> Result<Option<BaselineEntry>> {
        match self.existing(directory)? {
            Some(id) => queries::live_entry(self.conn, id, path),
            None => Ok(None),
        }
    }

    fn live_descendants(&self, directory: &NormalizedPath, folder: &NormalizedPath) -> Result<Vec<BaselineEntry>> {
        match self.existing(directory)? {
            Some(id) => queries::live_descendants(self.conn, id, folder),
            None => Ok(Vec::new()),
        }
    }

    fn delete_directory_records(&self, directory: &NormalizedPath) -> Result<usize> {
        match self.existing(directory)? {
            Some(id) => queries::delete_directory(self.conn, id),
            None => Ok(0),
        }
    }

    fn replace_baseline(&self, directory: &NormalizedPath, entries: &[Entry]) -> Result<usize> {
        let id = queries::get_or_create_directory(self.conn, directory)?;
        queries::replace_entries(self.conn, id, directory, entries)
    }

    fn promote_to_current(&self, directory: &NormalizedPath) -> Result<usize> {
        match self.existing(directory)? {
            Some(id) => queries::promote(self.conn, id),
            None => Ok(0),
        }
    }

    fn append_history(&self, events: &[HistoryEvent]) -> Result<()> {
        for event in events {
            let id = queries::get_or_create_directory(self.conn, &event.directory)?;
            queries::insert_history(self.conn, id, event)?;
        }
        Ok(())
    }
}

impl BaselineStore for SqliteStore {
    fn transaction(&self, work: &mut dyn FnMut(&dyn BaselineTx) -> Result<()>) -> Result<()> {
        let conn = self.lock_writer()?;
        let tx = begin_immediate(&conn)?;
        // Dropping `tx` on the error path rolls back
        work(&SqliteTx { conn: &tx })?;
        tx.commit()?;
        Ok(())
    }

    fn get_current_baseline(&self, directory: &NormalizedPath) -> Result<Baseline> {
        self.with_reader(|conn| match queries::directory_id(conn, directory)? {
            Some(id) => queries::live_entries(conn, id),
            None => Ok(Baseline::new()),
        })
    }

    fn entry(&self, directory: &NormalizedPath, path: &NormalizedPath) -> Result<Option<BaselineEntry>> {
        self.with_reader(|conn| match queries::directory_id(conn, directory)? {
            Some(id) => queries::live_entry(conn, id, path),
            None => Ok(None),
        })
    }

    fn has_baseline(&self, directory: &NormalizedPath) -> Result<bool> {
        self.with_reader(|conn| Ok(queries::directory_id(conn, directory)?.is_some()))
    }

    fn monitored_directories(&self) -> Result<Vec<NormalizedPath>> {
        self.with_reader(queries::monitored_directories)
    }

    fn file_history(&self, path: &NormalizedPath, limit: usize) -> Result<Vec<HistoryEvent>> {
        self.with_reader(|conn| queries::file_history(conn, path, limit))
    }

    fn recent_changes(&self, since: &str) -> Result<Vec<HistoryEvent>> {
        self.with_reader(|conn| queries::recent_changes(conn, since))
    }

    fn release(&self) -> Result<()> {
        if let Some(pool) = &self.readers {
            let closed = pool.release()?;
            tracing::debug!(closed, "Released idle read connections");
        }
        if self.path.is_some() {
            let conn = self.lock_writer()?;
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        }
        Ok(())
    }
}
