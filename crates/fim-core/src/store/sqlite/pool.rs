//! ReadPool: bounded read-only connections with checkout/checkin.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags};

use super::schema::apply_read_pragmas;
use crate::config::MAX_READ_POOL_SIZE;
use crate::{Error, Result};

struct PoolState {
    idle: Vec<Connection>,
    /// Connections currently open, idle or checked out
    open: usize,
}

/// A pool of at most `max_size` read-only connections.
///
/// Connections are opened lazily. When every connection is checked out,
/// [`checkout`](Self::checkout) blocks until one is returned.
pub struct ReadPool {
    path: PathBuf,
    max_size: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ReadPool {
    pub fn new(path: &Path, max_size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            max_size: max_size.clamp(1, MAX_READ_POOL_SIZE),
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                open: 0,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| Error::store("read pool lock poisoned"))
    }

    fn open_reader(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
        )?;
        apply_read_pragmas(&conn)?;
        Ok(conn)
    }

    /// Borrow a connection until the returned guard is dropped.
    pub fn checkout(&self) -> Result<PooledConnection<'_>> {
        let mut state = self.lock()?;
        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            if state.open < self.max_size {
                state.open += 1;
                drop(state);
                return match self.open_reader() {
                    Ok(conn) => Ok(PooledConnection {
                        pool: self,
                        conn: Some(conn),
                    }),
                    Err(e) => {
                        if let Ok(mut state) = self.lock() {
                            state.open -= 1;
                        }
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }
            state = self
                .available
                .wait(state)
                .map_err(|_| Error::store("read pool lock poisoned"))?;
        }
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut state) = self.state.lock() {
            state.idle.push(conn);
        }
        self.available.notify_one();
    }

    /// Close every idle connection. Checked-out connections are unaffected.
    pub fn release(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let closed = state.idle.len();
        state.idle.clear();
        state.open -= closed;
        Ok(closed)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Connections currently open (idle or checked out).
    pub fn open_connections(&self) -> usize {
        self.state.lock().map(|s| s.open).unwrap_or(0)
    }
}

/// A checked-out read connection; returns to the pool on drop.
pub struct PooledConnection<'a> {
    pool: &'a ReadPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `drop` takes the connection out
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.checkin(conn);
        }
    }
}
