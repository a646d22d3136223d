//! Schema migrations, tracked with `PRAGMA user_version`.

use rusqlite::Connection;

use crate::Result;

/// V001: directories, per-entry metadata with status tags, change history.
const V001_INITIAL: &str = r#"
CREATE TABLE IF NOT EXISTS directories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS file_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    directory_id INTEGER NOT NULL REFERENCES directories(id) ON DELETE CASCADE,
    item_path TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('file', 'folder')),
    fingerprint TEXT,
    size INTEGER,
    last_modified TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('current', 'added', 'modified', 'deleted')),
    detected_at TEXT NOT NULL,
    UNIQUE (directory_id, item_path)
);

CREATE INDEX IF NOT EXISTS idx_file_metadata_status ON file_metadata(status);
CREATE INDEX IF NOT EXISTS idx_file_metadata_item_path ON file_metadata(item_path);

-- Append-only record of flushed change records.
CREATE TABLE IF NOT EXISTS change_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    directory_id INTEGER NOT NULL REFERENCES directories(id) ON DELETE CASCADE,
    item_path TEXT NOT NULL,
    kind TEXT NOT NULL,
    classification TEXT NOT NULL,
    fingerprint TEXT,
    previous_fingerprint TEXT,
    previous_path TEXT,
    last_modified TEXT NOT NULL,
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_change_history_item_path ON change_history(item_path);
CREATE INDEX IF NOT EXISTS idx_change_history_detected_at ON change_history(detected_at);
"#;

const MIGRATIONS: &[&str] = &[V001_INITIAL];

/// Apply every migration newer than the database's recorded version.
pub fn migrate(conn: &Connection) -> Result<()> {
    let current: usize = conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))? as usize;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = index + 1;
        conn.execute_batch(sql)?;
        conn.execute_batch(&format!("PRAGMA user_version = {version}"))?;
        tracing::debug!(version, "Applied schema migration");
    }
    Ok(())
}

/// Connection settings for the writer.
pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// Connection settings for pooled readers.
pub fn apply_read_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA query_only = ON;",
    )?;
    Ok(())
}
