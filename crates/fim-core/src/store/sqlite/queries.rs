//! SQL for baselines and history. Every function works on a plain
//! `Connection`, so the same code serves the writer transaction and the
//! read pool.

use std::str::FromStr;

use fim_fs::{Entry, EntryKind, Fingerprint, NormalizedPath, timestamp};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::Result;
use crate::ledger::Classification;
use crate::store::{Baseline, BaselineEntry, DirectoryId, EntryStatus, FileEvent, HistoryEvent};

fn parse_column<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(index)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, e.into()))
}

fn fingerprint_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<Fingerprint>> {
    let raw: Option<String> = row.get(index)?;
    Ok(raw.and_then(|value| Fingerprint::parse(&value)))
}

fn size_to_sql(size: Option<u64>) -> Option<i64> {
    size.map(|s| i64::try_from(s).unwrap_or(i64::MAX))
}

const ENTRY_COLUMNS: &str = "item_path, kind, fingerprint, size, last_modified, status, detected_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<BaselineEntry> {
    let size: Option<i64> = row.get(3)?;
    Ok(BaselineEntry {
        path: NormalizedPath::new(row.get::<_, String>(0)?),
        kind: parse_column::<EntryKind>(row, 1)?,
        fingerprint: fingerprint_column(row, 2)?,
        size: size.map(|s| s.max(0) as u64),
        last_modified: row.get(4)?,
        status: parse_column::<EntryStatus>(row, 5)?,
        detected_at: row.get(6)?,
    })
}

const HISTORY_COLUMNS: &str = "d.path, h.item_path, h.kind, h.classification, h.fingerprint, \
     h.previous_fingerprint, h.previous_path, h.last_modified, h.detected_at";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEvent> {
    let previous_path: Option<String> = row.get(6)?;
    Ok(HistoryEvent {
        directory: NormalizedPath::new(row.get::<_, String>(0)?),
        path: NormalizedPath::new(row.get::<_, String>(1)?),
        kind: parse_column::<EntryKind>(row, 2)?,
        classification: parse_column::<Classification>(row, 3)?,
        fingerprint: fingerprint_column(row, 4)?,
        previous_fingerprint: fingerprint_column(row, 5)?,
        previous_path: previous_path.map(NormalizedPath::new),
        last_modified: row.get(7)?,
        detected_at: row.get(8)?,
    })
}

pub fn directory_id(conn: &Connection, directory: &NormalizedPath) -> Result<Option<DirectoryId>> {
    let id = conn
        .prepare_cached("SELECT id FROM directories WHERE path = ?1")?
        .query_row(params![directory.as_str()], |row| row.get(0))
        .optional()?;
    Ok(id.map(DirectoryId))
}

pub fn get_or_create_directory(conn: &Connection, directory: &NormalizedPath) -> Result<DirectoryId> {
    conn.prepare_cached("INSERT OR IGNORE INTO directories (path, created_at) VALUES (?1, ?2)")?
        .execute(params![directory.as_str(), timestamp::now()])?;
    let id = conn
        .prepare_cached("SELECT id FROM directories WHERE path = ?1")?
        .query_row(params![directory.as_str()], |row| row.get(0))?;
    Ok(DirectoryId(id))
}

pub fn upsert_entry(conn: &Connection, directory: DirectoryId, event: &FileEvent) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO file_metadata
            (directory_id, item_path, kind, fingerprint, size, last_modified, status, detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (directory_id, item_path) DO UPDATE SET
            kind = excluded.kind,
            fingerprint = excluded.fingerprint,
            size = excluded.size,
            last_modified = excluded.last_modified,
            status = excluded.status,
            detected_at = excluded.detected_at",
    )?
    .execute(params![
        directory.0,
        event.path.as_str(),
        event.kind.as_str(),
        event.fingerprint.as_ref().map(|f| f.as_str()),
        size_to_sql(event.size),
        event.last_modified,
        event.status.as_str(),
        timestamp::now(),
    ])?;
    Ok(())
}

pub fn live_entries(conn: &Connection, directory: DirectoryId) -> Result<Baseline> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ENTRY_COLUMNS} FROM file_metadata
         WHERE directory_id = ?1 AND status != 'deleted'"
    ))?;
    let rows = stmt.query_map(params![directory.0], entry_from_row)?;
    let mut baseline = Baseline::new();
    for row in rows {
        let entry = row?;
        baseline.insert(entry.path.clone(), entry);
    }
    Ok(baseline)
}

pub fn live_entry(conn: &Connection, directory: DirectoryId, path: &NormalizedPath) -> Result<Option<BaselineEntry>> {
    let entry = conn
        .prepare_cached(&format!(
            "SELECT {ENTRY_COLUMNS} FROM file_metadata
             WHERE directory_id = ?1 AND item_path = ?2 AND status != 'deleted'"
        ))?
        .query_row(params![directory.0, path.as_str()], entry_from_row)
        .optional()?;
    Ok(entry)
}

/// Entries strictly below `folder`. The range `[folder + "/", folder + "0")`
/// covers exactly the paths continuing with a separator, since `'0'` is the
/// character after `'/'`.
pub fn live_descendants(conn: &Connection, directory: DirectoryId, folder: &NormalizedPath) -> Result<Vec<BaselineEntry>> {
    let lower = format!("{}/", folder.as_str());
    let upper = format!("{}0", folder.as_str());
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ENTRY_COLUMNS} FROM file_metadata
         WHERE directory_id = ?1 AND item_path >= ?2 AND item_path < ?3 AND status != 'deleted'
         ORDER BY item_path"
    ))?;
    let rows = stmt.query_map(params![directory.0, lower, upper], entry_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_entries(conn: &Connection, directory: DirectoryId) -> Result<usize> {
    let count: i64 = conn
        .prepare_cached("SELECT COUNT(*) FROM file_metadata WHERE directory_id = ?1")?
        .query_row(params![directory.0], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn delete_directory(conn: &Connection, directory: DirectoryId) -> Result<usize> {
    let removed = count_entries(conn, directory)?;
    conn.prepare_cached("DELETE FROM directories WHERE id = ?1")?
        .execute(params![directory.0])?;
    Ok(removed)
}

pub fn replace_entries(conn: &Connection, directory: DirectoryId, root: &NormalizedPath, entries: &[Entry]) -> Result<usize> {
    conn.prepare_cached("DELETE FROM file_metadata WHERE directory_id = ?1")?
        .execute(params![directory.0])?;
    for entry in entries {
        upsert_entry(conn, directory, &FileEvent::from_entry(root, entry, EntryStatus::Current))?;
    }
    Ok(entries.len())
}

pub fn promote(conn: &Connection, directory: DirectoryId) -> Result<usize> {
    let removed = conn
        .prepare_cached("DELETE FROM file_metadata WHERE directory_id = ?1 AND status = 'deleted'")?
        .execute(params![directory.0])?;
    let promoted = conn
        .prepare_cached(
            "UPDATE file_metadata SET status = 'current', detected_at = ?2
             WHERE directory_id = ?1 AND status IN ('added', 'modified')",
        )?
        .execute(params![directory.0, timestamp::now()])?;
    Ok(removed + promoted)
}

pub fn insert_history(conn: &Connection, directory: DirectoryId, event: &HistoryEvent) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO change_history
            (directory_id, item_path, kind, classification, fingerprint,
             previous_fingerprint, previous_path, last_modified, detected_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?
    .execute(params![
        directory.0,
        event.path.as_str(),
        event.kind.as_str(),
        event.classification.as_str(),
        event.fingerprint.as_ref().map(|f| f.as_str()),
        event.previous_fingerprint.as_ref().map(|f| f.as_str()),
        event.previous_path.as_ref().map(|p| p.as_str()),
        event.last_modified,
        event.detected_at,
    ])?;
    Ok(())
}

pub fn file_history(conn: &Connection, path: &NormalizedPath, limit: usize) -> Result<Vec<HistoryEvent>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {HISTORY_COLUMNS} FROM change_history h
         JOIN directories d ON d.id = h.directory_id
         WHERE h.item_path = ?1 OR h.previous_path = ?1
         ORDER BY h.id DESC LIMIT ?2"
    ))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![path.as_str(), limit], history_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn recent_changes(conn: &Connection, since: &str) -> Result<Vec<HistoryEvent>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {HISTORY_COLUMNS} FROM change_history h
         JOIN directories d ON d.id = h.directory_id
         WHERE h.detected_at >= ?1
         ORDER BY h.id DESC"
    ))?;
    let rows = stmt.query_map(params![since], history_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn monitored_directories(conn: &Connection) -> Result<Vec<NormalizedPath>> {
    let mut stmt = conn.prepare_cached("SELECT path FROM directories ORDER BY path")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(NormalizedPath::new)
        .collect())
}
