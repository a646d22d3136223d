//! Atomic I/O operations with file locking

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Same directory keeps the rename on one filesystem
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        native_path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.lock_exclusive()
        .map_err(|_| Error::LockFailed { path: native_path.clone() })?;

    temp_file.write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock()
        .map_err(|_| Error::LockFailed { path: native_path.clone() })?;

    fs::rename(&temp_path, &native_path)
        .map_err(|e| Error::io(&native_path, e))?;

    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path)
        .map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Append one line to a text file, creating it and its parent if needed.
///
/// Holds an exclusive advisory lock for the duration of the write so lines
/// from concurrent writers never interleave.
pub fn append_line(path: &NormalizedPath, line: &str) -> Result<()> {
    let native_path = path.to_native();
    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&native_path)
        .map_err(|e| Error::io(&native_path, e))?;
    file.lock_exclusive()
        .map_err(|_| Error::LockFailed { path: native_path.clone() })?;
    let result = writeln!(file, "{line}").map_err(|e| Error::io(&native_path, e));
    file.unlock()
        .map_err(|_| Error::LockFailed { path: native_path.clone() })?;
    result
}
