//! Error types for fim-core

use std::path::PathBuf;

use crate::monitor::DirectoryFailure;

/// Result type for fim-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fim-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested session cannot start with this configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Every requested directory failed validation
    #[error("No monitored directory could be started ({} failed)", failures.len())]
    NoValidDirectories { failures: Vec<DirectoryFailure> },

    /// A directory to monitor does not exist or is not a directory
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Error in the persistence layer outside of SQLite itself
    #[error("Store error: {message}")]
    Store { message: String },

    /// Snapshot creation or restoration failed
    #[error("Backup error: {message}")]
    Backup { message: String },

    /// Operation not allowed in the current monitor state
    #[error("Cannot {operation} while monitor is {state}")]
    InvalidState { operation: String, state: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from fim-fs
    #[error(transparent)]
    Fs(#[from] fim_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem watcher error
    #[error(transparent)]
    Watch(#[from] notify::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// True for SQLite contention errors that are worth retrying.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
