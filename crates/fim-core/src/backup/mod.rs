//! Pre-monitoring backup snapshots
//!
//! Before a directory enters monitoring, its contents are copied to
//! `<backup_dir>/backup_<name>_<YYYYmmdd_HHMMSS>/` with a
//! `backup_<name>_<YYYYmmdd_HHMMSS>.toml` metadata file next to it. Snapshots
//! are never diffed against the baseline; they exist for restoration.

mod manager;

pub use manager::{BackupManager, BackupMetadata, BackupSnapshot};

use fim_fs::NormalizedPath;

/// Creates a snapshot of a directory before it is monitored.
pub trait BackupCoordinator: Send + Sync {
    /// Copy `source` to a new snapshot. `None` means the source did not exist
    /// or the copy failed; the caller logs it and continues.
    fn create_backup(&self, source: &NormalizedPath) -> Option<BackupSnapshot>;
}
