//! Monitor configuration
//!
//! Settings are loaded from a TOML, JSON or YAML file through
//! [`fim_fs::load_config`]; every field has a default so an empty file (or
//! no file at all) yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fim_fs::{NormalizedPath, load_config, save_config};
use serde::{Deserialize, Serialize};

use crate::mode::MonitorMode;
use crate::{Error, Result};

/// Maximum number of pooled read connections.
pub const MAX_READ_POOL_SIZE: usize = 8;

/// Maximum number of watch-mode worker threads.
pub const MAX_WATCH_WORKERS: usize = 16;

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("fim"))
        .unwrap_or_else(|| PathBuf::from(".fim"))
}

fn default_poll_interval() -> u64 {
    3
}

fn default_true() -> bool {
    true
}

fn default_read_pool_size() -> usize {
    4
}

fn default_watch_workers() -> usize {
    4
}

fn default_owner() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "fim".to_string())
}

/// Settings for one monitoring process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Root for engine state when the specific locations are not set
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database file (default `<data_dir>/fim.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Per-directory log files (default `<data_dir>/logs`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_dir: Option<PathBuf>,

    /// Backup snapshots (default `<data_dir>/backups`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    #[serde(default)]
    pub mode: MonitorMode,

    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_true")]
    pub backup_on_start: bool,

    /// Pair a deletion with an addition of identical content as one rename
    #[serde(default)]
    pub detect_renames: bool,

    /// Discard existing baselines at start instead of reconciling them
    #[serde(default)]
    pub rebaseline_on_start: bool,

    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,

    #[serde(default = "default_watch_workers")]
    pub watch_workers: usize,

    /// Identity recorded in every log line
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Paths that are never scanned
    #[serde(default)]
    pub excluded: Vec<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: None,
            logs_dir: None,
            backup_dir: None,
            mode: MonitorMode::default(),
            poll_interval_secs: default_poll_interval(),
            backup_on_start: true,
            detect_renames: false,
            rebaseline_on_start: false,
            read_pool_size: default_read_pool_size(),
            watch_workers: default_watch_workers(),
            owner: default_owner(),
            excluded: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Default configuration with all engine state under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load from a config file; the format follows the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_config(&NormalizedPath::new(path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_config(&NormalizedPath::new(path), self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config {
                message: "poll_interval_secs must be at least 1".to_string(),
            });
        }
        if self.owner.trim().is_empty() {
            return Err(Error::Config {
                message: "owner must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.data_dir.join("fim.db"))
    }

    pub fn logs_path(&self) -> PathBuf {
        self.logs_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }

    pub fn backup_path(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("backups"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn read_pool_size(&self) -> usize {
        self.read_pool_size.clamp(1, MAX_READ_POOL_SIZE)
    }

    pub fn watch_workers(&self) -> usize {
        self.watch_workers.clamp(1, MAX_WATCH_WORKERS)
    }

    /// Locations the engine writes to. These are always excluded from
    /// monitoring so the monitor never observes its own writes.
    pub fn engine_paths(&self) -> Vec<PathBuf> {
        let database = self.database_path();
        // WAL and shared-memory siblings change on every write
        let mut wal = database.clone().into_os_string();
        wal.push("-wal");
        let mut shm = database.clone().into_os_string();
        shm.push("-shm");
        let mut journal = database.clone().into_os_string();
        journal.push("-journal");

        vec![
            database,
            PathBuf::from(wal),
            PathBuf::from(shm),
            PathBuf::from(journal),
            self.logs_path(),
            self.backup_path(),
        ]
    }
}
