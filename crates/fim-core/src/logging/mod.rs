//! Per-directory change logs
//!
//! Every monitored directory gets one log file, `FIM_<name>_<hash>.log`, under
//! the configured logs directory. The hash is taken over the full directory
//! path, so directories sharing a base name keep separate logs. Lines have the form
//! `<timestamp> | <LEVEL> | <owner> | <message>` and are mirrored to
//! `tracing`.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use fim_fs::{NormalizedPath, io, timestamp};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::Result;
use crate::ledger::{ChangeRecord, Classification};

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("Invalid file name regex"));

const LOG_PREFIX: &str = "FIM_";
const LOG_EXTENSION: &str = ".log";
const PATH_HASH_LEN: usize = 8;

/// Log file name for a monitored directory.
pub fn log_file_name(directory: &NormalizedPath) -> String {
    let base = directory.file_name().unwrap_or(directory.as_str());
    let digest = format!("{:x}", Sha256::digest(directory.as_str().as_bytes()));
    format!(
        "{LOG_PREFIX}{}_{}{LOG_EXTENSION}",
        UNSAFE_CHARS.replace_all(base, "_"),
        &digest[..PATH_HASH_LEN]
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    /// Additions and deletions warn, modifications are errors, renames are informational.
    pub fn for_classification(classification: Classification) -> Self {
        match classification {
            Classification::Added | Classification::Deleted => LogLevel::Warning,
            Classification::Modified => LogLevel::Error,
            Classification::Renamed => LogLevel::Info,
        }
    }
}

/// Log sink for one monitored directory
#[derive(Debug)]
pub struct DirectoryLogger {
    directory: NormalizedPath,
    owner: String,
    file: NormalizedPath,
}

impl DirectoryLogger {
    pub fn directory(&self) -> &NormalizedPath {
        &self.directory
    }

    pub fn file(&self) -> &NormalizedPath {
        &self.file
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Write one classified change at the level its classification calls for.
    pub fn change(&self, record: &ChangeRecord) {
        self.log(LogLevel::for_classification(record.classification), &record.describe());
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(directory = %self.directory, "{message}"),
            LogLevel::Warning => tracing::warn!(directory = %self.directory, "{message}"),
            LogLevel::Error => tracing::error!(directory = %self.directory, "{message}"),
        }

        let line = format!("{} | {} | {} | {}", timestamp::now(), level.as_str(), self.owner, message);
        if let Err(e) = io::append_line(&self.file, &line) {
            tracing::warn!(file = %self.file, error = %e, "Failed to write directory log");
        }
    }
}

/// Lazily creates and reuses one [`DirectoryLogger`] per monitored directory.
#[derive(Debug)]
pub struct LoggerRegistry {
    logs_dir: NormalizedPath,
    loggers: Mutex<HashMap<NormalizedPath, Arc<DirectoryLogger>>>,
}

impl LoggerRegistry {
    pub fn new(logs_dir: impl Into<NormalizedPath>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn logs_dir(&self) -> &NormalizedPath {
        &self.logs_dir
    }

    pub fn get_or_create_logger(&self, owner: &str, directory: &NormalizedPath) -> Arc<DirectoryLogger> {
        let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
        loggers
            .entry(directory.clone())
            .or_insert_with(|| {
                Arc::new(DirectoryLogger {
                    directory: directory.clone(),
                    owner: owner.to_string(),
                    file: self.logs_dir.join(&log_file_name(directory)),
                })
            })
            .clone()
    }

    /// Number of loggers currently held.
    pub fn active(&self) -> usize {
        self.loggers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Release every logger. Later calls create fresh ones.
    pub fn shutdown(&self) {
        let released = {
            let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
            let count = loggers.len();
            loggers.clear();
            count
        };
        tracing::debug!(released, "Directory loggers released");
    }

    /// Log text of one monitored directory; empty when nothing was logged yet.
    pub fn read_log(&self, directory: &NormalizedPath) -> Result<String> {
        let file = self.logs_dir.join(&log_file_name(directory));
        if !file.exists() {
            return Ok(String::new());
        }
        Ok(io::read_text(&file)?)
    }

    /// Every directory log under the logs directory, sorted by file name.
    pub fn read_all_logs(&self) -> Result<Vec<(String, String)>> {
        if !self.logs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut logs = Vec::new();
        for dirent in fs::read_dir(self.logs_dir.to_native())? {
            let dirent = dirent?;
            let name = dirent.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(LOG_PREFIX) && name.ends_with(LOG_EXTENSION)) {
                continue;
            }
            let content = io::read_text(&self.logs_dir.join(&name))?;
            logs.push((name, content));
        }
        logs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(logs)
    }
}
