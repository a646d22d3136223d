//! Snapshot creation, listing and restoration

use std::fs;
use std::path::Path;

use fim_fs::{NormalizedPath, io, timestamp};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::BackupCoordinator;
use crate::{Error, Result};

/// Metadata stored next to each snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Directory the snapshot was taken from
    pub source: NormalizedPath,
    /// When the snapshot was created
    pub created: String,
    /// Number of files copied
    pub files: usize,
    /// Number of folders created
    pub folders: usize,
}

/// A snapshot on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub path: NormalizedPath,
    pub metadata: BackupMetadata,
}

/// Manages snapshots under one backup directory
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: NormalizedPath,
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<NormalizedPath>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &NormalizedPath {
        &self.backup_dir
    }

    fn snapshot_name(source: &NormalizedPath) -> String {
        let base = source.file_name().unwrap_or("root");
        format!("backup_{}_{}", base, timestamp::now_compact())
    }

    /// Copy `source` into a new snapshot, replacing any snapshot of the same name.
    ///
    /// Hidden entries (names starting with `.`) are skipped. Fails if the
    /// backup directory lies inside `source`, since the copy would contain
    /// itself.
    pub fn try_create_backup(&self, source: &NormalizedPath) -> Result<BackupSnapshot> {
        if !source.is_dir() {
            return Err(Error::DirectoryNotFound {
                path: source.to_native(),
            });
        }
        if self.backup_dir.is_within(source) {
            return Err(Error::Backup {
                message: format!(
                    "backup directory {} is inside the monitored directory {}",
                    self.backup_dir, source
                ),
            });
        }

        let name = Self::snapshot_name(source);
        let target = self.backup_dir.join(&name);
        if target.exists() {
            fs::remove_dir_all(target.to_native())?;
        }
        fs::create_dir_all(target.to_native())?;

        let (files, folders) = copy_tree(&source.to_native(), &target.to_native())?;
        let metadata = BackupMetadata {
            source: source.clone(),
            created: timestamp::now(),
            files,
            folders,
        };
        let content = toml::to_string_pretty(&metadata)?;
        io::write_atomic(&self.backup_dir.join(&format!("{name}.toml")), content.as_bytes())?;

        tracing::info!(source = %source, snapshot = %target, files, "Backup created");
        Ok(BackupSnapshot {
            path: target,
            metadata,
        })
    }

    /// All snapshots, newest first, optionally limited to one source directory.
    pub fn list_backups(&self, source: Option<&NormalizedPath>) -> Result<Vec<BackupSnapshot>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for dirent in fs::read_dir(self.backup_dir.to_native())? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let snapshot_path = self.backup_dir.join(stem);
            if !snapshot_path.is_dir() {
                continue;
            }

            let content = fs::read_to_string(&path)?;
            let metadata: BackupMetadata = match toml::from_str(&content) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable backup metadata");
                    continue;
                }
            };
            if source.is_some_and(|source| &metadata.source != source) {
                continue;
            }
            snapshots.push(BackupSnapshot {
                path: snapshot_path,
                metadata,
            });
        }

        snapshots.sort_by(|a, b| {
            b.metadata
                .created
                .cmp(&a.metadata.created)
                .then_with(|| b.path.cmp(&a.path))
        });
        Ok(snapshots)
    }

    /// Copy a snapshot's contents into `destination`, overwriting files that
    /// exist in both. Returns the number of files restored.
    pub fn restore_backup(&self, snapshot: &NormalizedPath, destination: &NormalizedPath) -> Result<usize> {
        if !snapshot.is_within(&self.backup_dir) || snapshot == &self.backup_dir {
            return Err(Error::Backup {
                message: format!("{snapshot} is not a snapshot under {}", self.backup_dir),
            });
        }
        if !snapshot.is_dir() {
            return Err(Error::NotFound(format!("backup snapshot {snapshot}")));
        }

        fs::create_dir_all(destination.to_native())?;
        let (files, _) = copy_tree(&snapshot.to_native(), &destination.to_native())?;
        tracing::info!(snapshot = %snapshot, destination = %destination, files, "Backup restored");
        Ok(files)
    }
}

impl BackupCoordinator for BackupManager {
    fn create_backup(&self, source: &NormalizedPath) -> Option<BackupSnapshot> {
        match self.try_create_backup(source) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Backup failed");
                None
            }
        }
    }
}

/// Copy every non-hidden entry of `source` into `target`. Symbolic links
/// are skipped.
fn copy_tree(source: &Path, target: &Path) -> Result<(usize, usize)> {
    let mut files = 0;
    let mut folders = 0;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|dirent| !is_hidden(dirent.file_name()));

    for item in walker {
        let dirent = match item {
            Ok(dirent) => dirent,
            Err(e) => {
                tracing::warn!(source = %source.display(), error = %e, "Skipping unreadable entry during backup");
                continue;
            }
        };
        let Ok(relative) = dirent.path().strip_prefix(source) else {
            continue;
        };
        let dest = target.join(relative);

        let file_type = dirent.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
            folders += 1;
        } else if file_type.is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            match fs::copy(dirent.path(), &dest) {
                Ok(_) => files += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %dirent.path().display(), "File vanished during backup");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok((files, folders))
}
