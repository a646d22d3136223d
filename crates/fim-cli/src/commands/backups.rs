//! Backup snapshot commands

use std::path::Path;

use colored::Colorize;
use fim_core::BackupManager;
use fim_core::monitor::normalize;
use serde_json::json;

use super::print_json;
use crate::context::CliContext;
use crate::error::{CliError, Result};

/// Run the backups command
pub fn run_backups(context: &CliContext, directory: Option<&Path>) -> Result<()> {
    let config = context.load_config()?;
    let manager = BackupManager::new(normalize(&config.backup_path()));
    let source = directory.map(normalize);
    let snapshots = manager.list_backups(source.as_ref())?;

    if context.json {
        return print_json(&snapshots);
    }
    if snapshots.is_empty() {
        println!("{}", "No backups found.".dimmed());
        return Ok(());
    }

    println!("{} ({}):", "Backups".bold(), snapshots.len());
    for snapshot in &snapshots {
        let meta = &snapshot.metadata;
        println!(
            "  {} {} ({} files, {} folders)",
            meta.created.dimmed(),
            meta.source.to_string().cyan(),
            meta.files,
            meta.folders
        );
        println!("    {}", snapshot.path);
    }
    Ok(())
}

/// Run the restore command
pub fn run_restore(context: &CliContext, snapshot: &Path, destination: &Path) -> Result<()> {
    if !snapshot.is_dir() {
        return Err(CliError::user(format!(
            "Snapshot not found: {}",
            snapshot.display()
        )));
    }
    let config = context.load_config()?;
    let manager = BackupManager::new(normalize(&config.backup_path()));
    let files = manager.restore_backup(&normalize(snapshot), &normalize(destination))?;

    if context.json {
        return print_json(&json!({
            "snapshot": snapshot,
            "destination": destination,
            "files": files,
        }));
    }
    println!(
        "{} Restored {} files into {}.",
        "OK".green().bold(),
        files,
        destination.display()
    );
    Ok(())
}
