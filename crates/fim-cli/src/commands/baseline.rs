//! Baseline inspection and maintenance commands

use std::path::{Path, PathBuf};

use colored::{ColoredString, Colorize};
use fim_core::{BaselineEntry, DirectoryBaseline, EntryStatus};
use serde_json::json;

use super::{print_json, relative};
use crate::context::CliContext;
use crate::error::Result;

/// Run the baseline view command
pub fn run_baseline_view(context: &CliContext, directory: Option<&Path>) -> Result<()> {
    let monitor = context.open_monitor(context.load_config()?)?;
    let baselines = monitor.view_baseline(directory)?;

    if context.json {
        return print_json(&baselines);
    }

    if baselines.is_empty() {
        println!("{}", "No baselines recorded.".dimmed());
        println!("Run {} to record one.", "fim monitor <DIR>".cyan());
        return Ok(());
    }
    for baseline in &baselines {
        print_baseline(baseline);
    }
    Ok(())
}

fn print_baseline(baseline: &DirectoryBaseline) {
    println!(
        "{} ({} entries)",
        baseline.directory.to_string().bold(),
        baseline.entries.len()
    );
    if baseline.entries.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for entry in baseline.entries.values() {
        print_entry(baseline.directory.as_str(), entry);
    }
    println!();
}

fn print_entry(directory: &str, entry: &BaselineEntry) {
    let fingerprint = entry
        .fingerprint
        .as_ref()
        .map(|fp| fp.short().to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {:<6} {:<12} {}",
        status_label(entry.status),
        entry.kind.as_str(),
        fingerprint.dimmed(),
        relative(directory, entry.path.as_str())
    );
}

fn status_label(status: EntryStatus) -> ColoredString {
    let label = format!("{:<8}", status.as_str());
    match status {
        EntryStatus::Current => label.normal(),
        EntryStatus::Added => label.green(),
        EntryStatus::Modified => label.yellow(),
        EntryStatus::Deleted => label.red(),
    }
}

/// Run the baseline reset command
pub fn run_baseline_reset(context: &CliContext, directories: &[PathBuf]) -> Result<()> {
    let monitor = context.open_monitor(context.load_config()?)?;
    let entries = monitor.reset_baseline(directories)?;

    if context.json {
        return print_json(&json!({
            "directories": directories,
            "entries": entries,
        }));
    }
    println!(
        "{} Baseline reset for {} directories ({} entries).",
        "OK".green().bold(),
        directories.len(),
        entries
    );
    Ok(())
}

/// Run the baseline accept command
pub fn run_baseline_accept(context: &CliContext, directory: &Path) -> Result<()> {
    let monitor = context.open_monitor(context.load_config()?)?;
    let promoted = monitor.acknowledge(directory)?;

    if context.json {
        return print_json(&json!({
            "directory": directory,
            "accepted": promoted,
        }));
    }
    if promoted == 0 {
        println!("{} No pending changes in {}.", "OK".green().bold(), directory.display());
    } else {
        println!(
            "{} Accepted {} changes in {}.",
            "OK".green().bold(),
            promoted,
            directory.display()
        );
    }
    Ok(())
}

/// Run the unmonitor command
pub fn run_unmonitor(context: &CliContext, directory: &Path) -> Result<()> {
    let mut monitor = context.open_monitor(context.load_config()?)?;
    let removed = monitor.unmonitor(directory)?;

    if context.json {
        return print_json(&json!({
            "directory": directory,
            "removed": removed,
        }));
    }
    println!(
        "{} {} is no longer monitored ({} records removed).",
        "OK".green().bold(),
        directory.display(),
        removed
    );
    Ok(())
}
