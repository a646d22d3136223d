//! Monitor command implementation

use std::path::PathBuf;

use colored::Colorize;
use fim_core::{MonitorMode, StartReport};

use super::{classification_label, print_json};
use crate::context::CliContext;
use crate::error::{CliError, Result};

/// Command-line overrides for one monitoring session
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub directories: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
    pub mode: Option<MonitorMode>,
    pub interval: Option<u64>,
    pub detect_renames: bool,
    pub no_backup: bool,
    pub rebaseline: bool,
    /// Stop right after the start-up reconciliation
    pub once: bool,
}

/// Run the monitor command
pub fn run_monitor(context: &CliContext, options: MonitorOptions) -> Result<()> {
    let mut config = context.load_config()?;
    if let Some(mode) = options.mode {
        config.mode = mode;
    }
    if let Some(interval) = options.interval {
        config.poll_interval_secs = interval;
    }
    config.detect_renames |= options.detect_renames;
    config.rebaseline_on_start |= options.rebaseline;
    if options.no_backup {
        config.backup_on_start = false;
    }

    let mode = config.mode;
    let interval = config.poll_interval_secs;
    let mut monitor = context.open_monitor(config)?;
    let report = monitor.start(&options.directories, &options.exclude)?;

    if context.json {
        print_json(&report)?;
    } else {
        print_start_report(&report);
    }

    if !options.once {
        if !context.json {
            let schedule = match mode {
                MonitorMode::Poll => format!("poll every {interval}s"),
                MonitorMode::Watch => "watch".to_string(),
            };
            println!(
                "Monitoring {} directories ({}). Press {} to stop.",
                report.started.len(),
                schedule,
                "Ctrl-C".cyan()
            );
        }
        wait_for_interrupt()?;
        tracing::info!("Interrupt received, stopping");
    }

    monitor.stop()?;
    if !context.json {
        println!("{} Monitoring stopped.", "OK".green().bold());
    }
    Ok(())
}

/// Block the calling thread until Ctrl-C.
fn wait_for_interrupt() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .map_err(|e| CliError::user(format!("Unable to listen for Ctrl-C: {e}")))
}

fn print_start_report(report: &StartReport) {
    for directory in &report.started {
        println!("  {} {}", "+".green(), directory);
    }
    for directory in &report.excluded {
        println!("  {} {} ({})", "-".yellow(), directory, "excluded".dimmed());
    }
    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            "!".red(),
            failure.directory.display(),
            failure.reason.red()
        );
    }

    let drift = &report.initial;
    if drift.changes.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", "Changes since last run".bold(), drift.changes.len());
    for record in &drift.changes {
        println!("  {} {}", classification_label(record.classification), record.path);
    }
}
