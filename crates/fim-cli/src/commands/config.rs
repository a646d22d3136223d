//! Configuration display and initialization commands

use std::path::Path;

use colored::Colorize;
use fim_core::MonitorConfig;

use super::print_json;
use crate::context::CliContext;
use crate::error::{CliError, Result};

/// Display the effective configuration
pub fn run_config_show(context: &CliContext) -> Result<()> {
    let config = context.load_config()?;

    if context.json {
        return print_json(&config);
    }

    println!("{}", "Monitor Configuration".bold());
    println!();
    println!("  {:<20} {}", "Mode:".dimmed(), config.mode.as_str().cyan());
    println!("  {:<20} {}s", "Poll interval:".dimmed(), config.poll_interval_secs);
    println!("  {:<20} {}", "Owner:".dimmed(), config.owner);
    println!("  {:<20} {}", "Backup on start:".dimmed(), config.backup_on_start);
    println!("  {:<20} {}", "Detect renames:".dimmed(), config.detect_renames);
    println!("  {:<20} {}", "Rebaseline on start:".dimmed(), config.rebaseline_on_start);
    println!("  {:<20} {}", "Read pool size:".dimmed(), config.read_pool_size());
    println!("  {:<20} {}", "Watch workers:".dimmed(), config.watch_workers());
    println!();
    println!("  {:<20} {}", "Database:".dimmed(), config.database_path().display());
    println!("  {:<20} {}", "Logs:".dimmed(), config.logs_path().display());
    println!("  {:<20} {}", "Backups:".dimmed(), config.backup_path().display());

    if config.excluded.is_empty() {
        println!("  {:<20} {}", "Excluded:".dimmed(), "(none)".dimmed());
    } else {
        println!("  {}", "Excluded:".dimmed());
        for path in &config.excluded {
            println!("    {} {}", "-".yellow(), path.display());
        }
    }
    Ok(())
}

/// Write a configuration file holding the default settings
pub fn run_config_init(context: &CliContext, path: Option<&Path>, force: bool) -> Result<()> {
    let target = context.config_target(path)?;
    if target.exists() && !force {
        return Err(CliError::user(format!(
            "{} already exists (use --force to overwrite)",
            target.display()
        )));
    }

    let mut config = MonitorConfig::default();
    if let Some(data_dir) = &context.data_dir {
        config.data_dir = data_dir.clone();
    }
    config.save(&target)?;

    println!(
        "{} Configuration written to {}",
        "OK".green().bold(),
        target.display()
    );
    Ok(())
}
