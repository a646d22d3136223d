//! File Integrity Monitor CLI
//!
//! Thin command-line front-end over `fim-core`: start a monitoring session,
//! inspect and reset baselines, read logs, change history and backups.

mod cli;
mod commands;
mod context;
mod error;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{BaselineAction, Cli, Commands, ConfigAction};
use context::CliContext;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let context = CliContext {
        config_path: cli.config,
        data_dir: cli.data_dir,
        json: cli.json,
    };

    match cli.command {
        Some(cmd) => execute_command(&context, cmd),
        None => {
            println!("{} File Integrity Monitor", "fim".green().bold());
            println!();
            println!("Run {} for available commands.", "fim --help".cyan());
            Ok(())
        }
    }
}

/// Diagnostics go to stderr so `--json` output stays parseable.
fn init_tracing(verbose: bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(verbose);
    let result = if verbose {
        tracing::subscriber::set_global_default(builder.with_max_level(Level::DEBUG).finish())
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())
    };
    result.map_err(|e| CliError::user(format!("Failed to set tracing subscriber: {e}")))?;
    tracing::debug!("Verbose mode enabled");
    Ok(())
}

fn execute_command(context: &CliContext, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Monitor {
            directories,
            exclude,
            mode,
            interval,
            detect_renames,
            no_backup,
            rebaseline,
            once,
        } => commands::run_monitor(
            context,
            commands::MonitorOptions {
                directories,
                exclude,
                mode: mode.map(Into::into),
                interval,
                detect_renames,
                no_backup,
                rebaseline,
                once,
            },
        ),
        Commands::Baseline { action } => match action {
            BaselineAction::View { directory } => {
                commands::run_baseline_view(context, directory.as_deref())
            }
            BaselineAction::Reset { directories } => {
                commands::run_baseline_reset(context, &directories)
            }
            BaselineAction::Accept { directory } => {
                commands::run_baseline_accept(context, &directory)
            }
        },
        Commands::Unmonitor { directory } => commands::run_unmonitor(context, &directory),
        Commands::Logs { directory } => commands::run_logs(context, directory.as_deref()),
        Commands::History { path, limit } => commands::run_history(context, &path, limit),
        Commands::Recent { hours } => commands::run_recent(context, hours),
        Commands::Backups { directory } => commands::run_backups(context, directory.as_deref()),
        Commands::Restore {
            snapshot,
            destination,
        } => commands::run_restore(context, &snapshot, &destination),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::run_config_show(context),
            ConfigAction::Init { path, force } => {
                commands::run_config_init(context, path.as_deref(), force)
            }
        },
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "fim", &mut std::io::stdout());
            Ok(())
        }
    }
}
