//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// File Integrity Monitor - detect and record changes in watched directories
#[derive(Parser, Debug)]
#[command(name = "fim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "FIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for the database, logs and backups
    #[arg(long, global = true, env = "FIM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Scheduling strategy selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Poll,
    Watch,
}

impl From<ModeArg> for fim_core::MonitorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Poll => fim_core::MonitorMode::Poll,
            ModeArg::Watch => fim_core::MonitorMode::Watch,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Monitor directories until interrupted
    ///
    /// Records a baseline for directories seen for the first time and
    /// reports drift for the others, then keeps watching.
    ///
    /// Examples:
    ///   fim monitor /srv/www                    # Watch one directory
    ///   fim monitor /etc /srv -x /srv/cache     # Exclude a subtree
    ///   fim monitor /srv --mode poll -i 10      # Rescan every 10 seconds
    Monitor {
        /// Directories to monitor
        #[arg(required = true)]
        directories: Vec<PathBuf>,

        /// Paths never to scan (repeatable)
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<PathBuf>,

        /// How changes are discovered
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Seconds between scans in poll mode
        #[arg(short, long)]
        interval: Option<u64>,

        /// Report a deletion plus an identical addition as a rename
        #[arg(long)]
        detect_renames: bool,

        /// Skip the backup snapshot taken at start
        #[arg(long)]
        no_backup: bool,

        /// Discard existing baselines instead of reporting drift
        #[arg(long)]
        rebaseline: bool,

        /// Start, report drift, and stop without waiting
        #[arg(long)]
        once: bool,
    },

    /// Inspect or change stored baselines
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },

    /// Stop tracking a directory and purge its records
    Unmonitor {
        /// Directory to forget
        directory: PathBuf,
    },

    /// Show directory change logs
    Logs {
        /// Only the log of this directory
        directory: Option<PathBuf>,
    },

    /// Show recorded changes of one file or folder
    History {
        /// Path to look up
        path: PathBuf,

        /// Maximum number of events
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show changes recorded recently across all directories
    Recent {
        /// Look-back window in hours
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },

    /// List backup snapshots
    Backups {
        /// Only snapshots of this directory
        directory: Option<PathBuf>,
    },

    /// Copy a backup snapshot into a directory
    Restore {
        /// Snapshot directory, as listed by `fim backups`
        snapshot: PathBuf,

        /// Destination directory
        destination: PathBuf,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    ///
    /// Examples:
    ///   fim completions bash > ~/.local/share/bash-completion/completions/fim
    ///   fim completions zsh > ~/.zfunc/_fim
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Baseline actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum BaselineAction {
    /// Show stored entries of one directory or of all directories
    View {
        directory: Option<PathBuf>,
    },

    /// Discard stored baselines and record fresh ones (change history is kept;
    /// directories that no longer exist are purged entirely)
    Reset {
        #[arg(required = true)]
        directories: Vec<PathBuf>,
    },

    /// Accept the current drift of a directory as its baseline
    Accept {
        directory: PathBuf,
    },
}

/// Configuration file actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with default settings
    Init {
        /// Target file; the extension selects the format
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
