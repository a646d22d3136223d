//! Command implementations for fim-cli

pub mod backups;
pub mod baseline;
pub mod config;
pub mod logs;
pub mod monitor;

pub use backups::{run_backups, run_restore};
pub use baseline::{run_baseline_accept, run_baseline_reset, run_baseline_view, run_unmonitor};
pub use config::{run_config_init, run_config_show};
pub use logs::{run_history, run_logs, run_recent};
pub use monitor::{MonitorOptions, run_monitor};

use colored::{ColoredString, Colorize};
use fim_core::Classification;
use serde::Serialize;

use crate::error::Result;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Classification label colored by severity.
pub(crate) fn classification_label(classification: Classification) -> ColoredString {
    let label = format!("{:<8}", classification.as_str());
    match classification {
        Classification::Added => label.green(),
        Classification::Modified => label.yellow(),
        Classification::Deleted => label.red(),
        Classification::Renamed => label.cyan(),
    }
}

/// `path` relative to `directory` when it lies inside it.
pub(crate) fn relative<'a>(directory: &str, path: &'a str) -> &'a str {
    match path.strip_prefix(directory) {
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_strips_directory_prefix() {
        assert_eq!(relative("/srv/www", "/srv/www/css/site.css"), "css/site.css");
        assert_eq!(relative("/srv/www", "/srv/wwwdata/a"), "/srv/wwwdata/a");
        assert_eq!(relative("/srv/www", "/srv/www"), "/srv/www");
    }
}
