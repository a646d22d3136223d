//! Configuration resolution
//!
//! Every command runs against one [`MonitorConfig`], taken from the first
//! of these that applies:
//! - the `--config` file (or `FIM_CONFIG`), which must exist
//! - `<config dir>/fim/config.toml` if present
//! - built-in defaults
//!
//! `--data-dir` then overrides the data directory of whichever was chosen.

use std::path::{Path, PathBuf};

use fim_core::{Monitor, MonitorConfig};

use crate::error::{CliError, Result};

const CONFIG_FILE: &str = "config.toml";

/// Per-user configuration file location, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fim").join(CONFIG_FILE))
}

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct CliContext {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
}

impl CliContext {
    pub fn load_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(CliError::user(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                MonitorConfig::load(path)?
            }
            None => match default_config_path().filter(|path| path.is_file()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "Using user config");
                    MonitorConfig::load(&path)?
                }
                None => MonitorConfig::default(),
            },
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        Ok(config)
    }

    /// Open a monitor over the configured database.
    pub fn open_monitor(&self, config: MonitorConfig) -> Result<Monitor> {
        Ok(Monitor::open(config)?)
    }

    /// File a `config init` without a path would write to.
    pub fn config_target(&self, path: Option<&Path>) -> Result<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(|| self.config_path.clone())
            .or_else(default_config_path)
            .ok_or_else(|| CliError::user("No configuration directory on this platform"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn data_dir_overrides_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("fim.toml");
        std::fs::write(&file, "poll_interval_secs = 7\ndata_dir = \"/var/lib/fim\"\n").unwrap();

        let context = CliContext {
            config_path: Some(file),
            data_dir: Some(temp.path().join("state")),
            json: false,
        };
        let config = context.load_config().unwrap();
        assert_eq!(config.poll_interval_secs, 7);
        assert_eq!(config.data_dir, temp.path().join("state"));
    }

    #[test]
    fn missing_config_file_is_a_user_error() {
        let context = CliContext {
            config_path: Some(PathBuf::from("/nonexistent/fim.toml")),
            ..CliContext::default()
        };
        let err = context.load_config().unwrap_err();
        assert!(matches!(err, CliError::User { .. }));
    }

    #[test]
    fn explicit_target_wins() {
        let context = CliContext {
            config_path: Some(PathBuf::from("/etc/fim.toml")),
            ..CliContext::default()
        };
        assert_eq!(
            context.config_target(Some(Path::new("/tmp/x.yaml"))).unwrap(),
            PathBuf::from("/tmp/x.yaml")
        );
        assert_eq!(context.config_target(None).unwrap(), PathBuf::from("/etc/fim.toml"));
    }
}
