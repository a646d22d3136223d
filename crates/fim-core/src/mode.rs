//! Monitoring mode selection

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// How a session discovers changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// Full rescan of every directory once per poll interval
    Poll,
    /// Filesystem event subscription, reconciling one path per event
    #[default]
    Watch,
}

impl MonitorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorMode::Poll => "poll",
            MonitorMode::Watch => "watch",
        }
    }
}

impl std::fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(MonitorMode::Poll),
            "watch" => Ok(MonitorMode::Watch),
            other => Err(Error::Config {
                message: format!("unknown monitor mode '{other}' (expected poll or watch)"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("POLL".parse::<MonitorMode>().unwrap(), MonitorMode::Poll);
        assert_eq!("watch".parse::<MonitorMode>().unwrap(), MonitorMode::Watch);
        assert!("inotify".parse::<MonitorMode>().is_err());
    }
}
