//! Tests for loading monitor configuration in every supported format

use std::fs;
use std::path::PathBuf;

use fim_core::{Error, MonitorConfig, MonitorMode};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
#[case("fim.toml", "data_dir = \"/var/lib/fim\"\nmode = \"poll\"\npoll_interval_secs = 10\n")]
#[case("fim.json", r#"{"data_dir": "/var/lib/fim", "mode": "poll", "poll_interval_secs": 10}"#)]
#[case("fim.yaml", "data_dir: /var/lib/fim\nmode: poll\npoll_interval_secs: 10\n")]
fn test_loads_every_format(#[case] name: &str, #[case] content: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();

    let config = MonitorConfig::load(&path).unwrap();
    assert_eq!(config.mode, MonitorMode::Poll);
    assert_eq!(config.poll_interval_secs, 10);
    assert_eq!(config.database_path(), PathBuf::from("/var/lib/fim/fim.db"));
    assert!(config.backup_on_start);
    assert!(!config.detect_renames);
}

#[test]
fn test_save_then_load_preserves_settings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fim.toml");

    let mut config = MonitorConfig::with_data_dir("/srv/fim");
    config.detect_renames = true;
    config.excluded = vec![PathBuf::from("/srv/www/cache")];
    config.save(&path).unwrap();

    assert_eq!(MonitorConfig::load(&path).unwrap(), config);
}

#[test]
fn test_zero_interval_fails_validation_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fim.toml");
    fs::write(&path, "poll_interval_secs = 0\n").unwrap();

    assert!(matches!(MonitorConfig::load(&path), Err(Error::Config { .. })));
}

#[test]
fn test_engine_state_is_always_excluded() {
    let config = MonitorConfig::with_data_dir("/srv/fim");
    let paths = config.engine_paths();
    assert!(paths.contains(&PathBuf::from("/srv/fim/fim.db")));
    assert!(paths.contains(&PathBuf::from("/srv/fim/fim.db-wal")));
    assert!(paths.contains(&PathBuf::from("/srv/fim/logs")));
    assert!(paths.contains(&PathBuf::from("/srv/fim/backups")));
}
