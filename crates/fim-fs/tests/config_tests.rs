use fim_fs::{ConfigFormat, Error, NormalizedPath, load_config, save_config};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct WatchSettings {
    mode: String,
    poll_interval_secs: u64,
    excluded: Vec<String>,
}

fn sample() -> WatchSettings {
    WatchSettings {
        mode: "poll".into(),
        poll_interval_secs: 3,
        excluded: vec!["/data/tmp".into()],
    }
}

#[rstest]
#[case("settings.toml", "mode = \"poll\"\npoll_interval_secs = 3\nexcluded = [\"/data/tmp\"]\n")]
#[case("settings.json", r#"{"mode": "poll", "poll_interval_secs": 3, "excluded": ["/data/tmp"]}"#)]
#[case("settings.yaml", "mode: poll\npoll_interval_secs: 3\nexcluded:\n  - /data/tmp\n")]
#[case("settings.yml", "mode: poll\npoll_interval_secs: 3\nexcluded: [/data/tmp]\n")]
fn test_load_by_extension(#[case] name: &str, #[case] content: &str) {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join(name);
    fs::write(&file_path, content).unwrap();

    let loaded: WatchSettings = load_config(&NormalizedPath::new(&file_path)).unwrap();
    assert_eq!(loaded, sample());
}

#[rstest]
#[case("settings.toml")]
#[case("settings.json")]
#[case("settings.yaml")]
fn test_save_then_load(#[case] name: &str) {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("nested").join(name));

    save_config(&path, &sample()).unwrap();
    let loaded: WatchSettings = load_config(&path).unwrap();

    assert_eq!(loaded, sample());
}

#[test]
fn test_unsupported_format() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("settings.ini");
    fs::write(&file_path, "mode=poll").unwrap();

    let result: fim_fs::Result<WatchSettings> = load_config(&NormalizedPath::new(&file_path));
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn test_parse_error_names_format() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("settings.toml");
    fs::write(&file_path, "mode = ").unwrap();

    let result: fim_fs::Result<WatchSettings> = load_config(&NormalizedPath::new(&file_path));
    match result {
        Err(Error::ConfigParse { format, .. }) => assert_eq!(format, "TOML"),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_missing_file_is_not_found() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("absent.toml"));
    let result: fim_fs::Result<WatchSettings> = load_config(&path);
    assert!(result.unwrap_err().is_not_found());
}

#[rstest]
#[case("monitor.TOML", ConfigFormat::Toml)]
#[case("monitor.Json", ConfigFormat::Json)]
#[case("monitor.yml", ConfigFormat::Yaml)]
fn test_format_follows_extension_case_insensitively(#[case] name: &str, #[case] expected: ConfigFormat) {
    assert_eq!(ConfigFormat::from_path(&NormalizedPath::new(name)).unwrap(), expected);
}

#[test]
fn test_unsupported_save_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("settings.ini"));

    let result = save_config(&path, &sample());
    assert!(matches!(result, Err(Error::UnsupportedFormat { ref extension }) if extension == "ini"));
    assert!(!path.exists());
}
