//! Settings files in TOML, JSON or YAML, chosen by file extension

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, NormalizedPath, Result, io};

/// Serialization format of a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.toml`, `.json`, `.yaml` and `.yml`, case-insensitive.
    pub fn from_path(path: &NormalizedPath) -> Result<Self> {
        let extension = path.extension().unwrap_or("");
        match extension.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> std::result::Result<T, String> {
        match self {
            Self::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    fn encode<T: Serialize>(&self, value: &T) -> std::result::Result<String, String> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
    }
}

/// Read and decode a settings file. A missing file is a not-found error.
pub fn load_config<T: DeserializeOwned>(path: &NormalizedPath) -> Result<T> {
    let format = ConfigFormat::from_path(path)?;
    let text = io::read_text(path)?;
    format.decode(&text).map_err(|message| Error::ConfigParse {
        path: path.to_native(),
        format: format.name().into(),
        message,
    })
}

/// Encode `value` and replace the settings file atomically, creating parent
/// directories as needed.
pub fn save_config<T: Serialize>(path: &NormalizedPath, value: &T) -> Result<()> {
    let format = ConfigFormat::from_path(path)?;
    let text = format.encode(value).map_err(|message| Error::ConfigSerialize {
        path: path.to_native(),
        format: format.name().into(),
        message,
    })?;
    io::write_atomic(path, text.as_bytes())
}
