//! Configuration loading for the CLI
//!
//! The API credential comes from a JSON config file, by default
//! `~/.config/shiptrack/config.json` (or the platform equivalent). A
//! missing file, malformed JSON, or an absent/empty key is a fatal error
//! raised before any remote call.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

/// File name looked up inside the platform config directory
const CONFIG_FILE: &str = "config.json";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config path was given and the platform has no config directory
    #[error("could not determine a configuration directory; pass --config explicitly")]
    NoConfigDir,

    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },

    /// The config file is not valid JSON
    #[error("config file {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },

    /// The credential key is absent or empty
    #[error("config file {path} is missing a non-empty \"aftership_api_key\"")]
    MissingKey { path: String },
}

/// Raw config file shape; validated into `Settings` after parsing
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    aftership_api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Credential sent with every API request
    pub aftership_api_key: String,
    /// Optional API base URL override (mock server, proxy)
    pub base_url: Option<String>,
}

impl Settings {
    /// Loads settings from the given path, or the platform default
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().ok_or(ConfigError::NoConfigDir)?,
        };
        let shown = path.display().to_string();

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            path: shown.clone(),
            source,
        })?;
        let raw: RawSettings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: shown.clone(),
                source,
            })?;

        match raw.aftership_api_key {
            Some(key) if !key.trim().is_empty() => Ok(Settings {
                aftership_api_key: key,
                base_url: raw.base_url,
            }),
            _ => Err(ConfigError::MissingKey { path: shown }),
        }
    }

    /// Default config file location for this platform
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "shiptrack")?;
        Some(project_dirs.config_dir().join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write config");
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(r#"{"aftership_api_key": "secret-key"}"#);

        let settings = Settings::load(Some(file.path())).expect("Load should succeed");
        assert_eq!(settings.aftership_api_key, "secret-key");
        assert!(settings.base_url.is_none());
    }

    #[test]
    fn test_load_config_with_base_url() {
        let file = write_config(
            r#"{"aftership_api_key": "secret-key", "base_url": "http://localhost:9000"}"#,
        );

        let settings = Settings::load(Some(file.path())).expect("Load should succeed");
        assert_eq!(settings.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = Settings::load(Some(Path::new("/nonexistent/shiptrack/config.json")));
        assert!(matches!(result, Err(ConfigError::Unreadable { .. })));
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let file = write_config("{ not json");
        let result = Settings::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Malformed { .. })));
    }

    #[test]
    fn test_absent_key_is_fatal() {
        let file = write_config(r#"{"base_url": "http://localhost:9000"}"#);
        let result = Settings::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_empty_key_is_fatal() {
        let file = write_config(r#"{"aftership_api_key": "  "}"#);
        let result = Settings::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_error_message_names_the_path() {
        let file = write_config("{}");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
