use std::env;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const API_BASE_ENV: &str = "DEEPSCAN_API_URL";
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";
const CONFIG_FILE: &str = "deepscan.json";

/// Optional settings read from `~/.config/deepscan.json`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Service base URL (e.g. "https://detector.example.com"). Falls back to
    /// DEEPSCAN_API_URL, then http://localhost:5000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Per-request timeout. Unset means requests wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// `~/.config/deepscan.json`, when a home directory is known.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join(CONFIG_FILE))
}

/// Loads the config file. A missing file is an empty config.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ClientConfig::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_config() -> Result<ClientConfig, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(ClientConfig::default()),
    }
}

/// Resolve API base URL: flag → config file → env var → default
pub fn resolve_api_base(flag: Option<&str>, config: &ClientConfig) -> String {
    resolve_api_base_with(flag, config, env::var(API_BASE_ENV).ok())
}

fn resolve_api_base_with(
    flag: Option<&str>,
    config: &ClientConfig,
    env_value: Option<String>,
) -> String {
    let non_empty = |s: &&str| !s.trim().is_empty();

    if let Some(url) = flag.filter(non_empty) {
        return url.trim().to_string();
    }
    if let Some(url) = config.api_url.as_deref().filter(non_empty) {
        return url.trim().to_string();
    }
    env_value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_default_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("absent.json")).expect("load");
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn reads_url_and_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"api_url":"http://detector:8080","timeout_secs":90}"#)
            .expect("write config");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.api_url.as_deref(), Some("http://detector:8080"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{not json").expect("write config");

        let err = load_config_from(&path).expect_err("parse error");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("Failed to parse config"));
    }

    #[test]
    fn api_base_precedence() {
        let config = ClientConfig {
            api_url: Some("http://from-config".to_string()),
            timeout_secs: None,
        };
        let env_value = || Some("http://from-env".to_string());

        assert_eq!(
            resolve_api_base_with(Some("http://from-flag"), &config, env_value()),
            "http://from-flag"
        );
        assert_eq!(
            resolve_api_base_with(None, &config, env_value()),
            "http://from-config"
        );
        assert_eq!(
            resolve_api_base_with(Some("  "), &ClientConfig::default(), env_value()),
            "http://from-env"
        );
        assert_eq!(
            resolve_api_base_with(None, &ClientConfig::default(), None),
            DEFAULT_API_BASE
        );
    }
}
