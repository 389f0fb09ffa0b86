//! Configuration sources: environment variables and YAML/JSON files.
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::config::{get_env_opt, get_env_parse_opt, load_config_file};
//!
//! let base_url = get_env_opt("TASKWATCH_BASE_URL");
//! let interval: Option<u64> = get_env_parse_opt("TASKWATCH_INTERVAL_MS")?;
//! let config: FileConfig = load_config_file("taskwatch.yaml")?;
//! ```

use crate::error::{Result, UtilsError};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Read an environment variable; unset and blank are both `None`.
pub fn get_env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an environment variable when it is set.
///
/// A value that does not parse is an error, never silently skipped.
pub fn get_env_parse_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = get_env_opt(key) else {
        return Ok(None);
    };

    raw.trim().parse::<T>().map(Some).map_err(|e| {
        UtilsError::ConfigError(format!("{}={:?} is not valid: {}", key, raw, e))
    })
}

/// Config file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from the extension (`yaml`, `yml`, `json`, any case).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                UtilsError::ConfigError(format!("{} has no file extension", path.display()))
            })?;

        match extension.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            other => Err(UtilsError::ConfigError(format!(
                "Unsupported config file extension: {}",
                other
            ))),
        }
    }

    /// Deserialize `content` written in this format.
    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| UtilsError::ConfigError(format!("Invalid YAML config: {}", e))),
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| UtilsError::ConfigError(format!("Invalid JSON config: {}", e))),
        }
    }
}

/// Load a config file, choosing YAML or JSON by extension.
pub fn load_config_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;

    debug!(path = %path.display(), ?format, "Loading config file");

    let content = std::fs::read_to_string(path)?;
    format.parse(&content).map_err(|e| match e {
        UtilsError::ConfigError(msg) => {
            UtilsError::ConfigError(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}
