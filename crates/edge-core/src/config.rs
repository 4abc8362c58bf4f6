//! Configuration file loading.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} config {path}: {message}")]
    Parse {
        path: String,
        format: ConfigFormat,
        message: String,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// On-disk configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick a format from the file extension (`.json` → JSON, else TOML).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Toml => write!(f, "TOML"),
            Self::Json => write!(f, "JSON"),
        }
    }
}

/// Parse configuration text in the given format.
pub fn parse_str<T: DeserializeOwned>(
    content: &str,
    format: ConfigFormat,
    origin: &str,
) -> ConfigResult<T> {
    let parsed = match format {
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: origin.to_string(),
        format,
        message,
    })
}

/// Load a configuration file.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    parse_str(&content, ConfigFormat::from_path(path), &path.display().to_string())
}

/// Render configuration in the given format.
pub fn to_string<T: Serialize>(value: &T, format: ConfigFormat) -> ConfigResult<String> {
    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string()))
        }
        ConfigFormat::Toml => {
            toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string()))
        }
    }
}

/// Save a configuration file.
pub fn save_file<T: Serialize>(value: &T, path: impl AsRef<Path>) -> ConfigResult<()> {
    let path = path.as_ref();
    let content = to_string(value, ConfigFormat::from_path(path))?;

    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}
