//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use edge_cache::CacheConfig;
use edge_core::{ConfigFormat, ConfigResult};
use edge_observability::LogConfig;
use serde::{Deserialize, Serialize};
use turbo_store::StorageConfig;
use turbo_sync::QueueConfig;

/// File names searched for, in order, from the working directory upwards.
pub const CONFIG_NAMES: [&str; 3] = ["edge.toml", ".edge.toml", "edge.json"];

/// Configuration of the offline layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Edge cache proxy.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Offline mutation queue.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Where cache and queue data live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LogConfig,
}

impl OfflineConfig {
    /// Load config from a file. `.json` is parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        edge_core::load_file(path).with_context(|| format!("Failed to load config: {}", path.display()))
    }

    /// Save config to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        edge_core::save_file(self, path).with_context(|| format!("Failed to save config: {}", path.display()))
    }

    /// Render the config in a format.
    pub fn render(&self, format: ConfigFormat) -> Result<String> {
        Ok(edge_core::to_string(self, format)?)
    }

    /// Validate every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.cache.validate()?;
        self.queue.validate()
    }
}

/// Generate a default edge.toml.
pub fn generate_default_config() -> Result<String> {
    let body = OfflineConfig::default().render(ConfigFormat::Toml)?;
    Ok(format!(
        "# Storefront offline layer configuration\n#\n\
         # Rules are matched top to bottom; the first match wins.\n\
         # Bump cache.version to retire every cached partition on the next activate.\n\n{}",
        body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let rendered = generate_default_config().unwrap();
        let parsed: OfflineConfig = edge_core::parse_str(&rendered, ConfigFormat::Toml, "edge.toml").unwrap();
        assert_eq!(parsed, OfflineConfig::default());
        parsed.validate().unwrap();
    }

    #[test]
    fn test_sections_are_optional() {
        let parsed: OfflineConfig = edge_core::parse_str(
            "[queue]\nmax_attempts = 5\n\n[storage]\nkind = \"memory\"\n",
            ConfigFormat::Toml,
            "edge.toml",
        )
        .unwrap();

        assert_eq!(parsed.queue.max_attempts, 5);
        assert_eq!(parsed.queue.retention_days, 7);
        assert_eq!(parsed.storage, StorageConfig::Memory);
        assert_eq!(parsed.cache, CacheConfig::default());
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge.json");

        let mut config = OfflineConfig::default();
        config.cache.version = "v7".to_string();
        config.save(&path).unwrap();

        assert_eq!(OfflineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = OfflineConfig::default();
        config.queue.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
