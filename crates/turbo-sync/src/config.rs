//! Queue configuration.

use edge_core::{ConfigError, ConfigResult, DAY_MS};
use edge_data::BackoffStrategy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::transport::ReplayEndpoints;

/// Configuration for [`crate::OfflineQueue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Base URL replay endpoints are resolved against.
    pub base_url: Url,
    /// Endpoint per mutation kind.
    pub endpoints: ReplayEndpoints,
    /// Failed attempts after which a mutation is dropped.
    pub max_attempts: u32,
    /// Minimum wait between attempts of the same mutation.
    pub backoff: BackoffStrategy,
    /// Keep dropped mutations in the dead-letter partition.
    pub dead_letter: bool,
    /// Records older than this many days are purged by cleanup.
    pub retention_days: u64,
    /// Interval of the safety-net drain in seconds.
    pub drain_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:3000")
                .unwrap_or_else(|_| unreachable!("static base url parses")),
            endpoints: ReplayEndpoints::default(),
            max_attempts: 3,
            backoff: BackoffStrategy::None,
            dead_letter: true,
            retention_days: 7,
            drain_interval_secs: 300,
        }
    }
}

impl QueueConfig {
    /// Create a config for a base URL.
    pub fn for_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Set the backoff between attempts.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enable or disable dead-lettering.
    pub fn with_dead_letter(mut self, enabled: bool) -> Self {
        self.dead_letter = enabled;
        self
    }

    /// Retention window in milliseconds.
    pub fn retention_ms(&self) -> u64 {
        self.retention_days.saturating_mul(DAY_MS)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("queue max_attempts must be at least 1".to_string()));
        }
        if self.retention_days == 0 {
            return Err(ConfigError::Invalid("queue retention_days must be at least 1".to_string()));
        }
        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "queue base_url cannot be a base: {}",
                self.base_url
            )));
        }
        for (kind, path) in self.endpoints.iter() {
            if path.is_empty() {
                return Err(ConfigError::Invalid(format!("empty endpoint for {}", kind)));
            }
            self.base_url.join(path).map_err(|e| {
                ConfigError::Invalid(format!("endpoint {} for {} is invalid: {}", path, kind, e))
            })?;
        }
        Ok(())
    }
}
