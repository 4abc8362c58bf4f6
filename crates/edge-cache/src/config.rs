//! Cache proxy configuration.

use edge_core::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::partition::CacheGeneration;
use crate::rule::{default_rules, CacheRule, IMAGE_CDN_HOSTS};

/// Configuration for [`crate::EdgeCacheProxy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Origin the storefront is served from. Requests to it are same-origin.
    pub origin: Url,
    /// Cache family name.
    pub family: String,
    /// Current cache generation.
    pub version: String,
    /// External hosts whose requests are handled (`*.` patterns allowed).
    pub allowed_hosts: Vec<String>,
    /// Page paths fetched on install.
    pub precache_urls: Vec<String>,
    /// Partition holding precached pages.
    pub precache_partition: String,
    /// Page served to navigations when offline.
    pub offline_page: String,
    /// Interval of the background sweep in seconds.
    pub sweep_interval_secs: u64,
    /// Ordered rule table; the first match wins.
    pub rules: Vec<CacheRule>,
    /// Rule applied when nothing in the table matches.
    pub fallback_rule: CacheRule,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut allowed_hosts = vec![
            "fonts.googleapis.com".to_string(),
            "fonts.gstatic.com".to_string(),
        ];
        allowed_hosts.extend(IMAGE_CDN_HOSTS.iter().map(|h| h.to_string()));

        Self {
            origin: default_origin(),
            family: "storefront-cache".to_string(),
            version: "v1".to_string(),
            allowed_hosts,
            precache_urls: ["/", "/offline", "/products", "/cart"]
                .iter()
                .map(|u| u.to_string())
                .collect(),
            precache_partition: "precache".to_string(),
            offline_page: "/offline".to_string(),
            sweep_interval_secs: 3_600,
            rules: default_rules(),
            fallback_rule: CacheRule::fallback(),
        }
    }
}

fn default_origin() -> Url {
    Url::parse("http://localhost:3000").unwrap_or_else(|_| unreachable!("static origin parses"))
}

impl CacheConfig {
    /// Create a config for an origin with default rules.
    pub fn for_origin(origin: Url) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    /// Set the cache generation.
    pub fn with_generation(mut self, family: impl Into<String>, version: impl Into<String>) -> Self {
        self.family = family.into();
        self.version = version.into();
        self
    }

    /// Replace the rule table.
    pub fn with_rules(mut self, rules: Vec<CacheRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the precache list.
    pub fn with_precache_urls(mut self, urls: Vec<String>) -> Self {
        self.precache_urls = urls;
        self
    }

    /// The configured generation.
    pub fn generation(&self) -> CacheGeneration {
        CacheGeneration::new(&self.family, &self.version)
    }

    /// Resolve a path against the origin.
    pub fn resolve(&self, path: &str) -> ConfigResult<Url> {
        self.origin
            .join(path)
            .map_err(|e| ConfigError::Invalid(format!("cannot resolve {} against origin: {}", path, e)))
    }

    /// Smallest entry bound configured for a rule partition.
    pub fn max_entries_for(&self, partition: &str) -> Option<usize> {
        self.rules
            .iter()
            .chain(std::iter::once(&self.fallback_rule))
            .filter(|r| r.strategy.uses_cache() && r.partition == partition)
            .map(|r| r.max_entries)
            .min()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "cache origin must be http(s): {}",
                self.origin
            )));
        }

        for (field, value) in [("family", &self.family), ("version", &self.version)] {
            if value.is_empty() || value.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "cache {} must be non-empty and contain no '/': {:?}",
                    field, value
                )));
            }
        }

        if self.version.contains('-') {
            return Err(ConfigError::Invalid(format!(
                "cache version must not contain '-': {:?}",
                self.version
            )));
        }

        if self.precache_partition.is_empty() {
            return Err(ConfigError::Invalid("precache partition is empty".to_string()));
        }

        for url in self.precache_urls.iter().chain(std::iter::once(&self.offline_page)) {
            self.resolve(url)?;
        }

        let mut catch_all: Option<usize> = None;
        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(at) = catch_all {
                return Err(ConfigError::Invalid(format!(
                    "rule {} is unreachable after catch-all rule {}",
                    index, at
                )));
            }
            validate_rule(index, rule)?;
            if rule.pattern.is_catch_all() {
                catch_all = Some(index);
            }
        }

        validate_rule(self.rules.len(), &self.fallback_rule)
    }
}

fn validate_rule(index: usize, rule: &CacheRule) -> ConfigResult<()> {
    if !rule.strategy.uses_cache() {
        return Ok(());
    }
    if rule.partition.is_empty() || rule.partition.contains('/') {
        return Err(ConfigError::Invalid(format!(
            "rule {} ({}) needs a partition name without '/'",
            index, rule.strategy
        )));
    }
    if rule.max_entries == 0 {
        return Err(ConfigError::Invalid(format!(
            "rule {} ({}) has max_entries = 0",
            index, rule.strategy
        )));
    }
    Ok(())
}
