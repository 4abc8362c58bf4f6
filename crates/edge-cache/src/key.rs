//! Cache key composition.

use serde::{Deserialize, Serialize};
use url::Url;

/// A cache key uniquely identifying a cached response within a partition.
///
/// Keys are normalized request URLs: scheme and host lower case (as parsed),
/// default port elided, fragment stripped, query kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a cache key from a request URL.
    pub fn from_url(url: &Url) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        Self(normalized.into())
    }

    /// Parse and normalize a URL string.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::from_url(&Url::parse(url)?))
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
