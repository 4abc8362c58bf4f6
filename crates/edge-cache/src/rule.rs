//! Cache strategies and the rule table.

use edge_core::{DAY_MS, HOUR_MS, MINUTE_MS};
use serde::{Deserialize, Serialize};

use crate::pattern::UrlPattern;

/// How a matched request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Serve a fresh cached entry, otherwise fetch and store.
    CacheFirst,
    /// Fetch and store, falling back to a fresh cached entry.
    NetworkFirst,
    /// Serve a fresh cached entry while refreshing it in the background.
    StaleWhileRevalidate,
    /// Always fetch, never store.
    NetworkOnly,
    /// Only serve from cache.
    CacheOnly,
}

impl CacheStrategy {
    /// Whether this strategy reads or writes a partition.
    pub fn uses_cache(&self) -> bool {
        !matches!(self, Self::NetworkOnly)
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CacheFirst => write!(f, "cache-first"),
            Self::NetworkFirst => write!(f, "network-first"),
            Self::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
            Self::NetworkOnly => write!(f, "network-only"),
            Self::CacheOnly => write!(f, "cache-only"),
        }
    }
}

/// A single entry of the ordered rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRule {
    /// Which requests the rule applies to.
    pub pattern: UrlPattern,
    /// Strategy used for matched requests.
    pub strategy: CacheStrategy,
    /// Partition name, without the generation prefix.
    #[serde(default)]
    pub partition: String,
    /// Maximum age of a cached entry in milliseconds.
    #[serde(default)]
    pub max_age_ms: u64,
    /// Maximum number of entries kept in the partition.
    #[serde(default)]
    pub max_entries: usize,
}

impl CacheRule {
    /// Create a new rule.
    pub fn new(
        pattern: UrlPattern,
        strategy: CacheStrategy,
        partition: impl Into<String>,
        max_age_ms: u64,
        max_entries: usize,
    ) -> Self {
        Self {
            pattern,
            strategy,
            partition: partition.into(),
            max_age_ms,
            max_entries,
        }
    }

    /// Create a rule that always goes to the network.
    pub fn network_only(pattern: UrlPattern) -> Self {
        Self::new(pattern, CacheStrategy::NetworkOnly, "", 0, 0)
    }

    /// The rule applied when nothing in the table matches.
    pub fn fallback() -> Self {
        Self::new(
            UrlPattern::path_prefix("/"),
            CacheStrategy::NetworkFirst,
            "runtime",
            HOUR_MS,
            50,
        )
    }
}

/// File extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico"];

/// File extensions treated as fonts.
pub const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];

/// Image CDN hosts served through the image rule.
pub const IMAGE_CDN_HOSTS: &[&str] = &["images.unsplash.com", "res.cloudinary.com", "cdn.shopify.com"];

/// The storefront rule table, in match order.
pub fn default_rules() -> Vec<CacheRule> {
    let mut images = vec![UrlPattern::extensions(IMAGE_EXTENSIONS)];
    images.extend(IMAGE_CDN_HOSTS.iter().map(|h| UrlPattern::host(*h)));

    vec![
        CacheRule::new(
            UrlPattern::path_prefix("/_next/static/"),
            CacheStrategy::CacheFirst,
            "static",
            365 * DAY_MS,
            200,
        ),
        CacheRule::new(
            UrlPattern::AnyOf(images),
            CacheStrategy::CacheFirst,
            "images",
            30 * DAY_MS,
            100,
        ),
        CacheRule::new(
            UrlPattern::AnyOf(vec![
                UrlPattern::extensions(FONT_EXTENSIONS),
                UrlPattern::host("fonts.gstatic.com"),
                UrlPattern::host("fonts.googleapis.com"),
            ]),
            CacheStrategy::CacheFirst,
            "fonts",
            365 * DAY_MS,
            30,
        ),
        CacheRule::new(
            UrlPattern::path_prefix("/api/products"),
            CacheStrategy::StaleWhileRevalidate,
            "api",
            5 * MINUTE_MS,
            50,
        ),
        CacheRule::network_only(UrlPattern::path_prefix("/api/auth")),
        CacheRule::new(
            UrlPattern::path_prefix("/api/"),
            CacheStrategy::NetworkFirst,
            "api",
            5 * MINUTE_MS,
            100,
        ),
        CacheRule::new(
            UrlPattern::Navigation,
            CacheStrategy::NetworkFirst,
            "pages",
            24 * HOUR_MS,
            50,
        ),
    ]
}
