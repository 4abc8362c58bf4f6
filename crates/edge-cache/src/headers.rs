//! Cache bookkeeping headers and freshness.

use edge_core::Timestamp;
use edge_data::HttpResponse;
use http::HeaderValue;
use serde::{Deserialize, Serialize};

/// Header names written by the proxy.
pub mod header_names {
    /// When the entry was stored, in milliseconds since the Unix epoch.
    pub const X_CACHED_DATE: &str = "x-cached-date";
    /// How the response was produced (HIT, MISS, STALE, BYPASS, OFFLINE).
    pub const X_CACHE_STATUS: &str = "x-cache-status";
}

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Fresh cache entry.
    Hit,
    /// Network response.
    Miss,
    /// Expired cache entry served because the network failed.
    Stale,
    /// No cache involvement.
    Bypass,
    /// Offline fallback page.
    Offline,
}

impl CacheStatus {
    /// The header value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Stale => "STALE",
            Self::Bypass => "BYPASS",
            Self::Offline => "OFFLINE",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read the stored-at timestamp of a cached response.
pub fn cached_date(response: &HttpResponse) -> Option<Timestamp> {
    response
        .header(header_names::X_CACHED_DATE)?
        .trim()
        .parse()
        .ok()
}

/// Stamp the stored-at timestamp onto a response.
pub fn stamp_cached_date(response: &mut HttpResponse, now: Timestamp) {
    response
        .headers
        .insert(header_names::X_CACHED_DATE, HeaderValue::from(now));
}

/// Stamp the cache status onto a response.
pub fn stamp_cache_status(response: &mut HttpResponse, status: CacheStatus) {
    response.headers.insert(
        header_names::X_CACHE_STATUS,
        HeaderValue::from_static(status.as_str()),
    );
}

/// Whether a cached response is expired at `now`.
///
/// The boundary is inclusive: an entry is expired once exactly `max_age_ms`
/// has elapsed. A missing or unparsable timestamp counts as expired.
pub fn is_expired(response: &HttpResponse, max_age_ms: u64, now: Timestamp) -> bool {
    match cached_date(response) {
        Some(cached_at) => now.saturating_sub(cached_at) >= max_age_ms,
        None => true,
    }
}

/// Age of a cached response in milliseconds, if it carries a timestamp.
pub fn age_ms(response: &HttpResponse, now: Timestamp) -> Option<u64> {
    cached_date(response).map(|cached_at| now.saturating_sub(cached_at))
}
