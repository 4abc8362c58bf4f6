//! Named cache partitions over the shared store.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use edge_core::Timestamp;
use edge_data::HttpResponse;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use turbo_store::{Store, StoreError, StoreResult};

use crate::headers::stamp_cached_date;
use crate::key::CacheKey;

/// Cache generation: a family name plus a version.
///
/// Live partitions are named `{family}-{version}/{partition}`. Bumping the
/// version makes every older partition of the family eligible for the
/// activation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGeneration {
    /// Family name shared by all generations.
    pub family: String,
    /// Current version tag.
    pub version: String,
}

impl CacheGeneration {
    /// Create a new generation.
    pub fn new(family: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            version: version.into(),
        }
    }

    /// The prefix carried by every live partition.
    pub fn prefix(&self) -> String {
        format!("{}-{}/", self.family, self.version)
    }

    /// Full store partition name for a rule partition.
    pub fn partition_name(&self, partition: &str) -> String {
        format!("{}{}", self.prefix(), partition)
    }

    /// Whether a store partition belongs to this family (any version).
    ///
    /// Versions never contain `-`, so `shop` does not own `shop-cache-v1/x`.
    pub fn owns(&self, name: &str) -> bool {
        name.strip_prefix(self.family.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.split_once('/'))
            .is_some_and(|(version, _)| !version.is_empty() && !version.contains('-'))
    }

    /// The rule partition name if `name` is a live partition.
    pub fn strip<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix().as_str())
    }

    /// Whether a store partition belongs to the current generation.
    pub fn is_current(&self, name: &str) -> bool {
        self.strip(name).is_some()
    }
}

impl std::fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.family, self.version)
    }
}

/// Serialized form of a cached response.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredResponse {
    status: u16,
    headers: Vec<(String, String)>,
    /// Base64 encoded body.
    body: String,
}

impl StoredResponse {
    fn encode(response: &HttpResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            status: response.status.as_u16(),
            headers,
            body: STANDARD.encode(&response.body),
        }
    }

    fn decode(self, partition: &str, key: &str) -> StoreResult<HttpResponse> {
        let corrupt = |message: String| StoreError::CorruptRecord {
            partition: partition.to_string(),
            key: key.to_string(),
            message,
        };

        let status = StatusCode::from_u16(self.status).map_err(|e| corrupt(e.to_string()))?;
        let body = STANDARD.decode(&self.body).map_err(|e| corrupt(e.to_string()))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| corrupt(e.to_string()))?;
            let value = HeaderValue::from_str(&value).map_err(|e| corrupt(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(HttpResponse::new(status, headers, body))
    }
}

/// A bounded bucket of cached responses keyed by normalized URL.
///
/// Entries are kept in insertion order; writes beyond `max_entries` evict
/// the oldest entries first.
#[derive(Debug, Clone)]
pub struct CachePartition {
    store: Store,
    name: String,
    max_entries: usize,
}

impl CachePartition {
    /// Open a partition. Nothing is written until the first `put`.
    pub fn new(store: Store, name: impl Into<String>, max_entries: usize) -> Self {
        Self {
            store,
            name: name.into(),
            max_entries,
        }
    }

    /// Full store partition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry bound enforced after writes.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up a cached response.
    pub async fn get(&self, key: &CacheKey) -> StoreResult<Option<HttpResponse>> {
        match self.store.get::<StoredResponse>(&self.name, key.as_str()).await? {
            Some(stored) => stored.decode(&self.name, key.as_str()).map(Some),
            None => Ok(None),
        }
    }

    /// Store a response stamped with `now`, then enforce the entry bound.
    ///
    /// Returns the evicted keys.
    pub async fn put(
        &self,
        key: &CacheKey,
        response: &HttpResponse,
        now: Timestamp,
    ) -> StoreResult<Vec<String>> {
        let mut stamped = response.clone();
        stamp_cached_date(&mut stamped, now);

        self.store
            .put(&self.name, key.as_str(), &StoredResponse::encode(&stamped))
            .await?;
        self.store.evict_oldest(&self.name, self.max_entries).await
    }

    /// Remove an entry.
    pub async fn delete(&self, key: &CacheKey) -> StoreResult<bool> {
        self.store.delete(&self.name, key.as_str()).await
    }

    /// Cached keys, oldest first.
    pub async fn keys(&self) -> StoreResult<Vec<String>> {
        self.store.keys(&self.name).await
    }

    /// Number of cached entries.
    pub async fn len(&self) -> StoreResult<usize> {
        self.store.count(&self.name).await
    }

    /// Whether the partition holds no entries.
    pub async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::cached_date;

    fn key(path: &str) -> CacheKey {
        CacheKey::parse(&format!("https://shop.test{}", path)).unwrap()
    }

    #[test]
    fn test_generation_naming() {
        let generation = CacheGeneration::new("storefront-cache", "v3");
        assert_eq!(generation.prefix(), "storefront-cache-v3/");
        assert_eq!(generation.partition_name("static"), "storefront-cache-v3/static");
        assert_eq!(generation.strip("storefront-cache-v3/static"), Some("static"));
        assert!(generation.is_current("storefront-cache-v3/api"));
        assert!(!generation.is_current("storefront-cache-v2/api"));
    }

    #[test]
    fn test_generation_ownership_is_family_scoped() {
        let generation = CacheGeneration::new("storefront-cache", "v3");
        assert!(generation.owns("storefront-cache-v2/static"));
        assert!(generation.owns("storefront-cache-v3/static"));
        assert!(!generation.owns("sync_queue"));
        assert!(!generation.owns("other-cache-v1/static"));
        assert!(!generation.owns("storefront-cachev2/static"));
        assert!(!generation.owns("storefront-cache-/static"));
    }

    #[test]
    fn test_generation_ownership_ignores_longer_family() {
        let shop = CacheGeneration::new("shop", "v2");
        assert!(shop.owns("shop-v1/static"));
        assert!(!shop.owns("shop-cache-v1/static"));
        assert!(!shop.owns("shop-cache-v1/api"));

        let longer = CacheGeneration::new("shop-cache", "v1");
        assert!(longer.owns("shop-cache-v1/static"));
        assert!(!longer.owns("shop-v1/static"));
    }

    #[tokio::test]
    async fn test_put_get_preserves_response() {
        let partition = CachePartition::new(Store::in_memory(), "c-v1/pages", 10);
        let response = HttpResponse::html(StatusCode::OK, "<h1>home</h1>");

        partition.put(&key("/"), &response, 42).await.unwrap();
        let cached = partition.get(&key("/")).await.unwrap().unwrap();

        assert_eq!(cached.status, StatusCode::OK);
        assert_eq!(cached.body, b"<h1>home</h1>");
        assert_eq!(cached.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(cached_date(&cached), Some(42));
    }

    #[tokio::test]
    async fn test_fifo_eviction() {
        let partition = CachePartition::new(Store::in_memory(), "c-v1/api", 2);

        partition.put(&key("/a"), &HttpResponse::ok("a"), 1).await.unwrap();
        partition.put(&key("/b"), &HttpResponse::ok("b"), 2).await.unwrap();
        let evicted = partition.put(&key("/c"), &HttpResponse::ok("c"), 3).await.unwrap();

        assert_eq!(evicted, vec![key("/a").to_string()]);
        assert!(partition.get(&key("/a")).await.unwrap().is_none());
        assert!(partition.get(&key("/b")).await.unwrap().is_some());
        assert!(partition.get(&key("/c")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reads_do_not_refresh_position() {
        let partition = CachePartition::new(Store::in_memory(), "c-v1/api", 2);

        partition.put(&key("/a"), &HttpResponse::ok("a"), 1).await.unwrap();
        partition.put(&key("/b"), &HttpResponse::ok("b"), 2).await.unwrap();
        partition.get(&key("/a")).await.unwrap();
        partition.put(&key("/c"), &HttpResponse::ok("c"), 3).await.unwrap();

        assert!(partition.get(&key("/a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bound_holds_for_any_write_sequence() {
        let partition = CachePartition::new(Store::in_memory(), "c-v1/images", 3);
        for i in 0..20u64 {
            let path = format!("/img/{}.png", i % 7);
            partition.put(&key(&path), &HttpResponse::ok("x"), i).await.unwrap();
            assert!(partition.len().await.unwrap() <= 3);
        }
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let store = Store::in_memory();
        store
            .put("c-v1/api", key("/x").as_str(), &serde_json::json!({"status": 42, "headers": [], "body": ""}))
            .await
            .unwrap();

        let partition = CachePartition::new(store, "c-v1/api", 10);
        assert!(matches!(
            partition.get(&key("/x")).await,
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
