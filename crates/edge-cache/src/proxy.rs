//! The edge cache proxy.

use std::sync::Arc;
use std::time::Duration;

use edge_core::{Clock, ConfigResult, SystemClock};
use edge_data::{Fetcher, HttpRequest};
use edge_observability::{ProxyMetrics, ProxyMetricsSnapshot};
use tokio::sync::RwLock;
use turbo_store::{Store, StoreResult};

use crate::classify::{Classification, RequestClassifier};
use crate::config::CacheConfig;
use crate::error::ProxyResult;
use crate::headers::{stamp_cache_status, CacheStatus};
use crate::key::CacheKey;
use crate::lifecycle::{
    ActivateReport, InstallReport, Lifecycle, PartitionStats, PrecacheFailure, SweepReport, WorkerState,
};
use crate::partition::{CacheGeneration, CachePartition};
use crate::strategy::{FetchOutcome, ProxyShared};

/// Intercepts GET traffic and serves it through the configured strategies.
///
/// Cheap to clone; clones share state, so one clone can run
/// [`EdgeCacheProxy::run_maintenance`] while others handle requests.
#[derive(Clone)]
pub struct EdgeCacheProxy {
    shared: Arc<ProxyShared>,
    classifier: Arc<RequestClassifier>,
    config: Arc<CacheConfig>,
    lifecycle: Arc<RwLock<Lifecycle>>,
}

impl std::fmt::Debug for EdgeCacheProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeCacheProxy")
            .field("generation", &self.shared.generation)
            .field("origin", &self.config.origin.as_str())
            .finish_non_exhaustive()
    }
}

impl EdgeCacheProxy {
    /// Create a proxy. The configuration is validated first.
    pub fn new(config: CacheConfig, store: Store, fetcher: Arc<dyn Fetcher>) -> ConfigResult<Self> {
        config.validate()?;

        let generation = config.generation();
        let precache = CachePartition::new(
            store.clone(),
            generation.partition_name(&config.precache_partition),
            config.precache_urls.len().max(1),
        );
        let offline_page = CacheKey::from_url(&config.resolve(&config.offline_page)?);

        let shared = ProxyShared {
            fetcher,
            store,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(ProxyMetrics::new()),
            generation,
            precache,
            offline_page,
        };

        Ok(Self {
            shared: Arc::new(shared),
            classifier: Arc::new(RequestClassifier::from_config(&config)),
            config: Arc::new(config),
            lifecycle: Arc::new(RwLock::new(Lifecycle::default())),
        })
    }

    /// Use a different clock.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let shared = ProxyShared {
            clock,
            ..(*self.shared).clone()
        };
        Self {
            shared: Arc::new(shared),
            ..self
        }
    }

    /// The configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The current cache generation.
    pub fn generation(&self) -> &CacheGeneration {
        &self.shared.generation
    }

    /// Classify a request without handling it.
    pub fn classify<'a>(&'a self, request: &HttpRequest) -> Classification<'a> {
        self.classifier.classify(request)
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> ProxyMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state
    }

    /// Whether the proxy has claimed its clients.
    pub async fn is_claimed(&self) -> bool {
        self.lifecycle.read().await.claimed
    }

    /// Handle an intercepted request.
    ///
    /// The response carries an `x-cache-status` header. Errors are returned
    /// only when neither cache nor network can answer.
    pub async fn handle_fetch(&self, request: &HttpRequest) -> ProxyResult<FetchOutcome> {
        let result = match self.classifier.classify(request) {
            Classification::Bypass(reason) => {
                tracing::trace!(url = %request.url, %reason, "bypassing proxy");
                self.shared.pass_through(request).await
            }
            Classification::Rule { rule, .. } => self.shared.execute(rule, request).await,
        };

        let mut outcome = result?;
        self.record(outcome.status);
        stamp_cache_status(&mut outcome.response, outcome.status);
        tracing::debug!(
            url = %request.url,
            status = %outcome.status,
            http_status = outcome.response.status.as_u16(),
            "handled fetch"
        );
        Ok(outcome)
    }

    fn record(&self, status: CacheStatus) {
        let metrics = &self.shared.metrics;
        match status {
            CacheStatus::Hit => metrics.record_hit(),
            CacheStatus::Miss => metrics.record_miss(),
            CacheStatus::Stale => metrics.record_stale(),
            CacheStatus::Bypass => metrics.record_bypass(),
            CacheStatus::Offline => metrics.record_offline_fallback(),
        }
    }

    /// Precache the critical pages.
    ///
    /// Each URL is fetched independently; a failure is recorded in the report
    /// and does not stop the others.
    pub async fn install(&self) -> InstallReport {
        self.lifecycle.write().await.transition(WorkerState::Installing);

        let mut report = InstallReport::default();
        for path in &self.config.precache_urls {
            match self.precache_one(path).await {
                Ok(url) => report.cached.push(url),
                Err(reason) => {
                    tracing::warn!(url = %path, %reason, "precache failed");
                    report.failed.push(PrecacheFailure {
                        url: path.clone(),
                        reason,
                    });
                }
            }
        }

        self.lifecycle.write().await.transition(WorkerState::Installed);
        tracing::info!(
            generation = %self.shared.generation,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete"
        );
        report
    }

    async fn precache_one(&self, path: &str) -> Result<String, String> {
        let url = self.config.resolve(path).map_err(|e| e.to_string())?;
        let request = HttpRequest::navigate(url.as_str()).map_err(|e| e.to_string())?;
        let response = self.shared.fetcher.fetch(&request).await.map_err(|e| e.to_string())?;

        if !response.is_success() {
            return Err(format!("HTTP {}", response.status.as_u16()));
        }

        let key = CacheKey::from_url(&url);
        self.shared
            .precache
            .put(&key, &response, self.shared.clock.now_ms())
            .await
            .map_err(|e| e.to_string())?;
        Ok(url.to_string())
    }

    /// Delete partitions of older generations and claim clients.
    pub async fn activate(&self) -> StoreResult<ActivateReport> {
        let previous = {
            let mut lifecycle = self.lifecycle.write().await;
            let previous = lifecycle.state;
            lifecycle.transition(WorkerState::Activating);
            previous
        };

        let deleted = match self.delete_old_generations().await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.lifecycle.write().await.transition(previous);
                return Err(e);
            }
        };

        self.lifecycle.write().await.claim();
        tracing::info!(
            generation = %self.shared.generation,
            deleted = deleted.len(),
            "activated and claimed clients"
        );

        Ok(ActivateReport {
            deleted,
            claimed: true,
        })
    }

    async fn delete_old_generations(&self) -> StoreResult<Vec<String>> {
        let generation = &self.shared.generation;
        let mut deleted = Vec::new();

        for name in self.shared.store.partitions().await? {
            if generation.owns(&name) && !generation.is_current(&name) {
                if self.shared.store.delete_partition(&name).await? {
                    tracing::debug!(partition = %name, "deleted old cache partition");
                }
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Enforce every live partition's entry bound.
    ///
    /// Uses the smallest `max_entries` configured for the partition name.
    pub async fn sweep(&self) -> StoreResult<SweepReport> {
        let mut report = SweepReport::default();

        for name in self.shared.store.partitions().await? {
            let Some(partition) = self.shared.generation.strip(&name) else {
                continue;
            };
            let Some(max_entries) = self.config.max_entries_for(partition) else {
                continue;
            };

            let evicted = self.shared.store.evict_oldest(&name, max_entries).await?;
            report.partitions += 1;
            report.evicted += evicted.len();
        }

        if report.evicted > 0 {
            self.shared.metrics.record_evictions(report.evicted);
        }
        tracing::debug!(partitions = report.partitions, evicted = report.evicted, "sweep complete");
        Ok(report)
    }

    /// Sweep forever at the given interval. Errors are logged.
    ///
    /// The first sweep runs after one full interval.
    pub async fn run_maintenance(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                tracing::warn!(error = %e, "cache sweep failed");
            }
        }
    }

    /// Entry counts of every partition of this cache family.
    pub async fn partition_stats(&self) -> StoreResult<Vec<PartitionStats>> {
        let generation = &self.shared.generation;
        let mut stats = Vec::new();

        for name in self.shared.store.partitions().await? {
            if !generation.owns(&name) {
                continue;
            }
            let entries = self.shared.store.count(&name).await?;
            let max_entries = generation
                .strip(&name)
                .and_then(|p| self.config.max_entries_for(p));
            stats.push(PartitionStats {
                current: generation.is_current(&name),
                name,
                entries,
                max_entries,
            });
        }

        stats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stats)
    }

    /// Delete every partition of the current generation.
    ///
    /// Returns the number of partitions removed.
    pub async fn clear(&self) -> StoreResult<usize> {
        let mut removed = 0;
        for name in self.shared.store.partitions().await? {
            if self.shared.generation.is_current(&name) && self.shared.store.delete_partition(&name).await? {
                removed += 1;
            }
        }
        tracing::info!(generation = %self.shared.generation, removed, "cache cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use edge_core::{ManualClock, HOUR_MS};
    use edge_data::{FetchError, HttpResponse};
    use http::{Method, StatusCode};
    use url::Url;

    use crate::headers::header_names::X_CACHE_STATUS;
    use crate::pattern::UrlPattern;
    use crate::rule::{CacheRule, CacheStrategy};
    use turbo_store::{StoreBackend, StoreError, StoreResult};

    /// Programmable fake network.
    #[derive(Default)]
    struct FakeNetwork {
        online: AtomicBool,
        calls: AtomicUsize,
        bodies: Mutex<HashMap<String, (u16, String)>>,
    }

    impl FakeNetwork {
        fn online() -> Arc<Self> {
            let network = Self::default();
            network.online.store(true, Ordering::SeqCst);
            Arc::new(network)
        }

        fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        fn serve(&self, path: &str, status: u16, body: &str) {
            self.bodies
                .lock()
                .unwrap()
                .insert(path.to_string(), (status, body.to_string()));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeNetwork {
        async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.online.load(Ordering::SeqCst) {
                return Err(FetchError::Connection("offline".to_string()));
            }

            let (status, body) = self
                .bodies
                .lock()
                .unwrap()
                .get(request.url.path())
                .cloned()
                .unwrap_or((200, format!("body of {}", request.url.path())));

            Ok(HttpResponse::new(
                StatusCode::from_u16(status).unwrap(),
                http::HeaderMap::new(),
                body.into_bytes(),
            ))
        }
    }

    const ORIGIN: &str = "https://shop.test";

    fn rules() -> Vec<CacheRule> {
        vec![
            CacheRule::new(UrlPattern::path_prefix("/static/"), CacheStrategy::CacheFirst, "static", HOUR_MS, 2),
            CacheRule::new(UrlPattern::path_prefix("/api/products"), CacheStrategy::StaleWhileRevalidate, "api", 1_000, 10),
            CacheRule::network_only(UrlPattern::path_prefix("/api/auth")),
            CacheRule::new(UrlPattern::path_prefix("/api/"), CacheStrategy::NetworkFirst, "api", 1_000, 10),
            CacheRule::new(UrlPattern::path_prefix("/shell/"), CacheStrategy::CacheOnly, "shell", HOUR_MS, 10),
            CacheRule::new(UrlPattern::Navigation, CacheStrategy::NetworkFirst, "pages", 1_000, 10),
        ]
    }

    fn config() -> CacheConfig {
        CacheConfig::for_origin(Url::parse(ORIGIN).unwrap())
            .with_generation("test-cache", "v2")
            .with_rules(rules())
            .with_precache_urls(vec!["/".to_string(), "/offline".to_string()])
    }

    struct Harness {
        proxy: EdgeCacheProxy,
        network: Arc<FakeNetwork>,
        clock: Arc<ManualClock>,
        store: Store,
    }

    fn harness() -> Harness {
        let network = FakeNetwork::online();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = Store::in_memory();
        let proxy = EdgeCacheProxy::new(config(), store.clone(), network.clone())
            .unwrap()
            .with_clock(clock.clone());
        Harness {
            proxy,
            network,
            clock,
            store,
        }
    }

    fn get(path: &str) -> HttpRequest {
        HttpRequest::get(&format!("{}{}", ORIGIN, path)).unwrap()
    }

    fn navigate(path: &str) -> HttpRequest {
        HttpRequest::navigate(&format!("{}{}", ORIGIN, path)).unwrap()
    }

    fn body(outcome: &FetchOutcome) -> String {
        outcome.response.text().unwrap()
    }

    /// Backend that fails every operation.
    struct BrokenBackend;

    #[async_trait]
    impl StoreBackend for BrokenBackend {
        async fn get(&self, _: &str, _: &str) -> StoreResult<Option<Vec<u8>>> {
            Err(broken())
        }
        async fn put(&self, _: &str, _: &str, _: Vec<u8>) -> StoreResult<()> {
            Err(broken())
        }
        async fn delete(&self, _: &str, _: &str) -> StoreResult<bool> {
            Err(broken())
        }
        async fn keys(&self, _: &str) -> StoreResult<Vec<String>> {
            Err(broken())
        }
        async fn entries(&self, _: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
            Err(broken())
        }
        async fn count(&self, _: &str) -> StoreResult<usize> {
            Err(broken())
        }
        async fn partitions(&self) -> StoreResult<Vec<String>> {
            Err(broken())
        }
        async fn delete_partition(&self, _: &str) -> StoreResult<bool> {
            Err(broken())
        }
    }

    fn broken() -> StoreError {
        StoreError::BackendError("quota exceeded".to_string())
    }

    #[tokio::test]
    async fn test_broken_cache_falls_back_to_network() {
        let network = FakeNetwork::online();
        let proxy = EdgeCacheProxy::new(config(), Store::new(BrokenBackend), network.clone()).unwrap();

        let cases = [
            (get("/static/app.js"), CacheStatus::Bypass),
            (get("/api/products/7"), CacheStatus::Bypass),
            (get("/shell/index.html"), CacheStatus::Bypass),
            (get("/api/orders"), CacheStatus::Miss),
            (navigate("/account"), CacheStatus::Miss),
        ];
        for (request, expected) in &cases {
            let outcome = proxy.handle_fetch(request).await.unwrap();
            assert_eq!(outcome.status, *expected, "{}", request.url);
            assert_eq!(body(&outcome), format!("body of {}", request.url.path()));
        }

        assert_eq!(network.calls(), cases.len());
        assert_eq!(proxy.metrics().cache_errors, cases.len() as u64);
    }

    #[tokio::test]
    async fn test_cache_first_stores_then_hits() {
        let h = harness();

        let first = h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(h.network.calls(), 1);

        let second = h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(body(&second), "body of /static/app.js");
        assert_eq!(second.response.header(X_CACHE_STATUS), Some("HIT"));
        assert_eq!(h.network.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_refetches_expired_entry() {
        let h = harness();
        h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap();

        h.clock.advance(Duration::from_millis(HOUR_MS));
        h.network.serve("/static/app.js", 200, "v2");
        let outcome = h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap();

        assert_eq!(outcome.status, CacheStatus::Miss);
        assert_eq!(body(&outcome), "v2");
        assert_eq!(h.network.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_first_serves_stale_when_offline() {
        let h = harness();
        h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap();

        h.clock.advance(Duration::from_millis(2 * HOUR_MS));
        h.network.set_online(false);
        let outcome = h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap();

        assert_eq!(outcome.status, CacheStatus::Stale);
        assert_eq!(body(&outcome), "body of /static/app.js");
    }

    #[tokio::test]
    async fn test_cache_first_propagates_when_nothing_cached() {
        let h = harness();
        h.network.set_online(false);

        let err = h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_fifo_bound_after_writes() {
        let h = harness();
        for name in ["a", "b", "c"] {
            h.proxy.handle_fetch(&get(&format!("/static/{}.js", name))).await.unwrap();
        }

        let partition = h.proxy.generation().partition_name("static");
        let keys = h.store.keys(&partition).await.unwrap();
        assert_eq!(
            keys,
            vec![
                format!("{}/static/b.js", ORIGIN),
                format!("{}/static/c.js", ORIGIN)
            ]
        );
        assert_eq!(h.proxy.metrics().evictions, 1);
    }

    #[tokio::test]
    async fn test_unsuccessful_responses_are_not_cached() {
        let h = harness();
        h.network.serve("/static/missing.js", 404, "nope");

        let outcome = h.proxy.handle_fetch(&get("/static/missing.js")).await.unwrap();
        assert_eq!(outcome.response.status, StatusCode::NOT_FOUND);

        h.proxy.handle_fetch(&get("/static/missing.js")).await.unwrap();
        assert_eq!(h.network.calls(), 2);
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_fresh_entry() {
        let h = harness();
        h.proxy.handle_fetch(&get("/api/cart")).await.unwrap();

        h.network.set_online(false);
        h.clock.advance(Duration::from_millis(999));
        let outcome = h.proxy.handle_fetch(&get("/api/cart")).await.unwrap();

        assert_eq!(outcome.status, CacheStatus::Hit);
        assert_eq!(body(&outcome), "body of /api/cart");
    }

    #[tokio::test]
    async fn test_network_first_expired_entry_is_not_served() {
        let h = harness();
        h.proxy.handle_fetch(&get("/api/cart")).await.unwrap();

        h.network.set_online(false);
        h.clock.advance(Duration::from_millis(1_000));
        assert!(h.proxy.handle_fetch(&get("/api/cart")).await.is_err());
    }

    #[tokio::test]
    async fn test_network_first_navigation_gets_offline_page() {
        let h = harness();
        h.network.serve("/offline", 200, "<h1>offline copy</h1>");
        h.proxy.install().await;
        h.proxy.handle_fetch(&navigate("/products")).await.unwrap();

        h.network.set_online(false);
        h.clock.advance(Duration::from_millis(5_000));
        let outcome = h.proxy.handle_fetch(&navigate("/products")).await.unwrap();

        assert_eq!(outcome.status, CacheStatus::Offline);
        assert_eq!(body(&outcome), "<h1>offline copy</h1>");
        assert_eq!(h.proxy.metrics().offline_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_offline_page_is_synthesized_without_precache() {
        let h = harness();
        h.network.set_online(false);

        let outcome = h.proxy.handle_fetch(&navigate("/checkout")).await.unwrap();
        assert_eq!(outcome.status, CacheStatus::Offline);
        assert_eq!(outcome.response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body(&outcome).contains("offline"));
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_returns_cached_then_refreshes() {
        let h = harness();
        h.network.serve("/api/products", 200, "old");
        h.proxy.handle_fetch(&get("/api/products")).await.unwrap();

        h.network.serve("/api/products", 200, "new");
        let outcome = h.proxy.handle_fetch(&get("/api/products")).await.unwrap();
        assert_eq!(outcome.status, CacheStatus::Hit);
        assert_eq!(body(&outcome), "old");

        let refreshed = outcome.revalidation.unwrap().wait().await.unwrap();
        assert_eq!(refreshed.text().unwrap(), "new");

        h.network.set_online(false);
        let after = h.proxy.handle_fetch(&get("/api/products")).await.unwrap();
        assert_eq!(body(&after), "new");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_awaits_network_when_cold() {
        let h = harness();
        let outcome = h.proxy.handle_fetch(&get("/api/products?page=3")).await.unwrap();

        assert_eq!(outcome.status, CacheStatus::Miss);
        assert!(outcome.revalidation.is_none());
        assert_eq!(h.network.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_swallows_background_failure() {
        let h = harness();
        h.proxy.handle_fetch(&get("/api/products")).await.unwrap();

        h.network.set_online(false);
        let outcome = h.proxy.handle_fetch(&get("/api/products")).await.unwrap();
        assert_eq!(outcome.status, CacheStatus::Hit);
        assert!(outcome.revalidation.unwrap().wait().await.is_err());
    }

    #[tokio::test]
    async fn test_network_only_never_caches() {
        let h = harness();
        h.proxy.handle_fetch(&get("/api/auth/session")).await.unwrap();
        h.network.set_online(false);

        assert!(h.proxy.handle_fetch(&get("/api/auth/session")).await.is_err());
        let stats = h.proxy.partition_stats().await.unwrap();
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn test_cache_only_without_entry_is_not_cached_error() {
        let h = harness();
        let err = h.proxy.handle_fetch(&get("/shell/app.html")).await.unwrap_err();
        assert!(matches!(err, crate::ProxyError::NotCached(_)));
        assert_eq!(h.network.calls(), 0);
    }

    #[tokio::test]
    async fn test_bypassed_requests_go_to_network() {
        let h = harness();
        let post = HttpRequest::new(Method::POST, Url::parse("https://shop.test/api/orders").unwrap());
        let foreign = HttpRequest::get("https://tracker.example/pixel.gif").unwrap();

        assert_eq!(h.proxy.handle_fetch(&post).await.unwrap().status, CacheStatus::Bypass);
        assert_eq!(h.proxy.handle_fetch(&foreign).await.unwrap().status, CacheStatus::Bypass);
        assert_eq!(h.network.calls(), 2);
        assert_eq!(h.proxy.metrics().bypasses, 2);
    }

    #[tokio::test]
    async fn test_install_is_best_effort() {
        let h = harness();
        h.network.serve("/", 500, "boom");

        let report = h.proxy.install().await;
        assert_eq!(report.cached, vec![format!("{}/offline", ORIGIN)]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].url, "/");
        assert_eq!(h.proxy.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_activate_sweeps_old_generations_only() {
        let h = harness();
        h.store.put("test-cache-v1/static", "k", &"old").await.unwrap();
        h.store.put("other-cache-v1/static", "k", &"foreign").await.unwrap();
        h.store.put("sync_queue", "k", &"mutation").await.unwrap();
        h.proxy.handle_fetch(&get("/static/app.js")).await.unwrap();

        h.proxy.install().await;
        let report = h.proxy.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["test-cache-v1/static".to_string()]);
        assert!(report.claimed);
        assert!(h.proxy.is_claimed().await);
        assert_eq!(h.proxy.state().await, WorkerState::Activated);

        let remaining = h.store.partitions().await.unwrap();
        assert!(remaining.contains(&"other-cache-v1/static".to_string()));
        assert!(remaining.contains(&"sync_queue".to_string()));
        assert!(remaining.contains(&"test-cache-v2/static".to_string()));
    }

    #[tokio::test]
    async fn test_sweep_enforces_bounds_independently_of_writes() {
        let h = harness();
        let partition = h.proxy.generation().partition_name("static");
        for i in 0..5 {
            h.store.put(&partition, &format!("k{}", i), &i).await.unwrap();
        }

        let report = h.proxy.sweep().await.unwrap();
        assert_eq!(report.evicted, 3);
        assert_eq!(h.store.keys(&partition).await.unwrap(), vec!["k3", "k4"]);
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let h = harness();
        h.proxy.handle_fetch(&get("/static/a.js")).await.unwrap();
        h.proxy.handle_fetch(&get("/api/cart")).await.unwrap();
        h.store.put("test-cache-v1/api", "k", &1).await.unwrap();

        let stats = h.proxy.partition_stats().await.unwrap();
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().any(|s| s.name == "test-cache-v1/api" && !s.current));
        assert!(stats
            .iter()
            .any(|s| s.name == "test-cache-v2/static" && s.entries == 1 && s.max_entries == Some(2)));

        assert_eq!(h.proxy.clear().await.unwrap(), 2);
        assert_eq!(h.proxy.partition_stats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let bad = config().with_rules(vec![CacheRule::new(
            UrlPattern::path_prefix("/x"),
            CacheStrategy::CacheFirst,
            "x",
            1,
            0,
        )]);
        assert!(EdgeCacheProxy::new(bad, Store::in_memory(), FakeNetwork::online()).is_err());
    }
}
