//! Strategy execution against partitions and the network.

use std::sync::Arc;

use edge_core::Clock;
use edge_data::{FetchError, Fetcher, HttpRequest, HttpResponse};
use edge_observability::ProxyMetrics;
use http::StatusCode;
use tokio::task::JoinHandle;
use turbo_store::{Store, StoreResult};

use crate::error::{ProxyError, ProxyResult};
use crate::headers::{is_expired, CacheStatus};
use crate::key::CacheKey;
use crate::partition::{CacheGeneration, CachePartition};
use crate::rule::{CacheRule, CacheStrategy};

const OFFLINE_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>You are offline</h1><p>Check your connection and try again.</p></body></html>";

/// A handled request.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Response to hand back to the page.
    pub response: HttpResponse,
    /// How the response was produced.
    pub status: CacheStatus,
    /// Background refresh started by stale-while-revalidate.
    pub revalidation: Option<Revalidation>,
}

impl FetchOutcome {
    pub(crate) fn new(response: HttpResponse, status: CacheStatus) -> Self {
        Self {
            response,
            status,
            revalidation: None,
        }
    }
}

/// Handle to a background revalidation.
///
/// Dropping the handle detaches the task; it still completes and stores its
/// result.
#[derive(Debug)]
pub struct Revalidation(JoinHandle<Result<HttpResponse, FetchError>>);

impl Revalidation {
    /// Wait for the refresh to finish and return the network result.
    pub async fn wait(self) -> Result<HttpResponse, FetchError> {
        match self.0.await {
            Ok(result) => result,
            Err(e) => Err(FetchError::Request(format!("revalidation task failed: {}", e))),
        }
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    /// Cancel the refresh. Nothing is stored unless the full response had
    /// already been received.
    pub fn abort(&self) {
        self.0.abort();
    }
}

/// State shared by the proxy and its background tasks.
#[derive(Clone)]
pub(crate) struct ProxyShared {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) store: Store,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Arc<ProxyMetrics>,
    pub(crate) generation: CacheGeneration,
    pub(crate) precache: CachePartition,
    pub(crate) offline_page: CacheKey,
}

impl ProxyShared {
    pub(crate) fn partition(&self, rule: &CacheRule) -> CachePartition {
        CachePartition::new(
            self.store.clone(),
            self.generation.partition_name(&rule.partition),
            rule.max_entries,
        )
    }

    pub(crate) async fn execute(
        self: &Arc<Self>,
        rule: &CacheRule,
        request: &HttpRequest,
    ) -> ProxyResult<FetchOutcome> {
        match rule.strategy {
            CacheStrategy::CacheFirst => self.cache_first(rule, request).await,
            CacheStrategy::NetworkFirst => self.network_first(rule, request).await,
            CacheStrategy::StaleWhileRevalidate => self.stale_while_revalidate(rule, request).await,
            CacheStrategy::NetworkOnly => self.pass_through(request).await,
            CacheStrategy::CacheOnly => self.cache_only(rule, request).await,
        }
    }

    pub(crate) async fn pass_through(&self, request: &HttpRequest) -> ProxyResult<FetchOutcome> {
        let response = self.network(request).await?;
        Ok(FetchOutcome::new(response, CacheStatus::Bypass))
    }

    async fn cache_first(&self, rule: &CacheRule, request: &HttpRequest) -> ProxyResult<FetchOutcome> {
        let partition = self.partition(rule);
        let key = CacheKey::from_url(&request.url);

        let cached = match self.lookup(&partition, &key).await {
            Ok(cached) => cached,
            Err(_) => return self.pass_through(request).await,
        };

        let stale = match cached {
            Some(entry) if !is_expired(&entry, rule.max_age_ms, self.clock.now_ms()) => {
                return Ok(FetchOutcome::new(entry, CacheStatus::Hit));
            }
            other => other,
        };

        match self.network(request).await {
            Ok(response) => {
                self.store(&partition, &key, &response).await;
                Ok(FetchOutcome::new(response, CacheStatus::Miss))
            }
            Err(e) => match stale {
                Some(entry) => {
                    tracing::debug!(url = %request.url, error = %e, "serving stale entry");
                    Ok(FetchOutcome::new(entry, CacheStatus::Stale))
                }
                None => Err(e.into()),
            },
        }
    }

    async fn network_first(&self, rule: &CacheRule, request: &HttpRequest) -> ProxyResult<FetchOutcome> {
        let partition = self.partition(rule);
        let key = CacheKey::from_url(&request.url);

        let error = match self.network(request).await {
            Ok(response) => {
                self.store(&partition, &key, &response).await;
                return Ok(FetchOutcome::new(response, CacheStatus::Miss));
            }
            Err(e) => e,
        };

        if let Ok(Some(entry)) = self.lookup(&partition, &key).await {
            if !is_expired(&entry, rule.max_age_ms, self.clock.now_ms()) {
                tracing::debug!(url = %request.url, error = %error, "network failed, serving cached entry");
                return Ok(FetchOutcome::new(entry, CacheStatus::Hit));
            }
        }

        if request.is_navigation() {
            tracing::info!(url = %request.url, error = %error, "serving offline page");
            return Ok(FetchOutcome::new(self.offline_fallback().await, CacheStatus::Offline));
        }

        Err(error.into())
    }

    async fn stale_while_revalidate(
        self: &Arc<Self>,
        rule: &CacheRule,
        request: &HttpRequest,
    ) -> ProxyResult<FetchOutcome> {
        let partition = self.partition(rule);
        let key = CacheKey::from_url(&request.url);

        let cached = match self.lookup(&partition, &key).await {
            Ok(cached) => cached,
            Err(_) => return self.pass_through(request).await,
        };

        let revalidation = self.spawn_revalidation(partition, key, request.clone());

        let stale = match cached {
            Some(entry) if !is_expired(&entry, rule.max_age_ms, self.clock.now_ms()) => {
                return Ok(FetchOutcome {
                    response: entry,
                    status: CacheStatus::Hit,
                    revalidation: Some(revalidation),
                });
            }
            other => other,
        };

        match revalidation.wait().await {
            Ok(response) => Ok(FetchOutcome::new(response, CacheStatus::Miss)),
            Err(e) => match stale {
                Some(entry) => Ok(FetchOutcome::new(entry, CacheStatus::Stale)),
                None => Err(e.into()),
            },
        }
    }

    async fn cache_only(&self, rule: &CacheRule, request: &HttpRequest) -> ProxyResult<FetchOutcome> {
        let partition = self.partition(rule);
        let key = CacheKey::from_url(&request.url);

        match self.lookup(&partition, &key).await {
            Ok(Some(entry)) => Ok(FetchOutcome::new(entry, CacheStatus::Hit)),
            Ok(None) => Err(ProxyError::NotCached(key.to_string())),
            Err(_) => self.pass_through(request).await,
        }
    }

    fn spawn_revalidation(
        self: &Arc<Self>,
        partition: CachePartition,
        key: CacheKey,
        request: HttpRequest,
    ) -> Revalidation {
        let shared = Arc::clone(self);
        Revalidation(tokio::spawn(async move {
            let response = shared.network(&request).await;
            match &response {
                Ok(fresh) => shared.store(&partition, &key, fresh).await,
                Err(e) => tracing::debug!(url = %request.url, error = %e, "revalidation failed"),
            }
            response
        }))
    }

    async fn network(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let result = self.fetcher.fetch(request).await;
        if let Err(e) = &result {
            self.metrics.record_network_error();
            tracing::debug!(url = %request.url, error = %e, "network request failed");
        }
        result
    }

    async fn lookup(&self, partition: &CachePartition, key: &CacheKey) -> StoreResult<Option<HttpResponse>> {
        partition.get(key).await.map_err(|e| {
            self.metrics.record_cache_error();
            tracing::warn!(partition = partition.name(), key = %key, error = %e, "cache read failed");
            e
        })
    }

    /// Write a response if it is cacheable. Failures are logged, not raised.
    pub(crate) async fn store(&self, partition: &CachePartition, key: &CacheKey, response: &HttpResponse) {
        if !response.is_success() {
            tracing::debug!(key = %key, status = %response.status, "not caching unsuccessful response");
            return;
        }

        match partition.put(key, response, self.clock.now_ms()).await {
            Ok(evicted) => {
                self.metrics.record_write();
                if !evicted.is_empty() {
                    self.metrics.record_evictions(evicted.len());
                }
            }
            Err(e) => {
                self.metrics.record_cache_error();
                tracing::warn!(partition = partition.name(), key = %key, error = %e, "cache write failed");
            }
        }
    }

    async fn offline_fallback(&self) -> HttpResponse {
        match self.precache.get(&self.offline_page).await {
            Ok(Some(page)) => page,
            Ok(None) => HttpResponse::html(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_HTML),
            Err(e) => {
                self.metrics.record_cache_error();
                tracing::warn!(error = %e, "offline page unreadable");
                HttpResponse::html(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_HTML)
            }
        }
    }
}
