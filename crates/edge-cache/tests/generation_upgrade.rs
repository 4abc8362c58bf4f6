use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use edge_cache::{CacheConfig, CacheStatus, EdgeCacheProxy, WorkerState};
use edge_data::{FetchError, Fetcher, HttpRequest, HttpResponse};
use turbo_store::Store;
use url::Url;

struct Origin {
    online: AtomicBool,
    release: &'static str,
}

#[async_trait]
impl Fetcher for Origin {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(FetchError::Connection("offline".to_string()));
        }
        Ok(HttpResponse::ok(format!("{} {}", self.release, request.url.path())))
    }
}

fn origin(release: &'static str) -> Arc<Origin> {
    Arc::new(Origin {
        online: AtomicBool::new(true),
        release,
    })
}

fn config(version: &str) -> CacheConfig {
    CacheConfig::for_origin(Url::parse("https://shop.test").unwrap())
        .with_generation("storefront-cache", version)
}

#[tokio::test]
async fn test_upgrade_replaces_previous_generation() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("offline.db");

    {
        let store = Store::open_sqlite(&db).unwrap();
        let proxy = EdgeCacheProxy::new(config("v1"), store, origin("r1")).unwrap();
        assert!(proxy.install().await.is_complete());
        proxy.activate().await.unwrap();

        let asset = HttpRequest::get("https://shop.test/_next/static/chunks/main.js").unwrap();
        proxy.handle_fetch(&asset).await.unwrap();
    }

    let store = Store::open_sqlite(&db).unwrap();
    let network = origin("r2");
    let proxy = EdgeCacheProxy::new(config("v2"), store.clone(), network.clone()).unwrap();

    let before = proxy.partition_stats().await.unwrap();
    assert!(before.iter().all(|p| !p.current));
    assert!(before.iter().any(|p| p.name == "storefront-cache-v1/static"));

    proxy.install().await;
    let report = proxy.activate().await.unwrap();
    assert_eq!(proxy.state().await, WorkerState::Activated);
    assert!(report.deleted.contains(&"storefront-cache-v1/precache".to_string()));
    assert!(report.deleted.contains(&"storefront-cache-v1/static".to_string()));

    let after = store.partitions().await.unwrap();
    assert!(after.iter().all(|p| p.starts_with("storefront-cache-v2/")));

    network.online.store(false, Ordering::SeqCst);
    let page = HttpRequest::navigate("https://shop.test/orders/17").unwrap();
    let outcome = proxy.handle_fetch(&page).await.unwrap();
    assert_eq!(outcome.status, CacheStatus::Offline);
    assert_eq!(outcome.response.text().unwrap(), "r2 /offline");
}
