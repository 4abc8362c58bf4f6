use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use edge_core::{ManualClock, DAY_MS};
use edge_data::{FetchError, Fetcher, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use turbo_store::Store;
use turbo_sync::{
    partitions, CartItem, ConnectivityBridge, HttpReplayTransport, MutationKind, OfflineQueue, QueueConfig,
    Snapshots, MUTATION_ID_HEADER,
};
use url::Url;

/// Origin that is either unreachable or accepts everything.
#[derive(Default)]
struct Server {
    online: AtomicBool,
    received: Mutex<Vec<(String, String, Value)>>,
}

#[async_trait]
impl Fetcher for Server {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(FetchError::Connection("network unreachable".to_string()));
        }
        let id = request
            .headers
            .get(MUTATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap();
        self.received
            .lock()
            .unwrap()
            .push((request.url.path().to_string(), id, body));
        Ok(HttpResponse::ok("{}"))
    }
}

fn open(db: &std::path::Path, server: Arc<Server>, clock: Arc<ManualClock>) -> (ConnectivityBridge, Store) {
    let store = Store::open_sqlite(db).unwrap();
    let config = QueueConfig::for_base_url(Url::parse("https://shop.test").unwrap());
    let transport = HttpReplayTransport::new(server, config.base_url.clone(), config.endpoints.clone());
    let queue = OfflineQueue::new(store.clone(), Arc::new(transport), config)
        .unwrap()
        .with_clock(clock);
    (ConnectivityBridge::new(queue, false), store)
}

#[tokio::test]
async fn test_offline_session_replays_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("offline.db");
    let server = Arc::new(Server::default());
    let clock = Arc::new(ManualClock::new(30 * DAY_MS));

    let (cart_id, order_id) = {
        let (bridge, store) = open(&db, server.clone(), clock.clone());
        let queue = bridge.queue();

        Snapshots::new(store, clock.clone())
            .cart()
            .save(
                "tee-m",
                CartItem {
                    product_id: "tee".to_string(),
                    variant_id: Some("tee-m".to_string()),
                    title: "Logo Tee".to_string(),
                    quantity: 2,
                    unit_price: 2_000,
                    currency: "USD".to_string(),
                },
            )
            .await
            .unwrap();

        let cart_id = queue
            .add_to_queue(MutationKind::CartUpdate, json!({"variant": "tee-m", "qty": 2}))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(10));
        let order_id = queue
            .add_to_queue(MutationKind::OrderCreate, json!({"cart": "c1"}))
            .await
            .unwrap();

        // A sync event while the origin is down counts one failure each.
        let report = bridge.handle_sync(turbo_sync::SYNC_TAG).await.unwrap().unwrap();
        assert_eq!(report.failed, 2);
        (cart_id, order_id)
    };

    let (bridge, store) = open(&db, server.clone(), clock.clone());
    let pending = bridge.queue().pending().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.attempt_count == 1));

    server.online.store(true, Ordering::SeqCst);
    let report = bridge.set_online(true).await.unwrap().unwrap();
    assert_eq!(report.replayed, 2);

    let received = server.received.lock().unwrap().clone();
    assert_eq!(
        received,
        vec![
            (
                "/api/cart/sync".to_string(),
                cart_id.to_string(),
                json!({"variant": "tee-m", "qty": 2})
            ),
            ("/api/orders".to_string(), order_id.to_string(), json!({"cart": "c1"})),
        ]
    );
    assert_eq!(store.count(partitions::SYNC_QUEUE).await.unwrap(), 0);

    let stats = bridge.queue().stats().await;
    assert_eq!(stats.pending_mutations, 0);
    assert_eq!(stats.cart_items, 1);

    clock.advance(Duration::from_millis(8 * DAY_MS));
    let cleaned = bridge.queue().cleanup().await.unwrap();
    assert_eq!(cleaned.snapshots, 1);
    assert_eq!(bridge.queue().stats().await.cart_items, 0);
}
