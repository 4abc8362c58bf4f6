//! Domain snapshot stores for rendering while offline.
//!
//! Snapshots are a convenience copy of server state. They are never
//! authoritative and are purged after the retention window.

use std::marker::PhantomData;
use std::sync::Arc;

use edge_core::{Clock, Timestamp};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use turbo_store::Store;

use crate::error::QueueResult;
use crate::partitions::{CART, ORDERS, PRODUCTS, USER_PREFERENCES};

/// A stored snapshot with its capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// Domain ID, also the storage key.
    pub id: String,
    /// When the snapshot was saved.
    pub timestamp: Timestamp,
    /// The snapshot data.
    pub data: T,
}

/// A cart line as last seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    pub title: String,
    pub quantity: u32,
    /// Unit price in minor units.
    pub unit_price: i64,
    pub currency: String,
}

/// An order as last seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub status: String,
    /// Total in minor units.
    pub total: i64,
    pub currency: String,
    pub item_count: u32,
    pub placed_at: Timestamp,
}

/// A recently viewed product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: String,
    pub handle: String,
    pub title: String,
    /// Price in minor units.
    pub price: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Typed snapshot partition.
pub struct SnapshotStore<T> {
    store: Store,
    clock: Arc<dyn Clock>,
    partition: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SnapshotStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: Arc::clone(&self.clock),
            partition: self.partition,
            _marker: PhantomData,
        }
    }
}

impl<T> SnapshotStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a snapshot partition.
    pub fn new(store: Store, clock: Arc<dyn Clock>, partition: &'static str) -> Self {
        Self {
            store,
            clock,
            partition,
            _marker: PhantomData,
        }
    }

    /// Partition name.
    pub fn partition(&self) -> &'static str {
        self.partition
    }

    /// Save or replace a snapshot, stamped with the current time.
    pub async fn save(&self, id: impl Into<String>, data: T) -> QueueResult<()> {
        let snapshot = Snapshot {
            id: id.into(),
            timestamp: self.clock.now_ms(),
            data,
        };
        self.store.put(self.partition, &snapshot.id, &snapshot).await?;
        Ok(())
    }

    /// Get a snapshot.
    pub async fn get(&self, id: &str) -> QueueResult<Option<Snapshot<T>>> {
        Ok(self.store.get(self.partition, id).await?)
    }

    /// Snapshots, newest first.
    pub async fn list(&self, limit: Option<usize>) -> QueueResult<Vec<Snapshot<T>>> {
        let mut snapshots: Vec<Snapshot<T>> = self
            .store
            .values::<Snapshot<T>>(self.partition)
            .await?
            .into_iter()
            .map(|(_, snapshot)| snapshot)
            .collect();

        snapshots.reverse();
        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            snapshots.truncate(limit);
        }
        Ok(snapshots)
    }

    /// Remove a snapshot. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> QueueResult<bool> {
        Ok(self.store.delete(self.partition, id).await?)
    }

    /// Remove every snapshot. Returns how many were removed.
    pub async fn clear(&self) -> QueueResult<usize> {
        let count = self.store.count(self.partition).await?;
        self.store.delete_partition(self.partition).await?;
        Ok(count)
    }

    /// Number of snapshots.
    pub async fn count(&self) -> QueueResult<usize> {
        Ok(self.store.count(self.partition).await?)
    }
}

/// The snapshot stores of the offline layer.
#[derive(Clone)]
pub struct Snapshots {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl Snapshots {
    /// Create the snapshot stores over a shared store.
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Cart items, keyed by product (or variant) ID.
    pub fn cart(&self) -> SnapshotStore<CartItem> {
        SnapshotStore::new(self.store.clone(), self.clock.clone(), CART)
    }

    /// Recent orders, keyed by order ID.
    pub fn orders(&self) -> SnapshotStore<OrderSummary> {
        SnapshotStore::new(self.store.clone(), self.clock.clone(), ORDERS)
    }

    /// Recently viewed products, keyed by product ID.
    pub fn products(&self) -> SnapshotStore<ProductSummary> {
        SnapshotStore::new(self.store.clone(), self.clock.clone(), PRODUCTS)
    }

    /// Set a user preference.
    pub async fn set_preference<V: Serialize>(&self, key: &str, value: &V) -> QueueResult<()> {
        let prefs: SnapshotStore<serde_json::Value> =
            SnapshotStore::new(self.store.clone(), self.clock.clone(), USER_PREFERENCES);
        prefs.save(key, serde_json::to_value(value)?).await
    }

    /// Get a user preference.
    pub async fn preference<V: DeserializeOwned>(&self, key: &str) -> QueueResult<Option<V>> {
        let snapshot: Option<Snapshot<serde_json::Value>> =
            self.store.get(USER_PREFERENCES, key).await?;
        match snapshot {
            Some(snapshot) => Ok(Some(serde_json::from_value(snapshot.data)?)),
            None => Ok(None),
        }
    }
}
