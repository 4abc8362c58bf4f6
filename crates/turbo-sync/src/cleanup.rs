//! Retention cleanup across the offline partitions.

use edge_core::Timestamp;
use serde::{Deserialize, Serialize};
use turbo_store::{Store, StoreResult};

use crate::partitions::{CART, DEAD_LETTER, ORDERS, PRODUCTS, SYNC_QUEUE, USER_PREFERENCES};
use crate::record::{DeadLetter, MutationRecord};
use crate::snapshots::Snapshot;

/// Records removed by a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Snapshot and preference records.
    pub snapshots: usize,
    /// Queued mutations, regardless of kind or attempt count.
    pub mutations: usize,
    /// Dead letters.
    pub dead_letters: usize,
}

impl CleanupReport {
    /// Total records removed.
    pub fn total(&self) -> usize {
        self.snapshots + self.mutations + self.dead_letters
    }
}

/// Remove every record older than `retention_ms` at `now`.
pub async fn purge_expired(store: &Store, now: Timestamp, retention_ms: u64) -> StoreResult<CleanupReport> {
    let expired = |at: Timestamp| now.saturating_sub(at) > retention_ms;
    let mut report = CleanupReport::default();

    for partition in [CART, ORDERS, PRODUCTS, USER_PREFERENCES] {
        report.snapshots += store
            .retain(partition, |_, s: &Snapshot<serde_json::Value>| !expired(s.timestamp))
            .await?;
    }

    report.mutations = store
        .retain(SYNC_QUEUE, |_, r: &MutationRecord| !expired(r.enqueued_at))
        .await?;
    report.dead_letters = store
        .retain(DEAD_LETTER, |_, d: &DeadLetter| !expired(d.dropped_at))
        .await?;

    if report.total() > 0 {
        tracing::info!(
            snapshots = report.snapshots,
            mutations = report.mutations,
            dead_letters = report.dead_letters,
            "purged expired offline records"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::DAY_MS;
    use serde_json::json;

    use crate::record::MutationKind;

    const NOW: Timestamp = 100 * DAY_MS;
    const WEEK: u64 = 7 * DAY_MS;

    fn snapshot(id: &str, timestamp: Timestamp) -> Snapshot<serde_json::Value> {
        Snapshot {
            id: id.to_string(),
            timestamp,
            data: json!({"id": id}),
        }
    }

    #[tokio::test]
    async fn test_purges_old_records_in_every_partition() {
        let store = Store::in_memory();
        store.put(CART, "old", &snapshot("old", NOW - WEEK - 1)).await.unwrap();
        store.put(CART, "new", &snapshot("new", NOW - 1)).await.unwrap();
        store.put(USER_PREFERENCES, "theme", &snapshot("theme", 0)).await.unwrap();

        let mut exhausted = MutationRecord::new(MutationKind::OrderCreate, json!({}), NOW - 8 * DAY_MS);
        exhausted.attempt_count = 2;
        store.put(SYNC_QUEUE, exhausted.id.as_str(), &exhausted).await.unwrap();
        let fresh = MutationRecord::new(MutationKind::CartUpdate, json!({}), NOW - DAY_MS);
        store.put(SYNC_QUEUE, fresh.id.as_str(), &fresh).await.unwrap();

        let letter = DeadLetter {
            record: fresh.clone(),
            dropped_at: NOW - 30 * DAY_MS,
            last_error: "HTTP 500".to_string(),
        };
        store.put(DEAD_LETTER, "d1", &letter).await.unwrap();

        let report = purge_expired(&store, NOW, WEEK).await.unwrap();
        assert_eq!(
            report,
            CleanupReport {
                snapshots: 2,
                mutations: 1,
                dead_letters: 1,
            }
        );
        assert_eq!(store.keys(CART).await.unwrap(), vec!["new"]);
        assert_eq!(store.keys(SYNC_QUEUE).await.unwrap(), vec![fresh.id.to_string()]);
    }

    #[tokio::test]
    async fn test_record_exactly_at_retention_is_kept() {
        let store = Store::in_memory();
        store.put(ORDERS, "o1", &snapshot("o1", NOW - WEEK)).await.unwrap();

        let report = purge_expired(&store, NOW, WEEK).await.unwrap();
        assert_eq!(report.total(), 0);
    }
}
