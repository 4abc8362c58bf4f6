//! Connectivity signals that trigger a drain.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::QueueResult;
use crate::queue::{DrainReport, OfflineQueue};

/// Tag of the background-sync registration that drains the queue.
pub const SYNC_TAG: &str = "background-sync";

/// Connects online/offline transitions, background sync and a periodic timer
/// to the queue drain.
#[derive(Debug, Clone)]
pub struct ConnectivityBridge {
    queue: OfflineQueue,
    online: watch::Sender<bool>,
}

impl ConnectivityBridge {
    /// Create a bridge with an initial connectivity state.
    pub fn new(queue: OfflineQueue, initially_online: bool) -> Self {
        let (online, _) = watch::channel(initially_online);
        Self { queue, online }
    }

    /// The queue being drained.
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Whether the last signal was "online".
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Watch connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Report connectivity. Going from offline to online drains the queue.
    pub async fn set_online(&self, online: bool) -> QueueResult<Option<DrainReport>> {
        let was_online = self.online.send_replace(online);
        if online == was_online {
            return Ok(None);
        }

        if online {
            tracing::info!("connection restored, draining queue");
            self.queue.process_queue().await.map(Some)
        } else {
            tracing::info!("connection lost, queueing mutations");
            Ok(None)
        }
    }

    /// Handle a background-sync event. Only [`SYNC_TAG`] drains the queue.
    pub async fn handle_sync(&self, tag: &str) -> QueueResult<Option<DrainReport>> {
        if tag != SYNC_TAG {
            tracing::debug!(tag, "ignoring sync event");
            return Ok(None);
        }
        self.queue.process_queue().await.map(Some)
    }

    /// Drain while online and purge expired records, every `every`.
    ///
    /// Runs until the task is dropped. Errors are logged and the loop keeps
    /// going.
    pub async fn run(&self, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if self.is_online() {
                if let Err(e) = self.queue.process_queue().await {
                    tracing::warn!(error = %e, "periodic drain failed");
                }
            }
            if let Err(e) = self.queue.cleanup().await {
                tracing::warn!(error = %e, "periodic cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use turbo_store::Store;

    use crate::config::QueueConfig;
    use crate::error::ReplayError;
    use crate::record::{MutationKind, MutationRecord};
    use crate::transport::ReplayTransport;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl ReplayTransport for Counting {
        async fn replay(&self, _record: &MutationRecord) -> Result<(), ReplayError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn bridge(online: bool) -> (ConnectivityBridge, Arc<Counting>) {
        let transport = Arc::new(Counting::default());
        let queue = OfflineQueue::new(Store::in_memory(), transport.clone(), QueueConfig::default()).unwrap();
        (ConnectivityBridge::new(queue, online), transport)
    }

    #[tokio::test]
    async fn test_online_transition_drains() {
        let (bridge, transport) = bridge(false);
        bridge
            .queue()
            .add_to_queue(MutationKind::CartUpdate, json!({"qty": 2}))
            .await
            .unwrap();

        assert!(bridge.set_online(false).await.unwrap().is_none());
        assert_eq!(transport.0.load(Ordering::SeqCst), 0);

        let report = bridge.set_online(true).await.unwrap().unwrap();
        assert_eq!(report.replayed, 1);
        assert!(bridge.is_online());

        // Already online: no second drain.
        assert!(bridge.set_online(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let (bridge, _) = bridge(true);
        let mut rx = bridge.subscribe();
        bridge.set_online(false).await.unwrap();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }

    #[tokio::test]
    async fn test_sync_tag_filter() {
        let (bridge, transport) = bridge(true);
        bridge
            .queue()
            .add_to_queue(MutationKind::UserAction, json!({}))
            .await
            .unwrap();

        assert!(bridge.handle_sync("periodic-refresh").await.unwrap().is_none());
        assert_eq!(transport.0.load(Ordering::SeqCst), 0);

        let report = bridge.handle_sync(SYNC_TAG).await.unwrap().unwrap();
        assert_eq!(report.replayed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_drain_only_when_online() {
        let (bridge, transport) = bridge(false);
        bridge
            .queue()
            .add_to_queue(MutationKind::CartUpdate, json!({}))
            .await
            .unwrap();

        let runner = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.run(Duration::from_secs(300)).await }
        });

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(transport.0.load(Ordering::SeqCst), 0);

        bridge.online.send_replace(true);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(transport.0.load(Ordering::SeqCst), 1);

        runner.abort();
    }
}
