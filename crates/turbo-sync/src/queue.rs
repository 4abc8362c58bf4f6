//! The offline mutation queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use edge_core::{duration_ms, Clock, ConfigResult, SystemClock, Timestamp};
use edge_observability::{DrainMetrics, DrainMetricsSnapshot};
use serde::{Deserialize, Serialize};
use turbo_store::Store;

use crate::cleanup::{purge_expired, CleanupReport};
use crate::config::QueueConfig;
use crate::error::{QueueResult, ReplayError};
use crate::partitions::{DEAD_LETTER, SYNC_QUEUE};
use crate::record::{DeadLetter, MutationId, MutationKind, MutationRecord};
use crate::stats::OfflineStats;
use crate::transport::ReplayTransport;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Mutations acknowledged and removed.
    pub replayed: usize,
    /// Failed attempts in this pass (dropped ones included).
    pub failed: usize,
    /// Mutations removed after their final failed attempt.
    pub dropped: usize,
    /// Mutations skipped because their backoff had not elapsed.
    pub skipped: usize,
    /// Undecodable queue entries removed before replay.
    #[serde(default)]
    pub discarded: usize,
    /// The pass did nothing because another drain was running.
    pub already_running: bool,
}

impl DrainReport {
    fn busy() -> Self {
        Self {
            already_running: true,
            ..Self::default()
        }
    }

    /// Whether any mutation was attempted.
    pub fn attempted(&self) -> usize {
        self.replayed + self.failed
    }
}

/// Releases the drain flag when dropped, including on panic or cancellation.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Durable queue of write intents, replayed in order when online.
///
/// Cheap to clone; clones share the drain flag, so at most one drain runs
/// across all clones.
#[derive(Clone)]
pub struct OfflineQueue {
    store: Store,
    transport: Arc<dyn ReplayTransport>,
    clock: Arc<dyn Clock>,
    config: Arc<QueueConfig>,
    draining: Arc<AtomicBool>,
    metrics: Arc<DrainMetrics>,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("max_attempts", &self.config.max_attempts)
            .field("draining", &self.is_draining())
            .finish_non_exhaustive()
    }
}

impl OfflineQueue {
    /// Create a queue. The configuration is validated first.
    pub fn new(store: Store, transport: Arc<dyn ReplayTransport>, config: QueueConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            transport,
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
            draining: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(DrainMetrics::new()),
        })
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// The shared store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The clock.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Whether a drain is in flight.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Drain counters.
    pub fn metrics(&self) -> DrainMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Record a mutation locally. Never touches the network.
    pub async fn add_to_queue(&self, kind: MutationKind, payload: serde_json::Value) -> QueueResult<MutationId> {
        let record = MutationRecord::new(kind, payload, self.clock.now_ms());
        self.store.put(SYNC_QUEUE, record.id.as_str(), &record).await?;
        tracing::debug!(id = %record.id, kind = %record.kind, "mutation queued");
        Ok(record.id)
    }

    /// Record a mutation with a serializable payload.
    pub async fn enqueue<T: Serialize>(&self, kind: MutationKind, payload: &T) -> QueueResult<MutationId> {
        self.add_to_queue(kind, serde_json::to_value(payload)?).await
    }

    /// Pending mutations that still have attempts left, oldest first.
    ///
    /// Ties on `enqueued_at` keep storage order. Entries that no longer
    /// decode are skipped; the next drain removes them.
    pub async fn pending(&self) -> QueueResult<Vec<MutationRecord>> {
        let mut records = Vec::new();
        for (key, record) in self.store.try_values::<MutationRecord>(SYNC_QUEUE).await? {
            match record {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping undecodable mutation"),
            }
        }
        Ok(self.chronological(records))
    }

    fn chronological(&self, records: Vec<MutationRecord>) -> Vec<MutationRecord> {
        let mut records: Vec<MutationRecord> = records
            .into_iter()
            .filter(|r| !r.is_exhausted(self.config.max_attempts))
            .collect();
        records.sort_by_key(|r| r.enqueued_at);
        records
    }

    /// Load the drain batch, deleting entries that no longer decode.
    async fn load_batch(&self, report: &mut DrainReport) -> QueueResult<Vec<MutationRecord>> {
        let mut records = Vec::new();
        for (key, record) in self.store.try_values::<MutationRecord>(SYNC_QUEUE).await? {
            match record {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding undecodable mutation");
                    match self.store.delete(SYNC_QUEUE, &key).await {
                        Ok(_) => report.discarded += 1,
                        Err(e) => tracing::warn!(key = %key, error = %e, "failed to discard mutation"),
                    }
                }
            }
        }
        Ok(self.chronological(records))
    }

    /// Number of stored mutations.
    pub async fn len(&self) -> QueueResult<usize> {
        Ok(self.store.count(SYNC_QUEUE).await?)
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Dropped mutations, oldest drop first.
    pub async fn dead_letters(&self) -> QueueResult<Vec<DeadLetter>> {
        let mut letters: Vec<DeadLetter> = self
            .store
            .values::<DeadLetter>(DEAD_LETTER)
            .await?
            .into_iter()
            .map(|(_, letter)| letter)
            .collect();
        letters.sort_by_key(|l| l.dropped_at);
        Ok(letters)
    }

    /// Replay pending mutations in chronological order, one at a time.
    ///
    /// Returns immediately with `already_running` set if another drain is in
    /// flight. Per-record failures, replay or storage, are counted in the
    /// report and never returned. Only a failure to read the queue at all is.
    pub async fn process_queue(&self) -> QueueResult<DrainReport> {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            self.metrics.record_rejected();
            tracing::debug!("drain already in flight");
            return Ok(DrainReport::busy());
        };

        let mut report = DrainReport::default();
        let records = self.load_batch(&mut report).await?;

        for record in records {
            if self.cooling_down(&record, self.clock.now_ms()) {
                report.skipped += 1;
                continue;
            }

            match self.transport.replay(&record).await {
                Ok(()) => {
                    report.replayed += 1;
                    if let Err(e) = self.store.delete(SYNC_QUEUE, record.id.as_str()).await {
                        tracing::warn!(id = %record.id, error = %e, "replayed mutation could not be removed");
                    } else {
                        tracing::debug!(id = %record.id, kind = %record.kind, "mutation replayed");
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    let id = record.id.clone();
                    match self.fail(record, &e).await {
                        Ok(true) => report.dropped += 1,
                        Ok(false) => {}
                        Err(store_err) => {
                            tracing::warn!(id = %id, error = %store_err, "failed attempt could not be persisted");
                        }
                    }
                }
            }
        }

        self.metrics
            .record_drain(report.replayed, report.failed, report.dropped, self.clock.now_ms());
        if report.attempted() > 0 || report.skipped > 0 || report.discarded > 0 {
            tracing::info!(
                replayed = report.replayed,
                failed = report.failed,
                dropped = report.dropped,
                skipped = report.skipped,
                discarded = report.discarded,
                "drain complete"
            );
        }
        Ok(report)
    }

    /// Persist a failed attempt. Returns whether the record was dropped.
    async fn fail(&self, mut record: MutationRecord, error: &ReplayError) -> QueueResult<bool> {
        let now = self.clock.now_ms();
        record.record_failure(now);

        if !record.is_exhausted(self.config.max_attempts) {
            tracing::debug!(
                id = %record.id,
                attempt = record.attempt_count,
                error = %error,
                "replay failed, will retry"
            );
            self.store.put(SYNC_QUEUE, record.id.as_str(), &record).await?;
            return Ok(false);
        }

        tracing::warn!(
            id = %record.id,
            kind = %record.kind,
            attempts = record.attempt_count,
            error = %error,
            "dropping mutation after final attempt"
        );
        self.store.delete(SYNC_QUEUE, record.id.as_str()).await?;

        if self.config.dead_letter {
            let key = record.id.to_string();
            let letter = DeadLetter {
                record,
                dropped_at: now,
                last_error: error.to_string(),
            };
            if let Err(e) = self.store.put(DEAD_LETTER, &key, &letter).await {
                tracing::warn!(id = %key, error = %e, "dead letter could not be written");
            }
        }
        Ok(true)
    }

    fn cooling_down(&self, record: &MutationRecord, now: Timestamp) -> bool {
        let Some(last) = record.last_attempt_at else {
            return false;
        };
        let attempt = record.attempt_count.saturating_sub(1);
        let delay = duration_ms(self.config.backoff.delay_for_attempt(attempt));
        now.saturating_sub(last) < delay
    }

    /// Purge records older than the retention window from every partition.
    pub async fn cleanup(&self) -> QueueResult<CleanupReport> {
        Ok(purge_expired(&self.store, self.clock.now_ms(), self.config.retention_ms()).await?)
    }

    /// Record counts. Storage errors count as zero.
    pub async fn stats(&self) -> OfflineStats {
        OfflineStats::collect(&self.store).await
    }
}
