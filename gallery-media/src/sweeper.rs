use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gallery_blob::{BlobAdapter, BlobKey};
use gallery_index::MetadataIndex;
use serde::Serialize;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{OrphanBacklog, SweeperConfig};

/// Shortest period the [`run`](ReconciliationSweeper::run) loop will tick at
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Tracing target for records removed by the dangling pass
pub const AUDIT_TARGET: &str = "gallery::audit";

/// Counters for one reconciliation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub backlog_deleted: usize,
    /// Backlog keys dropped because a record still references them
    pub backlog_referenced: usize,
    /// Backlog keys kept for the next sweep (delete or lookup failed)
    pub backlog_retained: usize,
    pub orphans_deleted: usize,
    pub orphans_too_young: usize,
    pub orphans_unknown_age: usize,
    pub orphan_delete_failures: usize,
    pub dangling_removed: usize,
    pub dangling_delete_failures: usize,
    /// Records whose blob could not be checked; left alone
    pub dangling_unverified: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SweepReport {
    /// Whether the sweep changed either store
    pub fn changed_anything(&self) -> bool {
        self.backlog_deleted + self.orphans_deleted + self.dangling_removed > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was already running; this trigger was folded into it
    Coalesced,
}

impl SweepOutcome {
    pub fn report(&self) -> Option<&SweepReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Coalesced => None,
        }
    }
}

/// Background reconciliation between the blob store and the metadata index.
///
/// Only ever deletes. One sweep runs at a time; overlapping calls return
/// [`SweepOutcome::Coalesced`].
#[derive(Clone)]
pub struct ReconciliationSweeper {
    blobs: BlobAdapter,
    index: Arc<dyn MetadataIndex>,
    backlog: OrphanBacklog,
    config: SweeperConfig,
    active: Arc<Mutex<()>>,
    trigger: Arc<Notify>,
}

impl ReconciliationSweeper {
    pub fn new(
        blobs: BlobAdapter,
        index: Arc<dyn MetadataIndex>,
        backlog: OrphanBacklog,
        config: SweeperConfig,
    ) -> Self {
        Self {
            blobs,
            index,
            backlog,
            config,
            active: Arc::new(Mutex::new(())),
            trigger: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Ask a running [`run`](Self::run) loop for an immediate sweep
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Run one sweep: backlog drain, orphan pass, dangling pass.
    ///
    /// Store errors are recorded in the report, never returned.
    pub async fn sweep(&self) -> SweepOutcome {
        let Ok(_active) = self.active.try_lock() else {
            debug!("sweep already in progress; coalesced");
            return SweepOutcome::Coalesced;
        };

        let started = Instant::now();
        let mut report = SweepReport::default();

        self.drain_backlog(&mut report).await;
        self.orphan_pass(&mut report).await;
        self.dangling_pass(&mut report).await;

        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.changed_anything() || !report.errors.is_empty() {
            info!(
                backlog_deleted = report.backlog_deleted,
                orphans_deleted = report.orphans_deleted,
                dangling_removed = report.dangling_removed,
                errors = report.errors.len(),
                duration_ms = report.duration_ms,
                "sweep finished"
            );
        } else {
            debug!(duration_ms = report.duration_ms, "sweep found nothing to fix");
        }

        SweepOutcome::Completed(report)
    }

    /// Keys whose record is already gone; deleted without a grace period
    async fn drain_backlog(&self, report: &mut SweepReport) {
        for key in self.backlog.snapshot() {
            match self.index.find_by_blob_key(&key).await {
                Ok(Some(record)) => {
                    debug!(blob_key = %key, id = %record.id, "backlog key still referenced; dropped");
                    self.backlog.remove(&key);
                    report.backlog_referenced += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(blob_key = %key, error = %e, "backlog lookup failed; retrying next sweep");
                    report.backlog_retained += 1;
                    continue;
                }
            }

            match self.blobs.delete(&key).await {
                Ok(()) => {
                    self.backlog.remove(&key);
                    report.backlog_deleted += 1;
                    debug!(blob_key = %key, "backlog blob deleted");
                }
                Err(e) => {
                    warn!(blob_key = %key, error = %e, "backlog blob delete failed; retrying next sweep");
                    report.backlog_retained += 1;
                }
            }
        }
    }

    /// Blobs no record references, older than the grace period.
    ///
    /// Blobs are listed before records: a blob written after the listing is
    /// never seen, and one whose record lands after the record listing is
    /// still inside its grace period.
    async fn orphan_pass(&self, report: &mut SweepReport) {
        let blobs = match self.blobs.list().await {
            Ok(blobs) => blobs,
            Err(e) => {
                warn!(error = %e, "blob listing failed; orphan pass skipped");
                report.errors.push(format!("blob list failed: {}", e));
                return;
            }
        };

        let referenced: HashSet<BlobKey> = match self.index.list_ordered().await {
            Ok(records) => records.into_iter().map(|record| record.blob_key).collect(),
            Err(e) => {
                warn!(error = %e, "record listing failed; orphan pass skipped");
                report.errors.push(format!("record list failed: {}", e));
                return;
            }
        };

        let cutoff = chrono::Duration::from_std(self.config.grace_period)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace));

        for blob in blobs {
            if referenced.contains(&blob.key) {
                continue;
            }

            let Some(last_modified) = blob.last_modified else {
                debug!(blob_key = %blob.key, "orphan candidate has no timestamp; skipped");
                report.orphans_unknown_age += 1;
                continue;
            };
            match cutoff {
                Some(cutoff) if last_modified <= cutoff => {}
                _ => {
                    report.orphans_too_young += 1;
                    continue;
                }
            }

            match self.blobs.delete(&blob.key).await {
                Ok(()) => {
                    self.backlog.remove(&blob.key);
                    report.orphans_deleted += 1;
                    info!(blob_key = %blob.key, size_bytes = blob.size_bytes, "orphan blob deleted");
                }
                Err(e) => {
                    warn!(blob_key = %blob.key, error = %e, "orphan blob delete failed");
                    report.orphan_delete_failures += 1;
                }
            }
        }
    }

    /// Records whose blob is confirmed missing
    async fn dangling_pass(&self, report: &mut SweepReport) {
        let records = match self.index.list_ordered().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "record listing failed; dangling pass skipped");
                report.errors.push(format!("record list failed: {}", e));
                return;
            }
        };

        for record in records {
            match self.blobs.exists(&record.blob_key).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    debug!(id = %record.id, blob_key = %record.blob_key, error = %e, "blob check failed; record left alone");
                    report.dangling_unverified += 1;
                    continue;
                }
            }

            info!(
                target: AUDIT_TARGET,
                id = %record.id,
                blob_key = %record.blob_key,
                locator_url = %record.locator_url,
                mime_type = %record.mime_type,
                original_name = %record.original_name,
                size_bytes = record.size_bytes,
                created_at = %record.created_at,
                "removing dangling media record"
            );

            match self.index.delete(&record.id).await {
                Ok(()) => report.dangling_removed += 1,
                // retired in the meantime
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(id = %record.id, error = %e, "dangling record delete failed");
                    report.dangling_delete_failures += 1;
                }
            }
        }
    }

    /// Sweep on every interval tick and on [`trigger`](Self::trigger) until
    /// `shutdown` resolves. The first sweep runs immediately.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.config.interval.max(MIN_SWEEP_INTERVAL);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval = ?period,
            grace_period = ?self.config.grace_period,
            "starting reconciliation sweeper"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
                _ = self.trigger.notified() => {}
            }

            if let SweepOutcome::Completed(report) = self.sweep().await {
                for error in &report.errors {
                    warn!(error = %error, "sweep incomplete");
                }
            }
        }

        info!("reconciliation sweeper stopped");
    }

    /// Run the loop on the current tokio runtime
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, stopped) = oneshot::channel::<()>();
        let trigger = self.trigger.clone();
        let join = tokio::spawn(self.run(async move {
            let _ = stopped.await;
        }));

        SweeperHandle {
            shutdown: Some(shutdown),
            trigger,
            join,
        }
    }
}

/// Control handle for a spawned sweeper loop. Dropping it stops the loop.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    trigger: Arc<Notify>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Request an immediate sweep
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop the loop and wait for an in-flight sweep to finish
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.join).await {
            warn!(error = %e, "sweeper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use gallery_blob::MemoryBlobStore;
    use gallery_index::{IndexError, IndexResult, MediaId, MediaRecord, MemoryMetadataIndex, NewMediaRecord};

    /// Index whose deletes always lose to a retire that got there first
    struct RetiredMeanwhile {
        inner: MemoryMetadataIndex,
    }

    #[async_trait]
    impl MetadataIndex for RetiredMeanwhile {
        async fn insert(&self, record: NewMediaRecord) -> IndexResult<MediaRecord> {
            self.inner.insert(record).await
        }

        async fn get(&self, id: &MediaId) -> IndexResult<MediaRecord> {
            self.inner.get(id).await
        }

        async fn list_ordered(&self) -> IndexResult<Vec<MediaRecord>> {
            self.inner.list_ordered().await
        }

        async fn delete(&self, id: &MediaId) -> IndexResult<()> {
            self.inner.delete(id).await?;
            Err(IndexError::NotFound(id.to_string()))
        }
    }

    async fn wait_until_gone(store: &MemoryBlobStore, key: &BlobKey) {
        for _ in 0..200 {
            if !store.contains(key) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn old() -> Option<chrono::DateTime<Utc>> {
        Some(Utc::now() - chrono::Duration::hours(2))
    }

    fn sweeper(grace: Duration) -> (ReconciliationSweeper, MemoryBlobStore, MemoryMetadataIndex) {
        let store = MemoryBlobStore::new();
        let index = MemoryMetadataIndex::new();
        let sweeper = ReconciliationSweeper::new(
            BlobAdapter::new(store.clone()),
            Arc::new(index.clone()),
            OrphanBacklog::new(),
            SweeperConfig::default().with_grace_period(grace),
        );
        (sweeper, store, index)
    }

    fn new_record(key: &BlobKey) -> NewMediaRecord {
        NewMediaRecord {
            blob_key: key.clone(),
            locator_url: format!("memory://{}", key),
            mime_type: "image/png".to_string(),
            original_name: "a.png".to_string(),
            size_bytes: 1,
        }
    }

    #[tokio::test]
    async fn test_overlapping_sweep_is_coalesced() {
        let (sweeper, _, _) = sweeper(Duration::ZERO);

        let _running = sweeper.active.try_lock().unwrap();
        assert_eq!(sweeper.sweep().await, SweepOutcome::Coalesced);
    }

    #[tokio::test]
    async fn test_backlog_is_drained_without_grace() {
        let (sweeper, store, _) = sweeper(Duration::from_secs(3600));
        let key = BlobKey::from("images/2026/01/a_1_x");
        store.insert_raw(&key, Bytes::from_static(b"a"), Some(Utc::now()));
        sweeper.backlog.push(key.clone());

        let outcome = sweeper.sweep().await;
        let report = outcome.report().unwrap();

        assert_eq!(report.backlog_deleted, 1);
        assert!(!store.contains(&key));
        assert!(sweeper.backlog.is_empty());
    }

    #[tokio::test]
    async fn test_referenced_backlog_key_is_dropped_not_deleted() {
        let (sweeper, store, index) = sweeper(Duration::ZERO);
        let key = BlobKey::from("images/2026/01/a_1_x");
        store.insert_raw(&key, Bytes::from_static(b"a"), Some(Utc::now()));
        index.insert(new_record(&key)).await.unwrap();
        sweeper.backlog.push(key.clone());

        let outcome = sweeper.sweep().await;

        assert_eq!(outcome.report().unwrap().backlog_referenced, 1);
        assert!(store.contains(&key));
        assert!(sweeper.backlog.is_empty());
    }

    #[tokio::test]
    async fn test_failed_backlog_delete_is_retained() {
        let (sweeper, store, _) = sweeper(Duration::ZERO);
        let key = BlobKey::from("images/2026/01/a_1_x");
        store.insert_raw(&key, Bytes::from_static(b"a"), Some(Utc::now()));
        sweeper.backlog.push(key.clone());
        store.set_fail_deletes(true);

        let outcome = sweeper.sweep().await;

        assert_eq!(outcome.report().unwrap().backlog_retained, 1);
        assert!(sweeper.backlog.contains(&key));
    }

    #[tokio::test]
    async fn test_unverifiable_records_are_kept() {
        let (sweeper, store, index) = sweeper(Duration::ZERO);
        let key = BlobKey::from("images/2026/01/a_1_x");
        store.insert_raw(&key, Bytes::from_static(b"a"), Some(Utc::now()));
        index.insert(new_record(&key)).await.unwrap();
        store.set_fail_heads(true);

        let outcome = sweeper.sweep().await;

        assert_eq!(outcome.report().unwrap().dangling_unverified, 1);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_is_reported() {
        let (sweeper, store, _) = sweeper(Duration::ZERO);
        store.set_fail_lists(true);

        let outcome = sweeper.sweep().await;

        assert_eq!(outcome.report().unwrap().errors.len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_loop_sweeps_and_stops() {
        let (sweeper, store, _) = sweeper(Duration::from_secs(60));
        let key = BlobKey::from("images/2026/01/old_1_x");
        store.insert_raw(&key, Bytes::from_static(b"a"), old());

        let handle = sweeper.spawn();
        wait_until_gone(&store, &key).await;
        handle.shutdown().await;

        assert!(!store.contains(&key));
    }

    #[tokio::test]
    async fn test_undated_orphan_is_never_deleted() {
        let (sweeper, store, _) = sweeper(Duration::ZERO);
        let key = BlobKey::from("images/2026/01/undated_1_x");
        store.insert_raw(&key, Bytes::from_static(b"a"), None);

        let outcome = sweeper.sweep().await;
        let report = outcome.report().unwrap();

        assert_eq!(report.orphans_unknown_age, 1);
        assert_eq!(report.orphans_deleted, 0);
        assert!(store.contains(&key));
    }

    #[tokio::test]
    async fn test_dangling_record_retired_meanwhile_is_not_a_failure() {
        let store = MemoryBlobStore::new();
        let inner = MemoryMetadataIndex::new();
        let record = inner
            .insert(new_record(&BlobKey::from("images/2026/01/gone_1_x")))
            .await
            .unwrap();
        let sweeper = ReconciliationSweeper::new(
            BlobAdapter::new(store),
            Arc::new(RetiredMeanwhile { inner: inner.clone() }),
            OrphanBacklog::new(),
            SweeperConfig::default(),
        );

        let outcome = sweeper.sweep().await;
        let report = outcome.report().unwrap();

        assert_eq!(report.dangling_removed, 0);
        assert_eq!(report.dangling_delete_failures, 0);
        assert!(report.errors.is_empty());
        assert!(inner.get(&record.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let (sweeper, _, _) = sweeper(Duration::ZERO);
        let sweeper = ReconciliationSweeper {
            config: SweeperConfig {
                interval: Duration::ZERO,
                ..SweeperConfig::default()
            },
            ..sweeper
        };

        let run = tokio::spawn(sweeper.run(tokio::time::sleep(Duration::from_millis(20))));

        assert!(run.await.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_runs_sweep_between_ticks() {
        let (sweeper, store, _) = sweeper(Duration::from_secs(60));
        let first = BlobKey::from("images/2026/01/first_1_x");
        store.insert_raw(&first, Bytes::from_static(b"a"), old());

        // the first tick fires immediately; the next one is 15 minutes away
        let handle = sweeper.clone().spawn();
        wait_until_gone(&store, &first).await;
        assert!(!store.contains(&first));

        let second = BlobKey::from("images/2026/01/second_2_x");
        store.insert_raw(&second, Bytes::from_static(b"b"), old());
        handle.trigger();
        wait_until_gone(&store, &second).await;
        assert!(!store.contains(&second));

        let third = BlobKey::from("images/2026/01/third_3_x");
        store.insert_raw(&third, Bytes::from_static(b"c"), old());
        sweeper.trigger();
        wait_until_gone(&store, &third).await;
        assert!(!store.contains(&third));

        handle.shutdown().await;
    }
}
