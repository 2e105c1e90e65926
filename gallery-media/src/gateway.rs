use std::sync::Arc;

use futures::stream::{self, StreamExt};
use gallery_blob::BlobAdapter;
use gallery_index::{IndexError, MediaId, MediaRecord, MetadataIndex, NewMediaRecord};
use tracing::{debug, info, instrument, warn};

use crate::pending::PendingBlob;
use crate::validate::{validate_batch, validate_item};
use crate::{
    GatewayConfig, IngestItem, IngestReport, ItemOutcome, MediaError, MediaResult, OrphanBacklog,
    ReconciliationSweeper, RetireOutcome, SweeperConfig,
};

/// Orchestrates the blob store and the metadata index.
///
/// Write ordering is the whole consistency story:
/// - ingest writes the blob, then the record (a record never points at a blob
///   that was not durably written);
/// - retire deletes the record, then the blob (a failure leaves an orphan
///   blob, never a dangling record).
///
/// Holds no cross-store lock. Clones share the same stores and backlog.
#[derive(Clone)]
pub struct MediaGateway {
    blobs: BlobAdapter,
    index: Arc<dyn MetadataIndex>,
    backlog: OrphanBacklog,
    config: Arc<GatewayConfig>,
}

impl MediaGateway {
    pub fn new<I: MetadataIndex + 'static>(blobs: BlobAdapter, index: I, config: GatewayConfig) -> Self {
        Self::from_parts(blobs, Arc::new(index), OrphanBacklog::new(), config)
    }

    pub fn from_parts(
        blobs: BlobAdapter,
        index: Arc<dyn MetadataIndex>,
        backlog: OrphanBacklog,
        config: GatewayConfig,
    ) -> Self {
        Self {
            blobs,
            index,
            backlog,
            config: Arc::new(config),
        }
    }

    /// A sweeper reconciling the same stores and draining the same backlog
    pub fn sweeper(&self, config: SweeperConfig) -> ReconciliationSweeper {
        ReconciliationSweeper::new(
            self.blobs.clone(),
            self.index.clone(),
            self.backlog.clone(),
            config,
        )
    }

    pub fn backlog(&self) -> &OrphanBacklog {
        &self.backlog
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Store a batch of files.
    ///
    /// Items are independent: one failure never aborts the others. Outcomes
    /// come back in submission order. A batch over the file-count limit is
    /// rejected whole, before any store call.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn ingest(&self, items: Vec<IngestItem>) -> IngestReport {
        if let Err(err) = validate_batch(&self.config, items.len()) {
            warn!(error = %err, "ingest batch rejected");
            return IngestReport::rejected(items.len(), err);
        }

        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| async move {
                match self.ingest_one(item).await {
                    Ok(record) => ItemOutcome::Stored(record),
                    Err(err) => ItemOutcome::Failed(err),
                }
            })
            .buffered(self.config.ingest_concurrency.max(1))
            .collect()
            .await;

        let report = IngestReport::new(outcomes);
        info!(status = ?report.status(), stored = report.succeeded().len(), "ingest finished");
        report
    }

    /// Store a single file: validate, write blob, insert record.
    ///
    /// If the insert fails (or this future is dropped after the blob write)
    /// the blob is deleted again; if that also fails it is queued for the
    /// sweeper.
    #[instrument(skip_all, fields(name = %item.original_name, mime = %item.declared_mime_type))]
    pub async fn ingest_one(&self, item: IngestItem) -> MediaResult<MediaRecord> {
        validate_item(&self.config, &item)?;

        let mime_type = item.declared_mime_type.trim().to_ascii_lowercase();
        let receipt = self
            .blobs
            .put(item.content, Some(&mime_type), &item.original_name)
            .await
            .map_err(|e| {
                warn!(error = %e, "blob write failed");
                MediaError::blob_write(e)
            })?;

        let pending = PendingBlob::new(self.blobs.clone(), self.backlog.clone(), receipt.key.clone());

        let new_record = NewMediaRecord {
            blob_key: receipt.key.clone(),
            locator_url: receipt.locator,
            mime_type,
            original_name: item.original_name,
            size_bytes: item.size_bytes,
        };

        match self.index.insert(new_record).await {
            Ok(record) => {
                pending.commit();
                info!(id = %record.id, blob_key = %record.blob_key, "media stored");
                Ok(record)
            }
            Err(e) => {
                warn!(blob_key = %receipt.key, error = %e, "metadata insert failed; compensating blob write");
                if let Err(cleanup) = pending.discard().await {
                    warn!(
                        blob_key = %receipt.key,
                        error = %MediaError::blob_delete(&receipt.key, cleanup),
                        "compensation failed; blob queued for sweeper"
                    );
                }
                Err(MediaError::metadata_write(e))
            }
        }
    }

    /// Every visible record, newest first. Read-only.
    pub async fn list(&self) -> MediaResult<Vec<MediaRecord>> {
        self.index.list_ordered().await.map_err(MediaError::unavailable)
    }

    /// One record. Blob presence is not checked here; the sweeper catches
    /// records whose blob went missing.
    pub async fn get(&self, id: &MediaId) -> MediaResult<MediaRecord> {
        self.index.get(id).await.map_err(|e| match e {
            IndexError::NotFound(_) => MediaError::not_found(id),
            other => MediaError::unavailable(other),
        })
    }

    /// Remove an image: record first, then blob.
    ///
    /// Fails without side effects when the record delete fails. Once the
    /// record is gone the call succeeds; a failed blob delete is absorbed and
    /// the key is queued for the sweeper.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn retire(&self, id: &MediaId) -> MediaResult<RetireOutcome> {
        let record = self.get(id).await?;

        self.index.delete(id).await.map_err(|e| match e {
            // lost a race with a concurrent retire
            IndexError::NotFound(_) => MediaError::not_found(id),
            other => {
                warn!(error = %other, "metadata delete failed; nothing removed");
                MediaError::metadata_delete(id, other)
            }
        })?;

        let pending = PendingBlob::new(self.blobs.clone(), self.backlog.clone(), record.blob_key.clone());
        match pending.discard().await {
            Ok(()) => {
                debug!(blob_key = %record.blob_key, "blob deleted");
                info!("media retired");
                Ok(RetireOutcome::Clean)
            }
            Err(e) => {
                warn!(
                    blob_key = %record.blob_key,
                    error = %MediaError::blob_delete(&record.blob_key, e),
                    "blob delete failed after record removal; queued for sweeper"
                );
                Ok(RetireOutcome::BlobOrphaned {
                    blob_key: record.blob_key,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_blob::MemoryBlobStore;
    use gallery_index::MemoryMetadataIndex;
    use tracing_test::traced_test;

    fn gateway() -> (MediaGateway, MemoryBlobStore, MemoryMetadataIndex) {
        let store = MemoryBlobStore::new();
        let index = MemoryMetadataIndex::new();
        let gateway = MediaGateway::new(
            BlobAdapter::new(store.clone()),
            index.clone(),
            GatewayConfig::default(),
        );
        (gateway, store, index)
    }

    fn png(name: &str) -> IngestItem {
        IngestItem::new(&b"\x89PNG"[..], "image/png", name)
    }

    #[tokio::test]
    async fn test_ingest_one_stores_both_sides() {
        let (gateway, store, _) = gateway();

        let record = gateway.ingest_one(png("a.png")).await.unwrap();

        assert!(store.contains(&record.blob_key));
        assert_eq!(record.locator_url, format!("memory://{}", record.blob_key));
        assert_eq!(gateway.get(&record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_mime_type_is_normalized() {
        let (gateway, _, _) = gateway();

        let record = gateway
            .ingest_one(IngestItem::new(&b"x"[..], " Image/PNG ", "a.png"))
            .await
            .unwrap();

        assert_eq!(record.mime_type, "image/png");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_compensation_is_logged_not_raised() {
        let (gateway, store, index) = gateway();
        index.fail_next_inserts(1);
        store.set_fail_deletes(true);

        let err = gateway.ingest_one(png("a.png")).await.unwrap_err();

        assert!(matches!(err, MediaError::MetadataWriteFailed { .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(gateway.backlog().len(), 1);
        assert!(logs_contain("compensation failed"));
    }

    #[tokio::test]
    async fn test_retire_missing_record_is_not_found() {
        let (gateway, _, _) = gateway();

        let err = gateway.retire(&MediaId::from("img_missing")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_maps_read_failures_to_unavailable() {
        let (gateway, _, index) = gateway();
        index.set_fail_reads(true);

        let err = gateway.get(&MediaId::from("img_1")).await.unwrap_err();
        assert!(matches!(err, MediaError::StoreUnavailable { .. }));
        assert!(gateway.list().await.is_err());
    }
}
