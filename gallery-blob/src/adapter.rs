use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use crate::{
    once_stream, BlobInfo, BlobKey, BlobKeyStrategy, BlobReceipt, BlobResult, BlobStore,
    DefaultKeyStrategy, GetResult,
};

/// Blob adapter embedded by the media gateway and the sweeper.
///
/// Owns key generation so callers never choose a key themselves. Cloning is
/// cheap; clones share the same store.
#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    keys: Arc<dyn BlobKeyStrategy>,
}

impl BlobAdapter {
    /// Create a new blob adapter
    pub fn new<S: BlobStore + 'static>(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Create from a shared store handle
    pub fn from_arc(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            keys: Arc::new(DefaultKeyStrategy::default()),
        }
    }

    /// Replace the key strategy
    pub fn with_key_strategy<K: BlobKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Store new content under a freshly generated key.
    ///
    /// Returns only once the store has confirmed the write.
    pub async fn put(
        &self,
        content: Bytes,
        content_type: Option<&str>,
        original_name: &str,
    ) -> BlobResult<BlobReceipt> {
        let key = self.keys.object_key(original_name, Utc::now());
        debug!(key = %key, bytes = content.len(), "writing blob");

        let result = self
            .store
            .put(key.as_str(), content_type, once_stream(content))
            .await?;

        let locator = self.store.locator(key.as_str());
        let mut receipt = BlobReceipt::new(key, locator, result.size_bytes);

        if let Some(ct) = content_type {
            receipt = receipt.with_content_type(ct);
        }
        if let Some(etag) = result.etag {
            receipt = receipt.with_etag(etag);
        }

        Ok(receipt)
    }

    /// Open a blob for reading
    pub async fn open(&self, key: &BlobKey) -> BlobResult<GetResult> {
        self.store.get(key.as_str()).await
    }

    /// Delete a blob
    pub async fn delete(&self, key: &BlobKey) -> BlobResult<()> {
        self.store.delete(key.as_str()).await
    }

    /// Whether a blob is present
    pub async fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        self.store.exists(key.as_str()).await
    }

    /// Every blob written through this adapter's key strategy
    pub async fn list(&self) -> BlobResult<Vec<BlobInfo>> {
        self.store.list(Some(self.keys.prefix())).await
    }

    /// Locator for a key
    pub fn locator(&self, key: &BlobKey) -> String {
        self.store.locator(key.as_str())
    }
}
