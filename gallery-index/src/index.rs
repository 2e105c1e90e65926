use async_trait::async_trait;
use gallery_blob::BlobKey;

use crate::{IndexResult, MediaId, MediaRecord, NewMediaRecord};

/// Structured store of media records.
///
/// Implementations must be safe under concurrent writers to distinct ids.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Insert a record, assigning its id and creation time
    async fn insert(&self, record: NewMediaRecord) -> IndexResult<MediaRecord>;

    /// Point lookup; `IndexError::NotFound` when absent
    async fn get(&self, id: &MediaId) -> IndexResult<MediaRecord>;

    /// All records, newest `created_at` first, later insertion first on ties
    async fn list_ordered(&self) -> IndexResult<Vec<MediaRecord>>;

    /// Remove a record; `IndexError::NotFound` when absent
    async fn delete(&self, id: &MediaId) -> IndexResult<()>;

    /// Record referencing a blob, if any
    async fn find_by_blob_key(&self, key: &BlobKey) -> IndexResult<Option<MediaRecord>> {
        Ok(self
            .list_ordered()
            .await?
            .into_iter()
            .find(|record| &record.blob_key == key))
    }
}
