use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::RwLock;

use crate::{
    once_stream, BlobError, BlobInfo, BlobKey, BlobResult, BlobStore, ByteStream, GetResult,
    ObjectHead, PutResult,
};

#[derive(Debug, Clone)]
struct StoredObject {
    content: Bytes,
    content_type: Option<String>,
    etag: String,
    /// `None` models a backend that reports no modification time
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Faults {
    failing_puts: AtomicUsize,
    fail_deletes: AtomicBool,
    fail_heads: AtomicBool,
    fail_lists: AtomicBool,
}

/// In-memory blob store for testing and development.
///
/// Clones share state, so a test can keep a handle while the gateway owns
/// another one.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    put_attempts: Arc<AtomicUsize>,
    faults: Arc<Faults>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn injected(operation: &str, key: &str) -> BlobError {
        BlobError::backend_msg(format!("injected {} failure for {}", operation, key))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        mut stream: ByteStream,
    ) -> BlobResult<PutResult> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .faults
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Self::injected("put", key));
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        let content = buffer.freeze();
        let size_bytes = content.len() as u64;
        let etag = format!("\"{}\"", uuid::Uuid::new_v4().simple());

        let mut objects = self.objects.write();
        if objects.contains_key(key) {
            return Err(BlobError::already_exists(key));
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                content,
                content_type: content_type.map(str::to_string),
                etag: etag.clone(),
                created_at: Some(Utc::now()),
            },
        );

        Ok(PutResult {
            etag: Some(etag),
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let object = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(key))?;

        Ok(GetResult {
            size_bytes: object.content.len() as u64,
            stream: once_stream(object.content),
            content_type: object.content_type,
            etag: Some(object.etag),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        if self.faults.fail_heads.load(Ordering::SeqCst) {
            return Err(Self::injected("head", key));
        }

        let objects = self.objects.read();
        let object = objects.get(key).ok_or_else(|| BlobError::not_found(key))?;

        Ok(ObjectHead {
            size_bytes: object.content.len() as u64,
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
            last_modified: object.created_at,
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        if self.faults.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete", key));
        }

        self.objects.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        if self.faults.fail_lists.load(Ordering::SeqCst) {
            return Err(Self::injected("list", prefix.unwrap_or("")));
        }

        let objects = self.objects.read();
        Ok(objects
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, object)| BlobInfo {
                key: BlobKey::from(key.as_str()),
                size_bytes: object.content.len() as u64,
                last_modified: object.created_at,
            })
            .collect())
    }

    fn locator(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}

/// Test helpers for deterministic failure and ageing scenarios
impl MemoryBlobStore {
    /// Make the next `count` puts fail before anything is stored
    pub fn fail_next_puts(&self, count: usize) {
        self.faults.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Make every delete fail until turned off again
    pub fn set_fail_deletes(&self, fail: bool) {
        self.faults.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every head (and therefore `exists`) fail until turned off again
    pub fn set_fail_heads(&self, fail: bool) {
        self.faults.fail_heads.store(fail, Ordering::SeqCst);
    }

    /// Make every list fail until turned off again
    pub fn set_fail_lists(&self, fail: bool) {
        self.faults.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Number of put calls received, including failed ones
    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Whether a key is stored, bypassing fault injection
    pub fn contains(&self, key: &BlobKey) -> bool {
        self.objects.read().contains_key(key.as_str())
    }

    /// Store an object directly, as if written by a crashed ingest.
    ///
    /// Pass `None` for an object whose age the store cannot report.
    pub fn insert_raw(
        &self,
        key: &BlobKey,
        content: Bytes,
        created_at: Option<DateTime<Utc>>,
    ) {
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                content,
                content_type: None,
                etag: format!("\"{}\"", uuid::Uuid::new_v4().simple()),
                created_at,
            },
        );
    }

    /// Shift an object's creation time into the past
    pub fn backdate(&self, key: &BlobKey, by: chrono::Duration) {
        if let Some(object) = self.objects.write().get_mut(key.as_str()) {
            object.created_at = object.created_at.map(|at| at - by);
        }
    }

    /// Drop an object without going through the gateway
    pub fn evict(&self, key: &BlobKey) {
        self.objects.write().remove(key.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_refuses_overwrite() {
        let store = MemoryBlobStore::new();
        store
            .put("images/a", Some("image/png"), once_stream(Bytes::from_static(b"a")))
            .await
            .unwrap();

        let result = store
            .put("images/a", Some("image/png"), once_stream(Bytes::from_static(b"b")))
            .await;

        assert!(matches!(result, Err(BlobError::AlreadyExists { .. })));
        let head = store.head("images/a").await.unwrap();
        assert_eq!(head.size_bytes, 1);
    }

    #[tokio::test]
    async fn test_injected_put_failure_stores_nothing() {
        let store = MemoryBlobStore::new();
        store.fail_next_puts(1);

        let failed = store.put("images/a", None, once_stream(Bytes::from_static(b"a"))).await;
        assert!(matches!(failed, Err(BlobError::Backend { .. })));
        assert!(store.is_empty());

        store.put("images/a", None, once_stream(Bytes::from_static(b"a"))).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.put_attempts(), 2);
    }

    #[tokio::test]
    async fn test_exists_distinguishes_missing_from_failure() {
        let store = MemoryBlobStore::new();
        assert!(!store.exists("images/missing").await.unwrap());

        store.set_fail_heads(true);
        assert!(store.exists("images/missing").await.is_err());
    }

    #[tokio::test]
    async fn test_backdate_and_list_prefix() {
        let store = MemoryBlobStore::new();
        let key = BlobKey::from("images/old");
        store.insert_raw(&key, Bytes::from_static(b"x"), Some(Utc::now()));
        store.insert_raw(&BlobKey::from("other/x"), Bytes::from_static(b"y"), Some(Utc::now()));

        store.backdate(&key, chrono::Duration::hours(2));

        let listed = store.list(Some("images/")).await.unwrap();
        assert_eq!(listed.len(), 1);
        let age = Utc::now() - listed[0].last_modified.unwrap();
        assert!(age >= chrono::Duration::hours(2));
    }

    #[tokio::test]
    async fn test_undated_object_reports_no_timestamp() {
        let store = MemoryBlobStore::new();
        let key = BlobKey::from("images/undated");
        store.insert_raw(&key, Bytes::from_static(b"x"), None);

        let listed = store.list(None).await.unwrap();
        assert_eq!(listed[0].last_modified, None);
        assert_eq!(store.head("images/undated").await.unwrap().last_modified, None);
    }
}
