use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::{IndexError, IndexResult, MediaId, MediaRecord, MetadataIndex, NewMediaRecord};

#[derive(Debug, Clone)]
struct Entry {
    record: MediaRecord,
    seq: u64,
}

#[derive(Debug)]
struct State {
    records: HashMap<MediaId, Entry>,
    next_seq: u64,
    last_created_at: Option<DateTime<Utc>>,
    clock_skew: Duration,
}

impl Default for State {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            next_seq: 0,
            last_created_at: None,
            clock_skew: Duration::zero(),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_inserts: AtomicUsize,
    fail_deletes: AtomicBool,
    fail_reads: AtomicBool,
}

/// In-memory metadata index for testing and development.
///
/// `created_at` never goes backwards: each insert takes the later of the
/// wall clock and the previous insert's timestamp.
#[derive(Clone, Default)]
pub struct MemoryMetadataIndex {
    state: Arc<RwLock<State>>,
    insert_attempts: Arc<AtomicUsize>,
    faults: Arc<Faults>,
}

impl MemoryMetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_reads(&self) -> IndexResult<()> {
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(IndexError::read_failed("injected read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataIndex for MemoryMetadataIndex {
    async fn insert(&self, record: NewMediaRecord) -> IndexResult<MediaRecord> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .faults
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(IndexError::write_failed(format!(
                "injected insert failure for {}",
                record.blob_key
            )));
        }

        let mut state = self.state.write();

        let now = Utc::now() + state.clock_skew;
        let created_at = match state.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        let seq = state.next_seq;
        state.next_seq += 1;
        state.last_created_at = Some(created_at);

        let id = loop {
            let candidate = MediaId::new();
            if !state.records.contains_key(&candidate) {
                break candidate;
            }
        };

        let record = MediaRecord::from_new(id.clone(), record, created_at);
        state.records.insert(
            id,
            Entry {
                record: record.clone(),
                seq,
            },
        );

        debug!(id = %record.id, blob_key = %record.blob_key, "inserted media record");
        Ok(record)
    }

    async fn get(&self, id: &MediaId) -> IndexResult<MediaRecord> {
        self.check_reads()?;

        self.state
            .read()
            .records
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| IndexError::NotFound(id.to_string()))
    }

    async fn list_ordered(&self) -> IndexResult<Vec<MediaRecord>> {
        self.check_reads()?;

        let state = self.state.read();
        let mut entries: Vec<&Entry> = state.records.values().collect();
        entries.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        Ok(entries.into_iter().map(|entry| entry.record.clone()).collect())
    }

    async fn delete(&self, id: &MediaId) -> IndexResult<()> {
        if self.faults.fail_deletes.load(Ordering::SeqCst) {
            return Err(IndexError::delete_failed(format!("injected delete failure for {}", id)));
        }

        match self.state.write().records.remove(id) {
            Some(_) => Ok(()),
            None => Err(IndexError::NotFound(id.to_string())),
        }
    }
}

/// Test helpers for deterministic failure scenarios
impl MemoryMetadataIndex {
    /// Make the next `count` inserts fail without storing anything
    pub fn fail_next_inserts(&self, count: usize) {
        self.faults.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Make every delete fail until turned off again
    pub fn set_fail_deletes(&self, fail: bool) {
        self.faults.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every get and list fail until turned off again
    pub fn set_fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Offset applied to the wall clock for subsequent inserts
    pub fn skew_clock(&self, skew: Duration) {
        self.state.write().clock_skew = skew;
    }

    /// Number of insert calls received, including failed ones
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_blob::BlobKey;

    fn new_record(name: &str) -> NewMediaRecord {
        NewMediaRecord {
            blob_key: BlobKey::from(format!("images/{}", name)),
            locator_url: format!("memory://images/{}", name),
            mime_type: "image/png".to_string(),
            original_name: name.to_string(),
            size_bytes: 10,
        }
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let index = MemoryMetadataIndex::new();

        let record = index.insert(new_record("a.png")).await.unwrap();
        assert_eq!(index.get(&record.id).await.unwrap(), record);

        index.delete(&record.id).await.unwrap();
        assert!(index.get(&record.id).await.unwrap_err().is_not_found());
        assert!(index.delete(&record.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_empty_index_lists_nothing() {
        let index = MemoryMetadataIndex::new();
        assert!(index.list_ordered().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_insertion_tiebreak() {
        let index = MemoryMetadataIndex::new();

        let first = index.insert(new_record("1.png")).await.unwrap();
        let second = index.insert(new_record("2.png")).await.unwrap();
        let third = index.insert(new_record("3.png")).await.unwrap();

        let ids: Vec<MediaId> = index
            .list_ordered()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        // timestamps may collide at clock resolution; insertion order decides then
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn test_created_at_is_monotonic_under_clock_regression() {
        let index = MemoryMetadataIndex::new();

        let before = index.insert(new_record("before.png")).await.unwrap();
        index.skew_clock(Duration::hours(-1));
        let after = index.insert(new_record("after.png")).await.unwrap();

        assert!(after.created_at >= before.created_at);
        assert_eq!(index.list_ordered().await.unwrap()[0].id, after.id);
    }

    #[tokio::test]
    async fn test_injected_insert_failure_stores_nothing() {
        let index = MemoryMetadataIndex::new();
        index.fail_next_inserts(1);

        let result = index.insert(new_record("a.png")).await;
        assert!(matches!(result, Err(IndexError::WriteFailed(_))));
        assert!(index.is_empty());
        assert_eq!(index.insert_attempts(), 1);
    }

    #[tokio::test]
    async fn test_find_by_blob_key() {
        let index = MemoryMetadataIndex::new();
        let record = index.insert(new_record("a.png")).await.unwrap();

        let found = index.find_by_blob_key(&record.blob_key).await.unwrap();
        assert_eq!(found, Some(record));
        assert_eq!(
            index.find_by_blob_key(&BlobKey::from("images/none")).await.unwrap(),
            None
        );
    }
}
