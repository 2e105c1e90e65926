use bytes::Bytes;
use gallery_blob::BlobKey;
use gallery_index::MediaRecord;

use crate::MediaError;

/// One file submitted for ingest
#[derive(Debug, Clone)]
pub struct IngestItem {
    pub content: Bytes,
    pub declared_mime_type: String,
    pub original_name: String,
    pub size_bytes: u64,
}

impl IngestItem {
    pub fn new<C, M, N>(content: C, declared_mime_type: M, original_name: N) -> Self
    where
        C: Into<Bytes>,
        M: Into<String>,
        N: Into<String>,
    {
        let content = content.into();
        Self {
            size_bytes: content.len() as u64,
            content,
            declared_mime_type: declared_mime_type.into(),
            original_name: original_name.into(),
        }
    }

    /// Override the declared size (defaults to the content length)
    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

/// Result for a single item of an ingest batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Stored(MediaRecord),
    Failed(MediaError),
}

impl ItemOutcome {
    pub fn record(&self) -> Option<&MediaRecord> {
        match self {
            Self::Stored(record) => Some(record),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&MediaError> {
        match self {
            Self::Stored(_) => None,
            Self::Failed(err) => Some(err),
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }
}

/// Aggregate shape of an ingest batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Empty,
    AllSucceeded,
    AllFailed,
    Partial,
}

/// Per-item outcomes of an ingest call, in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl IngestReport {
    pub fn new(outcomes: Vec<ItemOutcome>) -> Self {
        Self { outcomes }
    }

    /// The same failure for every submitted item
    pub fn rejected(count: usize, error: MediaError) -> Self {
        Self {
            outcomes: (0..count).map(|_| ItemOutcome::Failed(error.clone())).collect(),
        }
    }

    pub fn status(&self) -> BatchStatus {
        let stored = self.outcomes.iter().filter(|o| o.is_stored()).count();
        match (stored, self.outcomes.len()) {
            (_, 0) => BatchStatus::Empty,
            (s, n) if s == n => BatchStatus::AllSucceeded,
            (0, _) => BatchStatus::AllFailed,
            _ => BatchStatus::Partial,
        }
    }

    pub fn succeeded(&self) -> Vec<&MediaRecord> {
        self.outcomes.iter().filter_map(ItemOutcome::record).collect()
    }

    /// Failed items with their position in the submitted batch
    pub fn failed(&self) -> Vec<(usize, &MediaError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.error().map(|e| (i, e)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// How a successful retire ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetireOutcome {
    /// Record and blob are both gone
    Clean,
    /// Record is gone; the blob delete failed and the key awaits the sweeper
    BlobOrphaned { blob_key: BlobKey },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> ItemOutcome {
        ItemOutcome::Failed(MediaError::validation("nope"))
    }

    fn stored() -> ItemOutcome {
        ItemOutcome::Stored(MediaRecord {
            id: "img_1".into(),
            blob_key: BlobKey::from("images/a"),
            locator_url: "memory://images/a".to_string(),
            mime_type: "image/png".to_string(),
            original_name: "a.png".to_string(),
            size_bytes: 1,
            created_at: chrono::Utc::now(),
        })
    }

    #[test]
    fn test_batch_status() {
        assert_eq!(IngestReport::default().status(), BatchStatus::Empty);
        assert_eq!(IngestReport::new(vec![stored(), stored()]).status(), BatchStatus::AllSucceeded);
        assert_eq!(IngestReport::new(vec![failure(), failure()]).status(), BatchStatus::AllFailed);
        assert_eq!(IngestReport::new(vec![stored(), failure()]).status(), BatchStatus::Partial);
    }

    #[test]
    fn test_failed_keeps_positions() {
        let report = IngestReport::new(vec![stored(), failure(), stored()]);

        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 1);
        assert_eq!(report.succeeded().len(), 2);
    }

    #[test]
    fn test_item_size_defaults_to_content_length() {
        let item = IngestItem::new(&b"abc"[..], "image/png", "a.png");
        assert_eq!(item.size_bytes, 3);
        assert_eq!(item.with_size_bytes(1024).size_bytes, 1024);
    }
}
