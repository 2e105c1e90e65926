use std::collections::BTreeSet;
use std::sync::Arc;

use gallery_blob::BlobKey;
use parking_lot::Mutex;

/// Blob keys known to have lost their record, waiting for the sweeper.
///
/// Shared between the gateway (producer) and the sweeper (consumer).
/// Entries are de-duplicated.
#[derive(Clone, Default)]
pub struct OrphanBacklog {
    keys: Arc<Mutex<BTreeSet<BlobKey>>>,
}

impl OrphanBacklog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the key was already queued
    pub fn push(&self, key: BlobKey) -> bool {
        self.keys.lock().insert(key)
    }

    pub fn remove(&self, key: &BlobKey) -> bool {
        self.keys.lock().remove(key)
    }

    pub fn contains(&self, key: &BlobKey) -> bool {
        self.keys.lock().contains(key)
    }

    /// Point-in-time copy; entries stay queued until removed
    pub fn snapshot(&self) -> Vec<BlobKey> {
        self.keys.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_deduplicates() {
        let backlog = OrphanBacklog::new();

        assert!(backlog.push(BlobKey::from("images/a")));
        assert!(!backlog.push(BlobKey::from("images/a")));
        assert_eq!(backlog.len(), 1);

        let shared = backlog.clone();
        assert!(shared.remove(&BlobKey::from("images/a")));
        assert!(backlog.is_empty());
    }
}
