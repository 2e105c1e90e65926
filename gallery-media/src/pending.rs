use gallery_blob::{BlobAdapter, BlobError, BlobKey};
use tracing::{debug, warn};

use crate::OrphanBacklog;

/// A written blob whose fate is not decided yet.
///
/// Either [`commit`](Self::commit) it (a record now owns it) or
/// [`discard`](Self::discard) it (delete now, queue for the sweeper on
/// failure). Dropping it undecided, e.g. because the caller's future was
/// cancelled, queues the key and fires a best-effort delete on the current
/// runtime.
pub(crate) struct PendingBlob {
    blobs: BlobAdapter,
    backlog: OrphanBacklog,
    key: Option<BlobKey>,
}

impl PendingBlob {
    pub(crate) fn new(blobs: BlobAdapter, backlog: OrphanBacklog, key: BlobKey) -> Self {
        Self {
            blobs,
            backlog,
            key: Some(key),
        }
    }

    /// The blob is now referenced; keep it
    pub(crate) fn commit(mut self) {
        self.key = None;
    }

    /// Delete the blob now. On failure the key is queued for the sweeper and
    /// the error is returned for logging.
    pub(crate) async fn discard(mut self) -> Result<(), BlobError> {
        let Some(key) = self.key.clone() else {
            return Ok(());
        };

        // key stays armed across the await so a cancelled discard still queues it
        let result = self.blobs.delete(&key).await;
        self.key = None;

        if result.is_err() {
            self.backlog.push(key);
        }
        result
    }
}

impl Drop for PendingBlob {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        warn!(blob_key = %key, "blob abandoned before commit; queued for sweeper");
        self.backlog.push(key.clone());

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let blobs = self.blobs.clone();
        let backlog = self.backlog.clone();
        handle.spawn(async move {
            match blobs.delete(&key).await {
                Ok(()) => {
                    backlog.remove(&key);
                    debug!(blob_key = %key, "abandoned blob deleted");
                }
                Err(e) => {
                    warn!(blob_key = %key, error = %e, "abandoned blob delete failed; left for sweeper");
                }
            }
        });
    }
}
