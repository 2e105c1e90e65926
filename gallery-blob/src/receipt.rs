use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BlobKey;

/// Receipt returned after a blob write has completed durably
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobReceipt {
    pub key: BlobKey,
    pub locator: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlobReceipt {
    /// Create a new blob receipt
    pub fn new(key: BlobKey, locator: String, size_bytes: u64) -> Self {
        Self {
            key,
            locator,
            size_bytes,
            content_type: None,
            etag: None,
            created_at: Utc::now(),
        }
    }

    /// Set content type
    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set etag
    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }
}
