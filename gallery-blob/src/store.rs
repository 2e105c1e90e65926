use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use crate::{BlobKey, BlobResult, ByteStream};

/// Core blob storage operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a new blob from a stream. Implementations refuse to overwrite an
    /// existing key when the backend can detect it.
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult>;

    /// Get a blob as a stream
    async fn get(&self, key: &str) -> BlobResult<GetResult>;

    /// Get blob metadata without content
    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    /// Delete a blob. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Enumerate every stored blob, optionally under a prefix
    async fn list(&self, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>>;

    /// Externally resolvable address for a key
    fn locator(&self, key: &str) -> String;

    /// Whether a blob is present. `NotFound` maps to `false`, other errors propagate.
    async fn exists(&self, key: &str) -> BlobResult<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Metadata about a blob
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Listing entry for a stored blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: BlobKey,
    pub size_bytes: u64,
    /// `None` when the backend cannot report an age
    pub last_modified: Option<DateTime<Utc>>,
}

/// Strategy for generating blob keys
pub trait BlobKeyStrategy: Send + Sync {
    /// Generate a fresh, never-before-used key for an uploaded file
    fn object_key(&self, original_name: &str, now: DateTime<Utc>) -> BlobKey;

    /// Prefix under which every generated key lives (used for listing)
    fn prefix(&self) -> &str;
}

/// Default key strategy: images/year/month/{stem}_{millis}_{uuid}
#[derive(Debug, Clone)]
pub struct DefaultKeyStrategy {
    folder: String,
}

impl DefaultKeyStrategy {
    const MAX_STEM_LEN: usize = 64;

    pub fn new<S: Into<String>>(folder: S) -> Self {
        Self { folder: folder.into() }
    }

    /// File stem reduced to a key-safe alphabet
    fn sanitize_stem(original_name: &str) -> String {
        let stem = match original_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => original_name,
        };

        let cleaned: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(Self::MAX_STEM_LEN)
            .collect();

        if cleaned.trim_matches('_').is_empty() {
            "image".to_string()
        } else {
            cleaned
        }
    }
}

impl Default for DefaultKeyStrategy {
    fn default() -> Self {
        Self::new("images")
    }
}

impl BlobKeyStrategy for DefaultKeyStrategy {
    fn object_key(&self, original_name: &str, now: DateTime<Utc>) -> BlobKey {
        BlobKey(format!(
            "{}/{:04}/{:02}/{}_{}_{}",
            self.folder,
            now.year(),
            now.month(),
            Self::sanitize_stem(original_name),
            now.timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    fn prefix(&self) -> &str {
        &self.folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_key_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let key = DefaultKeyStrategy::default().object_key("holiday photo.png", now);

        assert!(key.as_str().starts_with("images/2024/03/holiday_photo_"));
        assert!(key.as_str().contains(&now.timestamp_millis().to_string()));
    }

    #[test]
    fn test_keys_never_repeat() {
        let now = Utc::now();
        let keys = DefaultKeyStrategy::default();

        assert_ne!(keys.object_key("a.png", now), keys.object_key("a.png", now));
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(DefaultKeyStrategy::sanitize_stem("my cat!.jpg"), "my_cat_");
        assert_eq!(DefaultKeyStrategy::sanitize_stem("../../etc/passwd"), "image");
        assert_eq!(DefaultKeyStrategy::sanitize_stem(".png"), "_png");
        assert_eq!(DefaultKeyStrategy::sanitize_stem("???"), "image");
        assert_eq!(DefaultKeyStrategy::sanitize_stem("cat.tar.gz"), "cat_tar");
    }
}
