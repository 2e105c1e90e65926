use chrono::{DateTime, Utc};
use gallery_blob::BlobKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a media record, assigned by the index at insert time
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub String);

impl MediaId {
    /// Generate a new unique media ID
    pub fn new() -> Self {
        Self(format!("img_{}", Uuid::new_v4().simple()))
    }

    /// Create a media ID from a string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MediaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MediaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Record contents supplied by the gateway; the index adds `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaRecord {
    pub blob_key: BlobKey,
    pub locator_url: String,
    pub mime_type: String,
    pub original_name: String,
    pub size_bytes: u64,
}

/// Metadata describing one stored image.
///
/// Immutable once created: there is no update path, only insert and delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: MediaId,
    pub blob_key: BlobKey,
    pub locator_url: String,
    pub mime_type: String,
    pub original_name: String,
    pub size_bytes: u64,
    /// Sole ordering key for listings
    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Materialize a record from its contents plus index-assigned fields
    pub fn from_new(id: MediaId, record: NewMediaRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            blob_key: record.blob_key,
            locator_url: record.locator_url,
            mime_type: record.mime_type,
            original_name: record.original_name,
            size_bytes: record.size_bytes,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_ids_are_unique_and_prefixed() {
        let a = MediaId::new();
        let b = MediaId::new();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("img_"));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = MediaRecord::from_new(
            MediaId::from("img_1"),
            NewMediaRecord {
                blob_key: BlobKey::from("images/a"),
                locator_url: "memory://images/a".to_string(),
                mime_type: "image/png".to_string(),
                original_name: "a.png".to_string(),
                size_bytes: 1024,
            },
            Utc::now(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "img_1");
        assert_eq!(json["blobKey"], "images/a");
        assert_eq!(json["originalName"], "a.png");
        assert_eq!(json["sizeBytes"], 1024);
        assert!(json.get("createdAt").is_some());
    }
}
