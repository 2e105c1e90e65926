use thiserror::Error;

/// Result type for media gateway operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Failures surfaced by the media gateway.
///
/// Each variant names the store (and step) that failed so callers can tell a
/// rejected file from a storage problem worth retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Bad type, size or batch shape. Nothing was written.
    #[error("Validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// Blob write failed. No metadata was written.
    #[error("Blob write failed: {reason}")]
    BlobWriteFailed { reason: String },

    /// Metadata insert failed after the blob was written. The blob was
    /// compensated (or handed to the sweeper).
    #[error("Metadata write failed: {reason}")]
    MetadataWriteFailed { reason: String },

    #[error("Blob delete failed for {key}: {reason}")]
    BlobDeleteFailed { key: String, reason: String },

    /// Metadata delete failed. Nothing was deleted.
    #[error("Metadata delete failed for {id}: {reason}")]
    MetadataDeleteFailed { id: String, reason: String },

    #[error("Media not found: {id}")]
    NotFound { id: String },

    /// The metadata index could not be read
    #[error("Store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}

impl MediaError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            reason: reason.into(),
        }
    }

    pub fn blob_write(reason: impl std::fmt::Display) -> Self {
        Self::BlobWriteFailed {
            reason: reason.to_string(),
        }
    }

    pub fn metadata_write(reason: impl std::fmt::Display) -> Self {
        Self::MetadataWriteFailed {
            reason: reason.to_string(),
        }
    }

    pub fn blob_delete(key: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::BlobDeleteFailed {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn metadata_delete(id: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::MetadataDeleteFailed {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            reason: reason.to_string(),
        }
    }

    /// File rejected for type/size; retrying the same input cannot help
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed { .. })
    }

    /// Storage-side failure where a retry may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ValidationFailed { .. } | Self::NotFound { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation-failed",
            Self::BlobWriteFailed { .. } => "blob-write-failed",
            Self::MetadataWriteFailed { .. } => "metadata-write-failed",
            Self::BlobDeleteFailed { .. } => "blob-delete-failed",
            Self::MetadataDeleteFailed { .. } => "metadata-delete-failed",
            Self::NotFound { .. } => "not-found",
            Self::StoreUnavailable { .. } => "store-unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(!MediaError::validation("bad type").is_retryable());
        assert!(!MediaError::not_found("img_1").is_retryable());
        assert!(MediaError::blob_write("timeout").is_retryable());
        assert!(MediaError::metadata_delete("img_1", "timeout").is_retryable());
    }

    #[test]
    fn test_display_names_the_failing_store() {
        let err = MediaError::metadata_write("quota exceeded");
        assert_eq!(err.to_string(), "Metadata write failed: quota exceeded");
        assert_eq!(err.code(), "metadata-write-failed");
    }
}
