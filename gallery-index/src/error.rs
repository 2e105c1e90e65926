use thiserror::Error;

/// Result type for metadata index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Infrastructure errors for the metadata index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Metadata write failed: {0}")]
    WriteFailed(String),

    #[error("Metadata delete failed: {0}")]
    DeleteFailed(String),

    #[error("Metadata read failed: {0}")]
    ReadFailed(String),
}

impl IndexError {
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
