//! # gallery-blob: blob store adapter for the image gallery
//!
//! Binary image content lives here; descriptive metadata lives in
//! `gallery-index`. This crate only knows about bytes, keys and locators.
//!
//! ```text
//! ┌─────────────────┐
//! │  MediaGateway   │  ← consistency policy (gallery-media)
//! ├─────────────────┤
//! │   BlobAdapter   │  ← key generation, locators
//! ├─────────────────┤
//! │   BlobStore     │  ← storage primitives (memory, S3-compatible)
//! └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use gallery_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let adapter = BlobAdapter::new(MemoryBlobStore::new());
//!
//! let receipt = adapter
//!     .put(bytes::Bytes::from_static(b"\x89PNG"), Some("image/png"), "cat.png")
//!     .await?;
//!
//! assert!(adapter.exists(&receipt.key).await?);
//! adapter.delete(&receipt.key).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod error;
mod memory_store;
mod receipt;
mod s3_store;
pub mod store;
mod types;

pub use adapter::BlobAdapter;
pub use error::{BlobError, BlobResult};
pub use memory_store::MemoryBlobStore;
pub use receipt::BlobReceipt;
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{
    BlobInfo, BlobKeyStrategy, BlobStore, DefaultKeyStrategy, GetResult, ObjectHead, PutResult,
};
pub use types::{once_stream, BlobKey, ByteStream};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobAdapter, BlobError, BlobKey, BlobReceipt, BlobResult, BlobStore, ByteStream,
        MemoryBlobStore,
    };
}
