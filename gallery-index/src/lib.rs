//! # gallery-index: metadata index for gallery images
//!
//! Stores one fixed-schema [`MediaRecord`] per image. Records reference the
//! binary content through a [`gallery_blob::BlobKey`] and are never mutated
//! in place.

pub mod error;
pub mod index;
pub mod memory;
pub mod record;

pub use error::{IndexError, IndexResult};
pub use index::MetadataIndex;
pub use memory::MemoryMetadataIndex;
pub use record::{MediaId, MediaRecord, NewMediaRecord};
