//! # gallery-media: consistent image storage across two stores
//!
//! Image bytes live in a blob store (`gallery-blob`), descriptive metadata in
//! a metadata index (`gallery-index`). The [`MediaGateway`] is the only
//! steady-state writer of both and keeps them consistent through ordering,
//! not locking:
//!
//! - **Ingest**: blob first, record second. A failed record insert deletes the
//!   blob again (compensation).
//! - **Retire**: record first, blob second. A failed blob delete leaves an
//!   orphan, queued in the [`OrphanBacklog`].
//! - **Sweep**: the [`ReconciliationSweeper`] drains the backlog, deletes
//!   orphan blobs older than a grace period, and removes records whose blob
//!   is gone.
//!
//! ## Quick Start
//!
//! ```rust
//! use gallery_media::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> MediaResult<()> {
//! let gateway = MediaGateway::new(
//!     BlobAdapter::new(MemoryBlobStore::new()),
//!     MemoryMetadataIndex::new(),
//!     GatewayConfig::default(),
//! );
//!
//! let report = gateway
//!     .ingest(vec![IngestItem::new(&b"\x89PNG"[..], "image/png", "cat.png")])
//!     .await;
//! assert_eq!(report.status(), BatchStatus::AllSucceeded);
//!
//! let id = report.succeeded()[0].id.clone();
//! assert_eq!(gateway.retire(&id).await?, RetireOutcome::Clean);
//! assert!(gateway.get(&id).await.unwrap_err().is_not_found());
//!
//! let sweeper = gateway.sweeper(SweeperConfig::default());
//! let outcome = sweeper.sweep().await;
//! assert!(outcome.report().is_some());
//! # Ok(())
//! # }
//! ```

mod backlog;
pub mod config;
mod error;
mod gateway;
#[cfg(feature = "tracing-basic")]
pub mod observability;
mod pending;
pub mod sweeper;
mod types;
mod validate;

pub use backlog::OrphanBacklog;
pub use config::{ConfigSnapshot, ConfigStore, GatewayConfig, SweeperConfig};
pub use error::{MediaError, MediaResult};
pub use gateway::MediaGateway;
pub use sweeper::{ReconciliationSweeper, SweepOutcome, SweepReport, SweeperHandle, AUDIT_TARGET};
pub use types::{BatchStatus, IngestItem, IngestReport, ItemOutcome, RetireOutcome};
pub use validate::{validate_batch, validate_item};

pub use gallery_blob::{BlobAdapter, BlobKey, MemoryBlobStore};
pub use gallery_index::{MediaId, MediaRecord, MemoryMetadataIndex, MetadataIndex};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BatchStatus, BlobAdapter, GatewayConfig, IngestItem, IngestReport, ItemOutcome,
        MediaError, MediaGateway, MediaId, MediaRecord, MediaResult, MemoryBlobStore,
        MemoryMetadataIndex, ReconciliationSweeper, RetireOutcome, SweepOutcome, SweeperConfig,
    };
}
