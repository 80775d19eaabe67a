//! Model cache: catalog lookups, progress-reporting downloads and a
//! persistent two-namespace blob store.
//!
//! # Architecture
//!
//! ```text
//! ModelCache ──▶ BlobStore (FsBlobStore | MemoryBlobStore)
//!     │              models/         keyed by catalog id
//!     │              models_by_url/  keyed by source URL
//!     └────────▶ ModelSource (HttpModelSource)
//! ```
//!
//! The cache is independent of the transcription pipeline: load the model
//! bytes once, hand them to
//! [`EngineAdapter::load_model`](crate::stt::EngineAdapter::load_model), then
//! start sessions.

pub mod manager;
pub mod source;
pub mod store;

pub use manager::{AvailableModel, CacheInfo, ModelCache};
pub use source::{ByteStream, CacheError, HttpModelSource, ModelSource, SourceResponse};
pub use store::{BlobStore, CacheEntry, EntryMeta, FsBlobStore, MemoryBlobStore, Namespace, StoreError};
