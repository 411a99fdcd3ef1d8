//! # Upload Processor
//!
//! Turns raw uploaded content into durably stored files:
//!
//! 1. `cache`: sanitize the name, run the processing pipeline, hold the result in memory
//! 2. `store`: write cached content to a backend under a collision-resistant identifier
//! 3. `retrieve` / `locate`: get a handle for stored content
//! 4. `store_pending` / `promote`: replace stored content under the same identifier
//!    only once the caller is ready, leaving the old bytes intact until then
//! 5. `remove`: delete stored content
//!
//! Backends are pluggable (`LocalBackend` on disk, `MemoryBackend` for tests).

pub mod backend;
pub mod cache;
pub mod content;
pub mod errors;
pub mod file;
pub mod local;
pub mod memory;
pub mod naming;
pub mod pipeline;
#[allow(clippy::module_inception)]
pub mod uploader;

pub use backend::StorageBackend;
pub use cache::{calculate_checksum, CachedFile};
pub use content::UploadContent;
pub use errors::{UploadError, UploadResult};
pub use file::{PendingFile, StoreScope, StoredFile};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use naming::{sanitize_filename, FilenameStrategy, Identifier};
pub use pipeline::{AllowedExtensions, MaxSize, Pipeline, ProcessedFile, ProcessingError, ProcessingStep};
pub use uploader::{Uploader, DEFAULT_STORE_DIR};
