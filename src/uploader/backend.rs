//! # Storage Backend Trait

use std::path::PathBuf;

use super::errors::UploadResult;

/// Backend trait for durable file storage.
///
/// Paths are `/`-separated keys relative to the backend root.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Write data to path. A reader never observes a partially written file.
    fn write(&self, path: &str, data: &[u8]) -> UploadResult<()>;

    /// Read data from path
    fn read(&self, path: &str) -> UploadResult<Vec<u8>>;

    /// Move content to another key, replacing whatever is there.
    /// `ObjectNotFound` if `from` does not exist.
    fn rename(&self, from: &str, to: &str) -> UploadResult<()>;

    /// Delete file at path. `ObjectNotFound` if nothing is there.
    fn delete(&self, path: &str) -> UploadResult<()>;

    /// Check if path exists
    fn exists(&self, path: &str) -> UploadResult<bool>;

    /// List files directly under prefix
    fn list(&self, prefix: &str) -> UploadResult<Vec<String>>;

    /// Filesystem location of a key. Virtual for non-disk backends.
    fn resolve(&self, path: &str) -> PathBuf;
}
