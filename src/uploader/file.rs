//! # Stored Files

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use super::backend::StorageBackend;
use super::errors::UploadResult;
use super::naming::Identifier;

/// Where a record's files for one field live: `<collection>/<field>/<record id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreScope {
    pub collection: String,
    pub field: String,
    pub record_id: Uuid,
}

impl StoreScope {
    pub fn new(collection: impl Into<String>, field: impl Into<String>, record_id: Uuid) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            record_id,
        }
    }

    /// Directory key under a store dir
    pub fn dir(&self, store_dir: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            store_dir, self.collection, self.field, self.record_id
        )
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.field, self.record_id)
    }
}

/// Handle to durably stored content
#[derive(Debug, Clone)]
pub struct StoredFile {
    identifier: Identifier,
    key: String,
    backend: Arc<dyn StorageBackend>,
}

impl StoredFile {
    pub(crate) fn new(identifier: Identifier, key: String, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            identifier,
            key,
            backend,
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Stored filename (the identifier)
    pub fn filename(&self) -> &str {
        self.identifier.as_str()
    }

    /// Backend key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Filesystem path of the content
    pub fn path(&self) -> PathBuf {
        self.backend.resolve(&self.key)
    }

    pub fn exists(&self) -> UploadResult<bool> {
        self.backend.exists(&self.key)
    }

    pub fn read(&self) -> UploadResult<Vec<u8>> {
        self.backend.read(&self.key)
    }

    pub fn size(&self) -> UploadResult<u64> {
        Ok(self.read()?.len() as u64)
    }
}

/// Content written beside a stored file of the same identifier, waiting to
/// replace it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    identifier: Identifier,
    key: String,
}

impl PendingFile {
    pub(crate) fn new(identifier: Identifier, key: String) -> Self {
        Self { identifier, key }
    }

    /// Identifier the content will be stored under
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Backend key of the waiting content
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for StoredFile {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier && self.key == other.key
    }
}

impl Eq for StoredFile {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::memory::MemoryBackend;

    #[test]
    fn test_scope_dir() {
        let id = Uuid::new_v4();
        let scope = StoreScope::new("notes", "file", id);
        assert_eq!(scope.dir("uploads"), format!("uploads/notes/file/{}", id));
        assert_eq!(scope.to_string(), format!("notes/file/{}", id));
    }

    #[test]
    fn test_stored_file_reads_through_backend() {
        let backend = Arc::new(MemoryBackend::new());
        backend.write("uploads/a.txt", b"abc").unwrap();

        let file = StoredFile::new(
            Identifier::parse("a.txt").unwrap(),
            "uploads/a.txt".to_string(),
            backend,
        );
        assert!(file.exists().unwrap());
        assert_eq!(file.read().unwrap(), b"abc");
        assert_eq!(file.size().unwrap(), 3);
        assert_eq!(file.filename(), "a.txt");
        assert_eq!(file.path(), PathBuf::from("/memory/uploads/a.txt"));
    }
}
