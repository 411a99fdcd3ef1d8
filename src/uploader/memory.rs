//! # In-Memory Backend
//!
//! Storage backend for tests and ephemeral use. Counts writes and can be told
//! to fail writes or deletes so callers' error paths can be exercised.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::backend::StorageBackend;
use super::errors::{UploadError, UploadResult};

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
    deletes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful deletes so far
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every following write fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following delete fail with an I/O error
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> UploadResult<Vec<String>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| UploadError::Internal("Lock poisoned".to_string()))?;
        Ok(objects.keys().cloned().collect())
    }
}

impl StorageBackend for MemoryBackend {
    fn write(&self, path: &str, data: &[u8]) -> UploadResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(UploadError::IoError(format!("simulated write failure: {}", path)));
        }
        let mut objects = self
            .objects
            .write()
            .map_err(|_| UploadError::Internal("Lock poisoned".to_string()))?;
        objects.insert(path.to_string(), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, path: &str) -> UploadResult<Vec<u8>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| UploadError::Internal("Lock poisoned".to_string()))?;
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| UploadError::ObjectNotFound(path.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> UploadResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(UploadError::IoError(format!("simulated write failure: {}", to)));
        }
        let mut objects = self
            .objects
            .write()
            .map_err(|_| UploadError::Internal("Lock poisoned".to_string()))?;
        let data = objects
            .remove(from)
            .ok_or_else(|| UploadError::ObjectNotFound(from.to_string()))?;
        objects.insert(to.to_string(), data);
        Ok(())
    }

    fn delete(&self, path: &str) -> UploadResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(UploadError::IoError(format!("simulated delete failure: {}", path)));
        }
        let mut objects = self
            .objects
            .write()
            .map_err(|_| UploadError::Internal("Lock poisoned".to_string()))?;
        objects
            .remove(path)
            .ok_or_else(|| UploadError::ObjectNotFound(path.to_string()))?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exists(&self, path: &str) -> UploadResult<bool> {
        let objects = self
            .objects
            .read()
            .map_err(|_| UploadError::Internal("Lock poisoned".to_string()))?;
        Ok(objects.contains_key(path))
    }

    fn list(&self, prefix: &str) -> UploadResult<Vec<String>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| UploadError::Internal("Lock poisoned".to_string()))?;

        let dir = format!("{}/", prefix);
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(&dir) && !k[dir.len()..].contains('/'))
            .cloned()
            .collect())
    }

    fn resolve(&self, path: &str) -> PathBuf {
        PathBuf::from("/memory").join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_delete() {
        let backend = MemoryBackend::new();

        backend.write("a/b.txt", b"data").unwrap();
        assert_eq!(backend.read("a/b.txt").unwrap(), b"data");
        assert_eq!(backend.write_count(), 1);

        backend.delete("a/b.txt").unwrap();
        assert!(!backend.exists("a/b.txt").unwrap());
        assert_eq!(backend.delete_count(), 1);
        assert!(backend.delete("a/b.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_replaces_target() {
        let backend = MemoryBackend::new();
        backend.write("a/live.txt", b"old").unwrap();
        backend.write("a/.pending/next.txt", b"new").unwrap();

        backend.rename("a/.pending/next.txt", "a/live.txt").unwrap();
        assert_eq!(backend.read("a/live.txt").unwrap(), b"new");
        assert!(!backend.exists("a/.pending/next.txt").unwrap());
        assert!(backend.rename("a/.pending/next.txt", "a/live.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_direct_children_only() {
        let backend = MemoryBackend::new();
        backend.write("dir/one.txt", b"1").unwrap();
        backend.write("dir/sub/two.txt", b"2").unwrap();
        backend.write("dirx/three.txt", b"3").unwrap();

        assert_eq!(backend.list("dir").unwrap(), vec!["dir/one.txt".to_string()]);
    }

    #[test]
    fn test_simulated_failures() {
        let backend = MemoryBackend::new();
        backend.write("keep.txt", b"x").unwrap();

        backend.set_fail_deletes(true);
        assert!(matches!(
            backend.delete("keep.txt"),
            Err(UploadError::IoError(_))
        ));
        assert!(backend.exists("keep.txt").unwrap());

        backend.set_fail_writes(true);
        assert!(backend.write("other.txt", b"y").is_err());
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn test_resolve_is_virtual() {
        let backend = MemoryBackend::new();
        assert_eq!(
            backend.resolve("uploads/x.txt"),
            PathBuf::from("/memory/uploads/x.txt")
        );
    }
}
