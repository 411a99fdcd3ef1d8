//! # Local Filesystem Backend

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use uuid::Uuid;

use super::backend::StorageBackend;
use super::errors::{UploadError, UploadResult};

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local backend
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory of the backend
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl StorageBackend for LocalBackend {
    fn write(&self, path: &str, data: &[u8]) -> UploadResult<()> {
        let full_path = self.full_path(path);

        let parent = full_path
            .parent()
            .ok_or_else(|| UploadError::InvalidIdentifier(path.to_string()))?;
        fs::create_dir_all(parent)?;

        // Write beside the target, then rename over it
        let tmp_path = parent.join(format!(".upload-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, data)?;
        if let Err(e) = fs::rename(&tmp_path, &full_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn read(&self, path: &str) -> UploadResult<Vec<u8>> {
        fs::read(self.full_path(path)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                UploadError::ObjectNotFound(path.to_string())
            } else {
                UploadError::IoError(e.to_string())
            }
        })
    }

    fn rename(&self, from: &str, to: &str) -> UploadResult<()> {
        let target = self.full_path(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.full_path(from), &target).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                UploadError::ObjectNotFound(from.to_string())
            } else {
                UploadError::IoError(e.to_string())
            }
        })
    }

    fn delete(&self, path: &str) -> UploadResult<()> {
        fs::remove_file(self.full_path(path)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                UploadError::ObjectNotFound(path.to_string())
            } else {
                UploadError::IoError(e.to_string())
            }
        })
    }

    fn exists(&self, path: &str) -> UploadResult<bool> {
        Ok(self.full_path(path).is_file())
    }

    fn list(&self, prefix: &str) -> UploadResult<Vec<String>> {
        let full_path = self.full_path(prefix);
        let mut results = Vec::new();

        if full_path.is_dir() {
            for entry in fs::read_dir(&full_path)? {
                let entry = entry?;
                if !entry.path().is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    // In-flight temp files are not objects
                    if name.starts_with(".upload-") {
                        continue;
                    }
                    results.push(format!("{}/{}", prefix, name));
                }
            }
        }

        results.sort();
        Ok(results)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.full_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write("test.txt", b"hello").unwrap();
        let data = backend.read("test.txt").unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_nested_path() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write("a/b/c/file.txt", b"nested").unwrap();
        let data = backend.read("a/b/c/file.txt").unwrap();
        assert_eq!(data, b"nested");
        assert!(backend.resolve("a/b/c/file.txt").is_file());
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write("same.txt", b"one").unwrap();
        backend.write("same.txt", b"two").unwrap();
        assert_eq!(backend.read("same.txt").unwrap(), b"two");
        assert_eq!(backend.list("").unwrap().len(), 1);
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write("delete-me.txt", b"bye").unwrap();
        assert!(backend.exists("delete-me.txt").unwrap());

        backend.delete("delete-me.txt").unwrap();
        assert!(!backend.exists("delete-me.txt").unwrap());

        let again = backend.delete("delete-me.txt");
        assert!(matches!(again, Err(UploadError::ObjectNotFound(_))));
    }

    #[test]
    fn test_rename_moves_over_existing_file() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write("dir/live.txt", b"old").unwrap();
        backend.write("dir/.pending/next.txt", b"new").unwrap();
        backend.rename("dir/.pending/next.txt", "dir/live.txt").unwrap();

        assert_eq!(backend.read("dir/live.txt").unwrap(), b"new");
        assert!(!backend.exists("dir/.pending/next.txt").unwrap());
        assert_eq!(backend.list("dir").unwrap(), vec!["dir/live.txt".to_string()]);

        let missing = backend.rename("dir/.pending/next.txt", "dir/live.txt");
        assert!(matches!(missing, Err(UploadError::ObjectNotFound(_))));
    }

    #[test]
    fn test_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        let result = backend.read("nonexistent.txt");
        assert!(matches!(result, Err(UploadError::ObjectNotFound(_))));
    }

    #[test]
    fn test_list_sorted() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write("dir/b.txt", b"b").unwrap();
        backend.write("dir/a.txt", b"a").unwrap();
        assert_eq!(
            backend.list("dir").unwrap(),
            vec!["dir/a.txt".to_string(), "dir/b.txt".to_string()]
        );
        assert!(backend.list("missing").unwrap().is_empty());
    }
}
