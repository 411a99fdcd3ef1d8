//! # Upload Content
//!
//! Raw bytes plus the name they arrived under.

use std::fs;
use std::path::Path;

use super::errors::{UploadError, UploadResult};

/// Content handed to an uploader: a byte source with a derivable name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadContent {
    original_filename: String,
    data: Vec<u8>,
}

impl UploadContent {
    /// Content from bytes with an explicit name
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> UploadResult<Self> {
        let original_filename = filename.into();
        if original_filename.trim().is_empty() {
            return Err(UploadError::InvalidFilename(original_filename));
        }
        Ok(Self {
            original_filename,
            data: data.into(),
        })
    }

    /// Content read from a file; the name is the final path component
    pub fn from_path(path: impl AsRef<Path>) -> UploadResult<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::InvalidFilename(path.display().to_string()))?;
        let data = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UploadError::ObjectNotFound(path.display().to_string())
            } else {
                UploadError::IoError(e.to_string())
            }
        })?;
        Self::from_bytes(filename, data)
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<u8>) {
        (self.original_filename, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_path_uses_basename() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1.txt");
        fs::write(&path, b"one").unwrap();

        let content = UploadContent::from_path(&path).unwrap();
        assert_eq!(content.original_filename(), "1.txt");
        assert_eq!(content.data(), b"one");
        assert_eq!(content.len(), 3);
    }

    #[test]
    fn test_from_path_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = UploadContent::from_path(temp.path().join("absent.txt"));
        assert!(matches!(result, Err(UploadError::ObjectNotFound(_))));
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            UploadContent::from_bytes("  ", b"x".to_vec()),
            Err(UploadError::InvalidFilename(_))
        ));
    }
}
