//! # Cache Slot
//!
//! Processed content waiting to be stored. Process-local and held in memory,
//! so caching never touches the storage backend.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Content that passed processing but is not yet durable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub cache_id: String,
    /// Name as uploaded
    pub original_filename: String,
    /// Sanitized name after processing
    pub filename: String,
    pub data: Vec<u8>,
    /// SHA-256 of `data`, lowercase hex
    pub checksum: String,
    pub cached_at: DateTime<Utc>,
}

impl CachedFile {
    pub(crate) fn new(original_filename: String, filename: String, data: Vec<u8>) -> Self {
        let cached_at = Utc::now();
        Self {
            cache_id: new_cache_id(cached_at),
            original_filename,
            filename,
            checksum: calculate_checksum(&data),
            data,
            cached_at,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// `YYYYMMDD-HHMMSS-<uuid>`: sortable by time and unique
fn new_cache_id(at: DateTime<Utc>) -> String {
    format!("{}-{}", at.format("%Y%m%d-%H%M%S"), Uuid::new_v4().simple())
}

/// Calculate checksum for data
pub fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        let checksum = calculate_checksum(b"test");
        assert_eq!(checksum.len(), 64);
        assert_eq!(
            checksum,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_cache_ids_are_unique() {
        let a = CachedFile::new("a.txt".into(), "a.txt".into(), b"x".to_vec());
        let b = CachedFile::new("a.txt".into(), "a.txt".into(), b"x".to_vec());
        assert_ne!(a.cache_id, b.cache_id);
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.size(), 1);
    }
}
