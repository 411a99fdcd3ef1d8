//! Document persistence backends
//!
//! A `DocumentStore` keeps raw documents per collection in insertion order.
//! `InMemoryDocumentStore` is used by tests and embedders that persist
//! elsewhere; `JsonFileDocumentStore` keeps one JSON file per collection.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use uuid::Uuid;

use super::errors::{DocumentError, DocumentResult};
use super::record::RawDocument;

/// Trait for document persistence
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Insert a new document; `AlreadyExists` if the id is taken
    fn insert(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()>;

    /// Replace an existing document; `NotFound` if absent
    fn replace(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()>;

    /// Delete a document; `NotFound` if absent
    fn delete(&self, collection: &str, id: &Uuid) -> DocumentResult<()>;

    fn get(&self, collection: &str, id: &Uuid) -> DocumentResult<Option<RawDocument>>;

    /// All documents in insertion order
    fn all(&self, collection: &str) -> DocumentResult<Vec<RawDocument>>;

    /// Oldest document
    fn first(&self, collection: &str) -> DocumentResult<Option<RawDocument>> {
        Ok(self.all(collection)?.into_iter().next())
    }

    fn count(&self, collection: &str) -> DocumentResult<usize> {
        Ok(self.all(collection)?.len())
    }
}

/// Collection names become file names, so they are restricted
pub fn validate_collection_name(name: &str) -> DocumentResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DocumentError::invalid_collection(name))
    }
}

fn insert_into(docs: &mut Vec<RawDocument>, collection: &str, doc: &RawDocument) -> DocumentResult<()> {
    if docs.iter().any(|d| d.id == doc.id) {
        return Err(DocumentError::already_exists(collection, doc.id));
    }
    docs.push(doc.clone());
    Ok(())
}

fn replace_in(docs: &mut [RawDocument], collection: &str, doc: &RawDocument) -> DocumentResult<()> {
    let slot = docs
        .iter_mut()
        .find(|d| d.id == doc.id)
        .ok_or_else(|| DocumentError::not_found(collection, doc.id))?;
    *slot = doc.clone();
    Ok(())
}

fn delete_from(docs: &mut Vec<RawDocument>, collection: &str, id: &Uuid) -> DocumentResult<()> {
    let index = docs
        .iter()
        .position(|d| d.id == *id)
        .ok_or_else(|| DocumentError::not_found(collection, id))?;
    docs.remove(index);
    Ok(())
}

/// In-memory document store
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<RawDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| DocumentError::internal("Lock poisoned"))?;
        insert_into(
            collections.entry(collection.to_string()).or_default(),
            collection,
            doc,
        )
    }

    fn replace(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| DocumentError::internal("Lock poisoned"))?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| DocumentError::not_found(collection, doc.id))?;
        replace_in(docs, collection, doc)
    }

    fn delete(&self, collection: &str, id: &Uuid) -> DocumentResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| DocumentError::internal("Lock poisoned"))?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| DocumentError::not_found(collection, id))?;
        delete_from(docs, collection, id)
    }

    fn get(&self, collection: &str, id: &Uuid) -> DocumentResult<Option<RawDocument>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| DocumentError::internal("Lock poisoned"))?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == *id).cloned()))
    }

    fn all(&self, collection: &str) -> DocumentResult<Vec<RawDocument>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| DocumentError::internal("Lock poisoned"))?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

/// One JSON array file per collection under a directory.
///
/// Every mutation rewrites the collection file through a temp file and a
/// rename, so a crash never leaves a half-written collection behind.
#[derive(Debug)]
pub struct JsonFileDocumentStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileDocumentStore {
    pub fn open(dir: impl Into<PathBuf>) -> DocumentResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            DocumentError::io_error(format!("Failed to create {}", dir.display()), e)
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> DocumentResult<PathBuf> {
        validate_collection_name(collection)?;
        Ok(self.dir.join(format!("{}.json", collection)))
    }

    fn load(&self, collection: &str) -> DocumentResult<Vec<RawDocument>> {
        let path = self.collection_path(collection)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DocumentError::io_error(
                    format!("Failed to read {}", path.display()),
                    e,
                ))
            }
        };
        serde_json::from_str(&content).map_err(|e| {
            DocumentError::corruption(format!("Invalid collection file {}: {}", path.display(), e))
        })
    }

    fn save(&self, collection: &str, docs: &[RawDocument]) -> DocumentResult<()> {
        let path = self.collection_path(collection)?;
        let content = serde_json::to_string_pretty(docs)
            .map_err(|e| DocumentError::corruption(format!("Failed to encode documents: {}", e)))?;

        let tmp_path = self.dir.join(format!(".{}-{}.tmp", collection, Uuid::new_v4()));
        fs::write(&tmp_path, content).map_err(|e| {
            DocumentError::io_error(format!("Failed to write {}", tmp_path.display()), e)
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DocumentError::io_error(format!("Failed to replace {}", path.display()), e)
        })
    }

    fn modify<F>(&self, collection: &str, f: F) -> DocumentResult<()>
    where
        F: FnOnce(&mut Vec<RawDocument>) -> DocumentResult<()>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DocumentError::internal("Lock poisoned"))?;
        let mut docs = self.load(collection)?;
        f(&mut docs)?;
        self.save(collection, &docs)
    }
}

impl DocumentStore for JsonFileDocumentStore {
    fn insert(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()> {
        self.modify(collection, |docs| insert_into(docs, collection, doc))
    }

    fn replace(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()> {
        self.modify(collection, |docs| replace_in(docs, collection, doc))
    }

    fn delete(&self, collection: &str, id: &Uuid) -> DocumentResult<()> {
        self.modify(collection, |docs| delete_from(docs, collection, id))
    }

    fn get(&self, collection: &str, id: &Uuid) -> DocumentResult<Option<RawDocument>> {
        Ok(self.load(collection)?.into_iter().find(|d| d.id == *id))
    }

    fn all(&self, collection: &str) -> DocumentResult<Vec<RawDocument>> {
        self.load(collection)
    }
}
