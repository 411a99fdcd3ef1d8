//! # Uploader
//!
//! Caches, stores, retrieves and removes content for one mounted field.

use std::fmt;
use std::sync::Arc;

use super::backend::StorageBackend;
use super::cache::CachedFile;
use super::content::UploadContent;
use super::errors::{UploadError, UploadResult};
use super::file::{PendingFile, StoreScope, StoredFile};
use super::naming::{sanitize_filename, FilenameStrategy, Identifier};
use super::pipeline::{Pipeline, ProcessedFile};
use crate::observability::{log_event_with_fields, Event};

/// Default directory for stored content, relative to the backend root
pub const DEFAULT_STORE_DIR: &str = "uploads";

/// Upload processor bound to a backend, a naming strategy and a pipeline
#[derive(Clone)]
pub struct Uploader {
    backend: Arc<dyn StorageBackend>,
    store_dir: String,
    strategy: FilenameStrategy,
    pipeline: Pipeline,
}

impl Uploader {
    /// Create an uploader with the default store dir, digest naming and no processing
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            store_dir: DEFAULT_STORE_DIR.to_string(),
            strategy: FilenameStrategy::default(),
            pipeline: Pipeline::new(),
        }
    }

    pub fn with_store_dir(mut self, store_dir: impl Into<String>) -> Self {
        self.store_dir = store_dir.into().trim_matches('/').to_string();
        self
    }

    pub fn with_strategy(mut self, strategy: FilenameStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn store_dir(&self) -> &str {
        &self.store_dir
    }

    pub fn strategy(&self) -> &FilenameStrategy {
        &self.strategy
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline over a working copy and hold the result in the cache.
    ///
    /// Nothing is written to the backend, whether processing succeeds or not.
    pub fn cache(&self, content: UploadContent) -> UploadResult<CachedFile> {
        let (original_filename, data) = content.into_parts();
        let mut working = ProcessedFile {
            filename: sanitize_filename(&original_filename),
            data,
        };

        if let Err(e) = self.pipeline.run(&mut working) {
            log_event_with_fields(
                Event::ProcessingFailed,
                &[
                    ("filename", original_filename.as_str()),
                    ("error", e.to_string().as_str()),
                ],
            );
            return Err(e);
        }

        // A step may have renamed the file
        let filename = sanitize_filename(&working.filename);
        let cached = CachedFile::new(original_filename, filename, working.data);
        log_event_with_fields(
            Event::FileCached,
            &[
                ("cache_id", cached.cache_id.as_str()),
                ("filename", cached.filename.as_str()),
            ],
        );
        Ok(cached)
    }

    /// Identifier cached content would be stored under
    pub fn identifier_for(&self, cached: &CachedFile) -> UploadResult<Identifier> {
        self.strategy.identifier_for(&cached.filename, &cached.checksum)
    }

    fn key(&self, scope: &StoreScope, identifier: &Identifier) -> String {
        format!("{}/{}", scope.dir(&self.store_dir), identifier)
    }

    /// Write cached content durably and return its handle
    pub fn store(&self, scope: &StoreScope, cached: &CachedFile) -> UploadResult<StoredFile> {
        let identifier = self.identifier_for(cached)?;
        let key = self.key(scope, &identifier);
        self.backend.write(&key, &cached.data)?;

        log_event_with_fields(
            Event::FileStored,
            &[
                ("identifier", identifier.as_str()),
                ("scope", scope.to_string().as_str()),
                ("size", cached.size().to_string().as_str()),
            ],
        );
        Ok(StoredFile::new(identifier, key, Arc::clone(&self.backend)))
    }

    /// Write cached content beside its final key.
    ///
    /// Whatever is stored under the same identifier stays readable until
    /// `promote` moves the new content over it.
    pub fn store_pending(&self, scope: &StoreScope, cached: &CachedFile) -> UploadResult<PendingFile> {
        let identifier = self.identifier_for(cached)?;
        let key = format!(
            "{}/.pending/{}-{}",
            scope.dir(&self.store_dir),
            cached.cache_id,
            identifier
        );
        self.backend.write(&key, &cached.data)?;
        Ok(PendingFile::new(identifier, key))
    }

    /// Move pending content over the stored file of the same identifier
    pub fn promote(&self, scope: &StoreScope, pending: &PendingFile) -> UploadResult<StoredFile> {
        let key = self.key(scope, pending.identifier());
        self.backend.rename(pending.key(), &key)?;

        log_event_with_fields(
            Event::FileStored,
            &[
                ("identifier", pending.identifier().as_str()),
                ("scope", scope.to_string().as_str()),
            ],
        );
        Ok(StoredFile::new(
            pending.identifier().clone(),
            key,
            Arc::clone(&self.backend),
        ))
    }

    /// Drop pending content. Returns false if it was already gone.
    pub fn discard(&self, pending: &PendingFile) -> UploadResult<bool> {
        match self.backend.delete(pending.key()) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Handle for an identifier without checking that the content exists
    pub fn locate(&self, scope: &StoreScope, identifier: &Identifier) -> StoredFile {
        StoredFile::new(
            identifier.clone(),
            self.key(scope, identifier),
            Arc::clone(&self.backend),
        )
    }

    /// Handle for existing content; `ObjectNotFound` if nothing is stored there
    pub fn retrieve(&self, scope: &StoreScope, identifier: &Identifier) -> UploadResult<StoredFile> {
        let file = self.locate(scope, identifier);
        if !file.exists()? {
            return Err(UploadError::ObjectNotFound(identifier.to_string()));
        }
        Ok(file)
    }

    pub fn exists(&self, scope: &StoreScope, identifier: &Identifier) -> UploadResult<bool> {
        self.backend.exists(&self.key(scope, identifier))
    }

    /// Delete stored content. Returns false if it was already gone.
    pub fn remove(&self, scope: &StoreScope, identifier: &Identifier) -> UploadResult<bool> {
        match self.backend.delete(&self.key(scope, identifier)) {
            Ok(()) => {
                log_event_with_fields(
                    Event::FileRemoved,
                    &[
                        ("identifier", identifier.as_str()),
                        ("scope", scope.to_string().as_str()),
                    ],
                );
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Identifiers currently stored for a scope
    pub fn list(&self, scope: &StoreScope) -> UploadResult<Vec<Identifier>> {
        let dir = scope.dir(&self.store_dir);
        self.backend
            .list(&dir)?
            .into_iter()
            .filter_map(|key| key.rsplit('/').next().map(str::to_string))
            .map(Identifier::parse)
            .collect()
    }
}

impl fmt::Debug for Uploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uploader")
            .field("backend", &self.backend)
            .field("store_dir", &self.store_dir)
            .field("strategy", &self.strategy)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
