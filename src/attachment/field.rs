//! Single-file attachment field
//!
//! ```text
//! EMPTY --set--> CACHED --save--> PERSISTED --set--> CACHED --save--> PERSISTED (new identifier)
//!                                     |
//!                                     +--remove--save--> EMPTY
//! ```
//!
//! A failed `set` leaves the field in the state it was in. Saving is split
//! in two so the owning document can be written in between:
//! `stage` makes new content durable, `commit` deletes what it replaced,
//! `abort` undoes `stage` when the document write fails.

use std::path::PathBuf;

use crate::observability::{log_event_with_fields, Event};
use crate::uploader::{
    CachedFile, Identifier, PendingFile, StoreScope, StoredFile, UploadContent, UploadResult,
    Uploader,
};

/// Lifecycle state of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// No content
    Empty,
    /// Content assigned, not yet saved
    Cached,
    /// Content durably stored
    Persisted,
}

/// What a save has to write into the document attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged<T> {
    /// Nothing to write; the attribute stays as it is
    Unchanged,
    /// New attribute value
    Write(T),
}

#[derive(Debug, Clone)]
enum PendingSave {
    /// New content under a new identifier; the superseded file goes on commit
    Replace { superseded: Option<StoredFile> },
    /// New content waiting beside the stored file it replaces
    InPlace(PendingFile),
    /// Content dropped
    Remove { superseded: Option<StoredFile> },
}

/// One mounted file on one document
#[derive(Debug, Clone)]
pub struct AttachmentField {
    field: String,
    stored: Option<StoredFile>,
    cached: Option<CachedFile>,
    remove_requested: bool,
    pending: Option<PendingSave>,
}

impl AttachmentField {
    /// An empty field
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            stored: None,
            cached: None,
            remove_requested: false,
            pending: None,
        }
    }

    /// A field holding already stored content
    pub fn with_stored(field: impl Into<String>, stored: Option<StoredFile>) -> Self {
        Self {
            stored,
            ..Self::new(field)
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn state(&self) -> FieldState {
        if self.cached.is_some() {
            FieldState::Cached
        } else if self.stored.is_some() {
            FieldState::Persisted
        } else {
            FieldState::Empty
        }
    }

    /// Has changes the next save will apply
    pub fn is_dirty(&self) -> bool {
        self.cached.is_some() || (self.remove_requested && self.stored.is_some())
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.remove_requested
    }

    /// Durably stored content
    pub fn file(&self) -> Option<&StoredFile> {
        self.stored.as_ref()
    }

    /// Content waiting for the next save
    pub fn cached(&self) -> Option<&CachedFile> {
        self.cached.as_ref()
    }

    /// Identifier of the stored content
    pub fn identifier(&self) -> Option<&Identifier> {
        self.stored.as_ref().map(StoredFile::identifier)
    }

    /// Filesystem path of the stored content
    pub fn path(&self) -> Option<PathBuf> {
        self.stored.as_ref().map(StoredFile::path)
    }

    /// Name of the current content, cached or stored
    pub fn filename(&self) -> Option<&str> {
        match (&self.cached, &self.stored) {
            (Some(cached), _) => Some(cached.filename.as_str()),
            (None, Some(stored)) => Some(stored.filename()),
            (None, None) => None,
        }
    }

    /// Bytes of the current content, cached or stored
    pub fn read(&self) -> UploadResult<Option<Vec<u8>>> {
        match (&self.cached, &self.stored) {
            (Some(cached), _) => Ok(Some(cached.data.clone())),
            (None, Some(stored)) => stored.read().map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Process content and hold it for the next save.
    ///
    /// On failure nothing changes.
    pub fn set(&mut self, uploader: &Uploader, content: UploadContent) -> UploadResult<()> {
        let cached = uploader.cache(content)?;
        self.cached = Some(cached);
        self.remove_requested = false;
        Ok(())
    }

    /// Drop the content on the next save
    pub fn remove(&mut self) {
        self.cached = None;
        self.remove_requested = true;
    }

    /// Point the field at existing stored content without reprocessing it
    pub fn retrieve_from_store(
        &mut self,
        uploader: &Uploader,
        scope: &StoreScope,
        identifier: &Identifier,
    ) -> UploadResult<&StoredFile> {
        let file = uploader.retrieve(scope, identifier)?;
        self.cached = None;
        self.remove_requested = false;
        Ok(self.stored.insert(file))
    }

    /// Make pending content durable. Returns the attribute value to persist.
    ///
    /// Content that keeps the current identifier is written beside the stored
    /// file, which stays intact until `commit`.
    pub fn stage(
        &mut self,
        uploader: &Uploader,
        scope: &StoreScope,
    ) -> UploadResult<Staged<Option<Identifier>>> {
        if let Some(cached) = &self.cached {
            let identifier = uploader.identifier_for(cached)?;
            if self.identifier() == Some(&identifier) {
                let pending = uploader.store_pending(scope, cached)?;
                self.pending = Some(PendingSave::InPlace(pending));
            } else {
                let new_file = uploader.store(scope, cached)?;
                let superseded = self.stored.replace(new_file);
                self.pending = Some(PendingSave::Replace { superseded });
            }
            return Ok(Staged::Write(Some(identifier)));
        }

        if self.remove_requested {
            let superseded = self.stored.take();
            self.pending = Some(PendingSave::Remove { superseded });
            return Ok(Staged::Write(None));
        }

        Ok(Staged::Unchanged)
    }

    /// The document is written: replace or delete superseded content.
    ///
    /// Failures are logged and otherwise ignored; the save already
    /// succeeded.
    pub fn commit(&mut self, uploader: &Uploader, scope: &StoreScope) {
        self.cached = None;
        self.remove_requested = false;

        match self.pending.take() {
            Some(PendingSave::InPlace(pending)) => {
                promote_logged(uploader, scope, &self.field, &pending);
            }
            Some(PendingSave::Replace { superseded: Some(old) })
            | Some(PendingSave::Remove { superseded: Some(old) }) => {
                remove_logged(uploader, scope, &self.field, old.identifier());
            }
            _ => {}
        }
    }

    /// The document write failed: undo `stage`. Returns true if anything was undone.
    pub fn abort(&mut self, uploader: &Uploader, scope: &StoreScope) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        match pending {
            PendingSave::Replace { superseded } => {
                if let Some(new_file) = std::mem::replace(&mut self.stored, superseded) {
                    log_event_with_fields(
                        Event::FileStageAborted,
                        &[
                            ("field", self.field.as_str()),
                            ("identifier", new_file.filename()),
                        ],
                    );
                    remove_logged(uploader, scope, &self.field, new_file.identifier());
                }
            }
            PendingSave::InPlace(pending) => {
                log_event_with_fields(
                    Event::FileStageAborted,
                    &[
                        ("field", self.field.as_str()),
                        ("identifier", pending.identifier().as_str()),
                    ],
                );
                discard_logged(uploader, &self.field, &pending);
            }
            PendingSave::Remove { superseded } => self.stored = superseded,
        }
        true
    }

    /// Delete stored content for good; the owning document is being destroyed
    pub fn destroy(&mut self, uploader: &Uploader, scope: &StoreScope) -> UploadResult<()> {
        if let Some(stored) = &self.stored {
            uploader.remove(scope, stored.identifier())?;
        }
        self.stored = None;
        self.cached = None;
        self.remove_requested = false;
        self.pending = None;
        Ok(())
    }
}

/// Delete stored content, logging instead of failing
pub(crate) fn remove_logged(
    uploader: &Uploader,
    scope: &StoreScope,
    field: &str,
    identifier: &Identifier,
) {
    if let Err(e) = uploader.remove(scope, identifier) {
        log_event_with_fields(
            Event::FileRemoveFailed,
            &[
                ("error", e.to_string().as_str()),
                ("field", field),
                ("identifier", identifier.as_str()),
                ("scope", scope.to_string().as_str()),
            ],
        );
    }
}

/// Move pending content into place, logging instead of failing
pub(crate) fn promote_logged(
    uploader: &Uploader,
    scope: &StoreScope,
    field: &str,
    pending: &PendingFile,
) {
    if let Err(e) = uploader.promote(scope, pending) {
        log_event_with_fields(
            Event::FilePromoteFailed,
            &[
                ("error", e.to_string().as_str()),
                ("field", field),
                ("identifier", pending.identifier().as_str()),
                ("pending_key", pending.key()),
            ],
        );
    }
}

/// Drop pending content, logging instead of failing
pub(crate) fn discard_logged(uploader: &Uploader, field: &str, pending: &PendingFile) {
    if let Err(e) = uploader.discard(pending) {
        log_event_with_fields(
            Event::FileRemoveFailed,
            &[
                ("error", e.to_string().as_str()),
                ("field", field),
                ("identifier", pending.identifier().as_str()),
                ("pending_key", pending.key()),
            ],
        );
    }
}
