//! Attachment subsystem for aeroattach
//!
//! Mounts uploaders onto document fields. A mounted field mediates between
//! uploaded content and the identifier persisted on the document:
//!
//! - `set` processes content into the cache; a failure changes nothing
//! - save stores new content, writes the identifier, then deletes what it replaced
//! - a failed document write deletes the new content and restores the old
//! - destroying the document deletes its content
//!
//! Mounts are `DocumentHook`s registered explicitly on the model's collection.

mod collection;
mod errors;
mod field;
mod model;
mod mount;

pub use collection::{AttachmentCollection, CollectionItem};
pub use errors::{AttachmentError, AttachmentResult};
pub use field::{AttachmentField, FieldState, Staged};
pub use model::{Changeset, Model};
pub use mount::{Mount, MountKind, MountOptions};

use crate::uploader::{Identifier, StoredFile};

/// The attachment slot a document holds for one mounted field
#[derive(Debug, Clone)]
pub enum Attachment {
    Single(AttachmentField),
    Multiple(AttachmentCollection),
}

impl Attachment {
    /// Kind name used in errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            Attachment::Single(_) => "a single file",
            Attachment::Multiple(_) => "a collection",
        }
    }

    pub fn as_single(&self) -> Option<&AttachmentField> {
        match self {
            Attachment::Single(field) => Some(field),
            Attachment::Multiple(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&AttachmentCollection> {
        match self {
            Attachment::Multiple(files) => Some(files),
            Attachment::Single(_) => None,
        }
    }

    pub fn state(&self) -> FieldState {
        match self {
            Attachment::Single(field) => field.state(),
            Attachment::Multiple(files) => files.state(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            Attachment::Single(field) => field.is_dirty(),
            Attachment::Multiple(files) => files.is_dirty(),
        }
    }

    /// Stored files, in order
    pub fn files(&self) -> Vec<&StoredFile> {
        match self {
            Attachment::Single(field) => field.file().into_iter().collect(),
            Attachment::Multiple(files) => files.files().iter().collect(),
        }
    }

    pub fn identifiers(&self) -> Vec<&Identifier> {
        self.files().into_iter().map(StoredFile::identifier).collect()
    }

    /// Drop all content on the next save
    pub fn remove(&mut self) {
        match self {
            Attachment::Single(field) => field.remove(),
            Attachment::Multiple(files) => files.remove(),
        }
    }
}
