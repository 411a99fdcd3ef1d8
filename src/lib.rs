//! aeroattach - file attachments for JSON documents
//!
//! Mount uploaders on document fields. Saving a document stores new content,
//! persists its identifier and deletes the content it replaced; destroying a
//! document deletes its content.
//!
//! ```ignore
//! use std::sync::Arc;
//! use aeroattach::attachment::{Changeset, Model, MountOptions};
//! use aeroattach::document::InMemoryDocumentStore;
//! use aeroattach::uploader::{LocalBackend, UploadContent};
//!
//! let mut posts = Model::new(
//!     "posts",
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(LocalBackend::new("./data".into())),
//! )?;
//! posts.mount_uploader("cover", MountOptions::new())?;
//! let post = posts.create(Changeset::new().attach("cover", UploadContent::from_path("cover.png")?))?;
//! ```

pub mod attachment;
pub mod cli;
pub mod config;
pub mod document;
pub mod observability;
pub mod uploader;
