//! Document Store subsystem for aeroattach
//!
//! Persists documents as attribute maps, tracks their changes, and runs
//! registered lifecycle hooks around save and destroy.
//!
//! # Design Principles
//!
//! - Hooks are registered explicitly and run in registration order
//! - Validation errors block a save before any hook side effect
//! - A failed write rolls back every hook that already ran
//! - Unchanged documents are never rewritten

mod collection;
mod errors;
mod hooks;
mod record;
mod store;

pub use collection::Collection;
pub use errors::{DocumentError, DocumentErrorCode, DocumentResult};
pub use hooks::{DocumentHook, HookRegistry};
pub use record::{Attributes, Changes, Document, FieldErrors, RawDocument};
pub use store::{validate_collection_name, DocumentStore, InMemoryDocumentStore, JsonFileDocumentStore};
