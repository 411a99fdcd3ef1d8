//! Lifecycle hooks
//!
//! Behavior that rides on document persistence (such as file attachments)
//! registers a `DocumentHook` on a collection. The collection invokes the
//! hooks explicitly, in registration order, at fixed points:
//!
//! ```text
//! build / load  -> after_initialize
//! save          -> validate -> before_save -> (write) -> after_save
//!                                          \-> abort_save (write failed)
//! destroy       -> before_destroy -> (delete)
//! ```

use std::sync::Arc;

use super::errors::DocumentResult;
use super::record::{Document, FieldErrors};

/// Extension point invoked by a collection during a document's lifecycle
pub trait DocumentHook: Send + Sync {
    /// Name used in errors and logs
    fn name(&self) -> &str;

    /// A document was built or loaded
    fn after_initialize(&self, _doc: &mut Document) -> DocumentResult<()> {
        Ok(())
    }

    /// Add validation errors; any error blocks the save
    fn validate(&self, _doc: &Document, _errors: &mut FieldErrors) {}

    /// Runs before the document is written. An error aborts the save.
    fn before_save(&self, _doc: &mut Document) -> DocumentResult<()> {
        Ok(())
    }

    /// The save was aborted after this hook's `before_save` succeeded
    fn abort_save(&self, _doc: &mut Document) {}

    /// Runs after the document is written. Cannot fail the save.
    fn after_save(&self, _doc: &mut Document) {}

    /// Runs before the document is deleted. An error aborts the destroy.
    fn before_destroy(&self, _doc: &mut Document) -> DocumentResult<()> {
        Ok(())
    }
}

/// Hooks in registration order
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn DocumentHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn DocumentHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn DocumentHook>> {
        self.hooks.iter()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.names())
            .finish()
    }
}
