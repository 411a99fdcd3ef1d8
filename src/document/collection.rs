//! Collections: document CRUD with lifecycle hooks

use std::sync::Arc;

use uuid::Uuid;

use super::errors::{DocumentError, DocumentResult};
use super::hooks::{DocumentHook, HookRegistry};
use super::record::{Attributes, Document, FieldErrors, RawDocument};
use super::store::{validate_collection_name, DocumentStore};
use crate::observability::{log_event_with_fields, Event};

/// A named set of documents in a store, plus the hooks that run on them
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    store: Arc<dyn DocumentStore>,
    hooks: HookRegistry,
}

impl Collection {
    pub fn new(name: impl Into<String>, store: Arc<dyn DocumentStore>) -> DocumentResult<Self> {
        let name = name.into();
        validate_collection_name(&name)?;
        Ok(Self {
            name,
            store,
            hooks: HookRegistry::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Register a lifecycle hook; hooks run in registration order
    pub fn register(&mut self, hook: Arc<dyn DocumentHook>) {
        self.hooks.register(hook);
    }

    fn initialize(&self, mut doc: Document) -> DocumentResult<Document> {
        for hook in self.hooks.iter() {
            hook.after_initialize(&mut doc)?;
        }
        Ok(doc)
    }

    /// A new, unsaved document
    pub fn build(&self) -> DocumentResult<Document> {
        self.initialize(Document::new(self.name.clone()))
    }

    fn load(&self, raw: RawDocument) -> DocumentResult<Document> {
        self.initialize(Document::from_raw(self.name.clone(), raw))
    }

    /// Errors recorded on the document plus those the hooks report
    pub fn validate(&self, doc: &Document) -> FieldErrors {
        let mut errors = doc.errors().clone();
        for hook in self.hooks.iter() {
            hook.validate(doc, &mut errors);
        }
        errors
    }

    pub fn is_valid(&self, doc: &Document) -> bool {
        self.validate(doc).is_empty()
    }

    /// Validate, run `before_save` hooks, write, then run `after_save` hooks.
    ///
    /// An unchanged, already persisted document is not rewritten, but its
    /// hooks still run.
    pub fn save(&self, doc: &mut Document) -> DocumentResult<()> {
        if doc.is_destroyed() {
            return Err(DocumentError::not_found(&self.name, doc.id()));
        }

        let errors = self.validate(doc);
        if !errors.is_empty() {
            log_event_with_fields(
                Event::DocumentInvalid,
                &[
                    ("collection", self.name.as_str()),
                    ("errors", errors.to_string().as_str()),
                    ("id", doc.id().to_string().as_str()),
                ],
            );
            return Err(DocumentError::validation_failed(errors));
        }

        let mut ran: Vec<&Arc<dyn DocumentHook>> = Vec::new();
        for hook in self.hooks.iter() {
            if let Err(e) = hook.before_save(doc) {
                for done in ran.iter().rev() {
                    done.abort_save(doc);
                }
                return Err(e);
            }
            ran.push(hook);
        }

        let is_new = doc.is_new_record();
        if is_new || doc.has_changes() {
            let previous = doc.to_raw();
            doc.touch();
            let written = if is_new {
                self.store.insert(&self.name, &doc.to_raw())
            } else {
                self.store.replace(&self.name, &doc.to_raw())
            };
            if let Err(e) = written {
                for done in ran.iter().rev() {
                    done.abort_save(doc);
                }
                doc.restore_timestamps(&previous);
                return Err(e);
            }
        }

        doc.mark_persisted();
        for hook in self.hooks.iter() {
            hook.after_save(doc);
        }

        log_event_with_fields(
            Event::DocumentSaved,
            &[
                ("collection", self.name.as_str()),
                ("id", doc.id().to_string().as_str()),
                ("new", if is_new { "true" } else { "false" }),
            ],
        );
        Ok(())
    }

    /// Run `before_destroy` hooks, then delete the document.
    ///
    /// If any hook fails the document is left in place. Attributes the hooks
    /// that already ran have cleared are written, so the stored document no
    /// longer refers to what they deleted; other unsaved changes stay pending.
    pub fn destroy(&self, doc: &mut Document) -> DocumentResult<()> {
        if doc.is_destroyed() {
            return Ok(());
        }

        let before = doc.attributes().clone();
        for hook in self.hooks.iter() {
            if let Err(e) = hook.before_destroy(doc) {
                let written = self.write_cleared_fields(doc, &before);
                log_event_with_fields(
                    Event::DocumentDestroyAborted,
                    &[
                        ("cleared", written.join(",").as_str()),
                        ("collection", self.name.as_str()),
                        ("error", e.to_string().as_str()),
                        ("hook", hook.name()),
                        ("id", doc.id().to_string().as_str()),
                    ],
                );
                return Err(e);
            }
        }

        if !doc.is_new_record() {
            self.store.delete(&self.name, &doc.id())?;
        }
        doc.mark_destroyed();

        log_event_with_fields(
            Event::DocumentDestroyed,
            &[
                ("collection", self.name.as_str()),
                ("id", doc.id().to_string().as_str()),
            ],
        );
        Ok(())
    }

    /// Persist only the attributes changed since `before`. Returns the fields
    /// written; empty if there were none or the write failed.
    fn write_cleared_fields(&self, doc: &mut Document, before: &Attributes) -> Vec<String> {
        let fields = doc.changed_since(before);
        if fields.is_empty() || doc.is_new_record() {
            return Vec::new();
        }

        let previous = doc.to_raw();
        doc.touch();
        match self.store.replace(&self.name, &doc.persisted_with(&fields)) {
            Ok(()) => {
                doc.mark_fields_persisted(&fields);
                fields
            }
            Err(_) => {
                doc.restore_timestamps(&previous);
                Vec::new()
            }
        }
    }

    /// Load a document by id
    pub fn find(&self, id: &Uuid) -> DocumentResult<Document> {
        let raw = self
            .store
            .get(&self.name, id)?
            .ok_or_else(|| DocumentError::not_found(&self.name, id))?;
        self.load(raw)
    }

    /// Oldest document, loaded
    pub fn first(&self) -> DocumentResult<Option<Document>> {
        self.store
            .first(&self.name)?
            .map(|raw| self.load(raw))
            .transpose()
    }

    /// Every document, loaded, in insertion order
    pub fn all(&self) -> DocumentResult<Vec<Document>> {
        self.store
            .all(&self.name)?
            .into_iter()
            .map(|raw| self.load(raw))
            .collect()
    }

    /// Oldest document exactly as persisted, without running hooks
    pub fn raw_first(&self) -> DocumentResult<Option<RawDocument>> {
        self.store.first(&self.name)
    }

    /// A document exactly as persisted, without running hooks
    pub fn raw_find(&self, id: &Uuid) -> DocumentResult<Option<RawDocument>> {
        self.store.get(&self.name, id)
    }

    pub fn count(&self) -> DocumentResult<usize> {
        self.store.count(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::store::InMemoryDocumentStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records every hook call
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_before_save: AtomicBool,
        fail_before_destroy: AtomicBool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl DocumentHook for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn after_initialize(&self, _doc: &mut Document) -> DocumentResult<()> {
            self.record("after_initialize");
            Ok(())
        }

        fn before_save(&self, _doc: &mut Document) -> DocumentResult<()> {
            self.record("before_save");
            if self.fail_before_save.load(Ordering::SeqCst) {
                return Err(DocumentError::internal("refused"));
            }
            Ok(())
        }

        fn abort_save(&self, _doc: &mut Document) {
            self.record("abort_save");
        }

        fn after_save(&self, _doc: &mut Document) {
            self.record("after_save");
        }

        fn before_destroy(&self, _doc: &mut Document) -> DocumentResult<()> {
            self.record("before_destroy");
            if self.fail_before_destroy.load(Ordering::SeqCst) {
                return Err(DocumentError::internal("refused"));
            }
            Ok(())
        }
    }

    /// Clears an attribute on destroy, as an attachment does once its content is gone
    struct ClearOnDestroy(&'static str);

    impl DocumentHook for ClearOnDestroy {
        fn name(&self) -> &str {
            "clear_on_destroy"
        }

        fn before_destroy(&self, doc: &mut Document) -> DocumentResult<()> {
            doc.set(self.0, serde_json::Value::Null);
            Ok(())
        }
    }

    /// Requires a title
    struct RequireTitle;

    impl DocumentHook for RequireTitle {
        fn name(&self) -> &str {
            "require_title"
        }

        fn validate(&self, doc: &Document, errors: &mut FieldErrors) {
            if doc.get("title").is_none() {
                errors.add("title", "can't be blank");
            }
        }
    }

    /// Store whose writes can be switched off
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: InMemoryDocumentStore,
        fail: AtomicBool,
    }

    impl DocumentStore for FlakyStore {
        fn insert(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DocumentError::internal("store offline"));
            }
            self.inner.insert(collection, doc)
        }

        fn replace(&self, collection: &str, doc: &RawDocument) -> DocumentResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DocumentError::internal("store offline"));
            }
            self.inner.replace(collection, doc)
        }

        fn delete(&self, collection: &str, id: &Uuid) -> DocumentResult<()> {
            self.inner.delete(collection, id)
        }

        fn get(&self, collection: &str, id: &Uuid) -> DocumentResult<Option<RawDocument>> {
            self.inner.get(collection, id)
        }

        fn all(&self, collection: &str) -> DocumentResult<Vec<RawDocument>> {
            self.inner.all(collection)
        }
    }

    fn collection_with(recorder: &Arc<Recorder>) -> Collection {
        let mut collection =
            Collection::new("models", Arc::new(InMemoryDocumentStore::new())).unwrap();
        collection.register(recorder.clone());
        collection
    }

    #[test]
    fn test_invalid_collection_name() {
        let result = Collection::new("bad name", Arc::new(InMemoryDocumentStore::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_save_runs_hooks_in_order_and_persists() {
        let recorder = Arc::new(Recorder::default());
        let collection = collection_with(&recorder);

        let mut doc = collection.build().unwrap();
        doc.set("title", json!("hello"));
        collection.save(&mut doc).unwrap();

        assert!(doc.is_persisted());
        assert!(!doc.has_changes());
        assert_eq!(
            recorder.calls(),
            vec!["after_initialize", "before_save", "after_save"]
        );

        let raw = collection.raw_first().unwrap().unwrap();
        assert_eq!(raw.get("title"), Some(&json!("hello")));
    }

    #[test]
    fn test_loaded_document_has_no_changes() {
        let recorder = Arc::new(Recorder::default());
        let collection = collection_with(&recorder);

        let mut doc = collection.build().unwrap();
        doc.set("title", json!("hello"));
        collection.save(&mut doc).unwrap();

        let loaded = collection.find(&doc.id()).unwrap();
        assert!(loaded.changes().is_empty());
        assert_eq!(loaded.get("title"), Some(&json!("hello")));
        assert_eq!(collection.first().unwrap().unwrap().id(), doc.id());
        assert_eq!(collection.all().unwrap().len(), 1);
    }

    #[test]
    fn test_validation_blocks_save() {
        let mut collection =
            Collection::new("models", Arc::new(InMemoryDocumentStore::new())).unwrap();
        collection.register(Arc::new(RequireTitle));

        let mut doc = collection.build().unwrap();
        assert!(!collection.is_valid(&doc));

        let err = collection.save(&mut doc).unwrap_err();
        assert_eq!(
            err.field_errors().unwrap().get("title"),
            ["can't be blank".to_string()]
        );
        assert!(doc.is_new_record());
        assert_eq!(collection.count().unwrap(), 0);
    }

    #[test]
    fn test_recorded_errors_block_save() {
        let collection =
            Collection::new("models", Arc::new(InMemoryDocumentStore::new())).unwrap();
        let mut doc = collection.build().unwrap();
        doc.errors_mut().add("file", "Oops");

        let err = collection.save(&mut doc).unwrap_err();
        assert_eq!(err.field_errors().unwrap().get("file"), ["Oops".to_string()]);
    }

    #[test]
    fn test_failed_before_save_aborts_earlier_hooks() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        second.fail_before_save.store(true, Ordering::SeqCst);

        let mut collection =
            Collection::new("models", Arc::new(InMemoryDocumentStore::new())).unwrap();
        collection.register(first.clone());
        collection.register(second.clone());

        let mut doc = collection.build().unwrap();
        assert!(collection.save(&mut doc).is_err());

        assert_eq!(
            first.calls(),
            vec!["after_initialize", "before_save", "abort_save"]
        );
        assert_eq!(second.calls(), vec!["after_initialize", "before_save"]);
        assert_eq!(collection.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_write_aborts_hooks() {
        let store = Arc::new(FlakyStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let recorder = Arc::new(Recorder::default());

        let mut collection = Collection::new("models", store.clone()).unwrap();
        collection.register(recorder.clone());

        let mut doc = collection.build().unwrap();
        assert!(collection.save(&mut doc).is_err());
        assert!(doc.is_new_record());
        assert_eq!(
            recorder.calls(),
            vec!["after_initialize", "before_save", "abort_save"]
        );
    }

    #[test]
    fn test_unchanged_save_skips_write_but_runs_hooks() {
        let store = Arc::new(FlakyStore::default());
        let recorder = Arc::new(Recorder::default());
        let mut collection = Collection::new("models", store.clone()).unwrap();
        collection.register(recorder.clone());

        let mut doc = collection.build().unwrap();
        collection.save(&mut doc).unwrap();
        let updated_at = doc.updated_at();

        // A write would fail now; an unchanged save must not attempt one
        store.fail.store(true, Ordering::SeqCst);
        collection.save(&mut doc).unwrap();
        assert_eq!(doc.updated_at(), updated_at);
        assert_eq!(
            recorder.calls().iter().filter(|c| *c == "after_save").count(),
            2
        );
    }

    #[test]
    fn test_destroy_removes_document() {
        let recorder = Arc::new(Recorder::default());
        let collection = collection_with(&recorder);

        let mut doc = collection.build().unwrap();
        collection.save(&mut doc).unwrap();
        collection.destroy(&mut doc).unwrap();

        assert!(doc.is_destroyed());
        assert!(collection.find(&doc.id()).unwrap_err().is_not_found());
        assert!(recorder.calls().contains(&"before_destroy".to_string()));

        // Destroyed documents cannot be saved again
        assert!(collection.save(&mut doc).is_err());
    }

    #[test]
    fn test_failed_destroy_writes_fields_cleared_by_earlier_hooks() {
        let recorder = Arc::new(Recorder::default());
        let mut collection =
            Collection::new("models", Arc::new(InMemoryDocumentStore::new())).unwrap();
        collection.register(Arc::new(ClearOnDestroy("file")));
        collection.register(recorder.clone());

        let mut doc = collection.build().unwrap();
        doc.set("file", json!("a.txt"));
        doc.set("title", json!("saved"));
        collection.save(&mut doc).unwrap();

        doc.set("title", json!("unsaved"));
        recorder.fail_before_destroy.store(true, Ordering::SeqCst);
        assert!(collection.destroy(&mut doc).is_err());

        let raw = collection.raw_find(&doc.id()).unwrap().unwrap();
        assert_eq!(raw.get("file"), None);
        assert_eq!(raw.get("title"), Some(&json!("saved")));
        assert_eq!(doc.changes().keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_failed_before_destroy_keeps_document() {
        let recorder = Arc::new(Recorder::default());
        let collection = collection_with(&recorder);

        let mut doc = collection.build().unwrap();
        collection.save(&mut doc).unwrap();

        recorder.fail_before_destroy.store(true, Ordering::SeqCst);
        assert!(collection.destroy(&mut doc).is_err());
        assert!(!doc.is_destroyed());
        assert!(collection.find(&doc.id()).is_ok());
    }
}
