//! Mounting uploaders onto document fields
//!
//! A `Mount` is the `DocumentHook` that keeps one field's attachment in step
//! with its document:
//!
//! ```text
//! after_initialize  attribute -> attachment slot
//! before_save       store new content, attribute <- identifier(s)
//! abort_save        delete new content, attribute <- previous identifier(s)
//! after_save        delete superseded content (log and continue on failure)
//! before_destroy    delete all content
//! ```

use serde_json::Value;

use super::collection::AttachmentCollection;
use super::errors::AttachmentError;
use super::field::{AttachmentField, Staged};
use super::Attachment;
use crate::document::{Document, DocumentError, DocumentHook, DocumentResult};
use crate::uploader::{
    FilenameStrategy, Identifier, Pipeline, ProcessedFile, ProcessingError, ProcessingStep,
    StoreScope, UploadError, Uploader,
};

/// Single file or ordered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Single,
    Multiple,
}

/// How a field's uploader names and processes content
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    strategy: FilenameStrategy,
    pipeline: Pipeline,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store under a fixed name instead of persisting an identifier
    pub fn filename(mut self, name: &str) -> Self {
        self.strategy = FilenameStrategy::fixed(name);
        self
    }

    pub fn strategy(mut self, strategy: FilenameStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Append a processing step
    pub fn process(mut self, name: &str, step: impl ProcessingStep + 'static) -> Self {
        self.pipeline = self.pipeline.step(name, step);
        self
    }

    /// Append a processing step written as a closure
    pub fn process_fn<F>(mut self, name: &str, step: F) -> Self
    where
        F: Fn(&mut ProcessedFile) -> Result<(), ProcessingError> + Send + Sync + 'static,
    {
        self.pipeline = self.pipeline.step_fn(name, step);
        self
    }

    pub fn filename_strategy(&self) -> &FilenameStrategy {
        &self.strategy
    }

    pub(crate) fn into_parts(self) -> (FilenameStrategy, Pipeline) {
        (self.strategy, self.pipeline)
    }
}

/// One uploader mounted on one field of a collection
#[derive(Debug)]
pub struct Mount {
    field: String,
    collection: String,
    kind: MountKind,
    uploader: Uploader,
}

impl Mount {
    pub(crate) fn new(
        field: impl Into<String>,
        collection: impl Into<String>,
        kind: MountKind,
        uploader: Uploader,
    ) -> Self {
        Self {
            field: field.into(),
            collection: collection.into(),
            kind,
            uploader,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> MountKind {
        self.kind
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Storage scope of this field on a document
    pub fn scope(&self, doc: &Document) -> StoreScope {
        StoreScope::new(self.collection.as_str(), self.field.as_str(), doc.id())
    }

    fn is_fixed(&self) -> bool {
        self.uploader.strategy().is_fixed()
    }

    fn hook_error(&self, err: UploadError) -> DocumentError {
        DocumentError::hook_failed(&self.field, AttachmentError::Upload(err))
    }

    fn corrupt_attribute(&self, doc: &Document, detail: impl std::fmt::Display) -> DocumentError {
        DocumentError::corruption(format!(
            "Attribute '{}' of {}/{} is not a valid attachment: {}",
            self.field, self.collection, doc.id(), detail
        ))
    }

    fn parse_identifier(&self, doc: &Document, value: &Value) -> DocumentResult<Identifier> {
        let text = value
            .as_str()
            .ok_or_else(|| self.corrupt_attribute(doc, "expected a string"))?;
        Identifier::parse(text).map_err(|e| self.corrupt_attribute(doc, e))
    }

    fn load_single(&self, doc: &Document) -> DocumentResult<AttachmentField> {
        let scope = self.scope(doc);
        let stored = match self.uploader.strategy() {
            FilenameStrategy::Fixed(name) => {
                let identifier = Identifier::parse(name.as_str()).map_err(|e| self.hook_error(e))?;
                let file = self.uploader.locate(&scope, &identifier);
                file.exists()
                    .map_err(|e| self.hook_error(e))?
                    .then_some(file)
            }
            _ => match doc.get(&self.field) {
                None => None,
                Some(value) => {
                    let identifier = self.parse_identifier(doc, value)?;
                    Some(self.uploader.locate(&scope, &identifier))
                }
            },
        };
        Ok(AttachmentField::with_stored(self.field.as_str(), stored))
    }

    fn load_collection(&self, doc: &Document) -> DocumentResult<AttachmentCollection> {
        let scope = self.scope(doc);
        let stored = match doc.get(&self.field) {
            None => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| {
                    self.parse_identifier(doc, v)
                        .map(|id| self.uploader.locate(&scope, &id))
                })
                .collect::<DocumentResult<Vec<_>>>()?,
            Some(_) => return Err(self.corrupt_attribute(doc, "expected an array")),
        };
        Ok(AttachmentCollection::with_stored(self.field.as_str(), stored))
    }

    fn slot<'a>(&self, doc: &'a mut Document) -> DocumentResult<&'a mut Attachment> {
        doc.attachment_mut(&self.field).ok_or_else(|| {
            DocumentError::internal(format!("Attachment '{}' was never initialized", self.field))
        })
    }

    /// Write the attribute for the current stored state
    fn write_attribute(&self, doc: &mut Document) {
        if self.is_fixed() {
            return;
        }
        let value = match doc.attachment(&self.field) {
            Some(Attachment::Single(field)) => field
                .identifier()
                .map(|id| Value::String(id.to_string()))
                .unwrap_or(Value::Null),
            Some(Attachment::Multiple(files)) if !files.is_empty() => Value::Array(
                files
                    .identifiers()
                    .into_iter()
                    .map(|id| Value::String(id.to_string()))
                    .collect(),
            ),
            _ => Value::Null,
        };
        doc.set(self.field.as_str(), value);
    }
}

impl DocumentHook for Mount {
    fn name(&self) -> &str {
        &self.field
    }

    fn after_initialize(&self, doc: &mut Document) -> DocumentResult<()> {
        let attachment = match self.kind {
            MountKind::Single => Attachment::Single(self.load_single(doc)?),
            MountKind::Multiple => Attachment::Multiple(self.load_collection(doc)?),
        };
        doc.insert_attachment(self.field.as_str(), attachment);
        Ok(())
    }

    fn before_save(&self, doc: &mut Document) -> DocumentResult<()> {
        let scope = self.scope(doc);
        let changed = match self.slot(doc)? {
            Attachment::Single(field) => field
                .stage(&self.uploader, &scope)
                .map(|staged| staged != Staged::Unchanged),
            Attachment::Multiple(files) => files
                .stage(&self.uploader, &scope)
                .map(|staged| staged != Staged::Unchanged),
        }
        .map_err(|e| self.hook_error(e))?;

        if changed {
            self.write_attribute(doc);
        }
        Ok(())
    }

    fn abort_save(&self, doc: &mut Document) {
        let scope = self.scope(doc);
        let Ok(slot) = self.slot(doc) else {
            return;
        };
        let aborted = match slot {
            Attachment::Single(field) => field.abort(&self.uploader, &scope),
            Attachment::Multiple(files) => files.abort(&self.uploader, &scope),
        };
        if aborted {
            self.write_attribute(doc);
        }
    }

    fn after_save(&self, doc: &mut Document) {
        let scope = self.scope(doc);
        if let Ok(slot) = self.slot(doc) {
            match slot {
                Attachment::Single(field) => field.commit(&self.uploader, &scope),
                Attachment::Multiple(files) => files.commit(&self.uploader, &scope),
            }
        }
    }

    fn before_destroy(&self, doc: &mut Document) -> DocumentResult<()> {
        let scope = self.scope(doc);
        let result = match self.slot(doc)? {
            Attachment::Single(field) => field.destroy(&self.uploader, &scope),
            Attachment::Multiple(files) => files.destroy(&self.uploader, &scope),
        };
        // Reflect what is left, in case the destroy stops here
        self.write_attribute(doc);
        result.map_err(|e| self.hook_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::{MaxSize, MemoryBackend, UploadContent};
    use serde_json::json;
    use std::sync::Arc;

    fn make_mount(kind: MountKind, strategy: FilenameStrategy) -> (Arc<MemoryBackend>, Mount) {
        let backend = Arc::new(MemoryBackend::new());
        let uploader = Uploader::new(backend.clone()).with_strategy(strategy);
        (backend, Mount::new("file", "models", kind, uploader))
    }

    #[test]
    fn test_options_builder() {
        let options = MountOptions::new()
            .process("max_size", MaxSize(10))
            .process_fn("noop", |_| Ok(()));
        assert_eq!(options.filename_strategy(), &FilenameStrategy::Digest);
        let (_, pipeline) = options.into_parts();
        assert_eq!(pipeline.step_names(), vec!["max_size", "noop"]);

        let fixed = MountOptions::new().filename("stuff.txt");
        assert!(fixed.filename_strategy().is_fixed());
    }

    #[test]
    fn test_initialize_reads_attribute_without_backend_check() {
        let (backend, mount) = make_mount(MountKind::Single, FilenameStrategy::Digest);
        let mut doc = Document::new("models");
        doc.set("file", json!("abc-1.txt"));

        mount.after_initialize(&mut doc).unwrap();
        let field = doc.attachment("file").unwrap().as_single().unwrap();
        assert_eq!(field.identifier().unwrap().as_str(), "abc-1.txt");
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn test_initialize_rejects_malformed_attribute() {
        let (_, mount) = make_mount(MountKind::Single, FilenameStrategy::Digest);
        let mut doc = Document::new("models");
        doc.set("file", json!(42));
        assert!(mount.after_initialize(&mut doc).is_err());

        let (_, many) = make_mount(MountKind::Multiple, FilenameStrategy::Digest);
        let mut doc = Document::new("models");
        doc.set("file", json!("not-an-array.txt"));
        assert!(many.after_initialize(&mut doc).is_err());

        doc.set("file", json!(["../escape.txt"]));
        assert!(many.after_initialize(&mut doc).is_err());
    }

    #[test]
    fn test_save_hooks_write_attribute() {
        let (_, mount) = make_mount(MountKind::Single, FilenameStrategy::Original);
        let mut doc = Document::new("models");
        mount.after_initialize(&mut doc).unwrap();

        let content = UploadContent::from_bytes("1.txt", b"one".to_vec()).unwrap();
        if let Some(Attachment::Single(field)) = doc.attachment_mut("file") {
            field.set(mount.uploader(), content).unwrap();
        }
        mount.before_save(&mut doc).unwrap();
        assert_eq!(doc.get("file"), Some(&json!("1.txt")));

        mount.after_save(&mut doc);
        assert!(!doc.attachment("file").unwrap().is_dirty());
    }

    #[test]
    fn test_abort_restores_attribute() {
        let (_, mount) = make_mount(MountKind::Single, FilenameStrategy::Original);
        let mut doc = Document::new("models");
        mount.after_initialize(&mut doc).unwrap();

        let content = UploadContent::from_bytes("1.txt", b"one".to_vec()).unwrap();
        if let Some(Attachment::Single(field)) = doc.attachment_mut("file") {
            field.set(mount.uploader(), content).unwrap();
        }
        mount.before_save(&mut doc).unwrap();
        mount.abort_save(&mut doc);

        assert_eq!(doc.get("file"), None);
        let scope = mount.scope(&doc);
        let id = Identifier::parse("1.txt").unwrap();
        assert!(!mount.uploader().exists(&scope, &id).unwrap());
    }

    #[test]
    fn test_fixed_strategy_never_writes_attribute() {
        let (_, mount) = make_mount(MountKind::Single, FilenameStrategy::fixed("stuff.txt"));
        let mut doc = Document::new("models");
        mount.after_initialize(&mut doc).unwrap();

        let content = UploadContent::from_bytes("1.txt", b"one".to_vec()).unwrap();
        if let Some(Attachment::Single(field)) = doc.attachment_mut("file") {
            field.set(mount.uploader(), content).unwrap();
        }
        mount.before_save(&mut doc).unwrap();
        mount.after_save(&mut doc);
        assert_eq!(doc.get("file"), None);

        // A reload finds the content by its fixed name
        let mut reloaded = Document::from_raw("models", doc.to_raw());
        mount.after_initialize(&mut reloaded).unwrap();
        let field = reloaded.attachment("file").unwrap().as_single().unwrap();
        assert_eq!(field.filename(), Some("stuff.txt"));
        assert_eq!(field.read().unwrap().unwrap(), b"one");
    }
}
