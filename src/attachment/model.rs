//! Models: a collection with uploaders mounted on named fields

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::collection::CollectionItem;
use super::errors::{AttachmentError, AttachmentResult};
use super::mount::{Mount, MountKind, MountOptions};
use super::Attachment;
use crate::document::{
    validate_collection_name, Collection, Document, DocumentStore, RawDocument,
};
use crate::uploader::{StorageBackend, StoredFile, UploadContent, UploadError, Uploader, DEFAULT_STORE_DIR};

#[derive(Debug)]
enum Assignment {
    Single(UploadContent),
    Many(Vec<CollectionItem>),
    Remove,
}

/// Attribute values and uploads to apply to a document in one go
#[derive(Debug, Default)]
pub struct Changeset {
    values: Vec<(String, Value)>,
    assignments: Vec<(String, Assignment)>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain attribute
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Assign content to a single-file field
    pub fn attach(mut self, field: impl Into<String>, content: UploadContent) -> Self {
        self.assignments.push((field.into(), Assignment::Single(content)));
        self
    }

    /// Replace a collection field
    pub fn attach_many<I>(mut self, field: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<CollectionItem>,
    {
        let items = items.into_iter().map(Into::into).collect();
        self.assignments.push((field.into(), Assignment::Many(items)));
        self
    }

    /// Drop a field's content
    pub fn remove(mut self, field: impl Into<String>) -> Self {
        self.assignments.push((field.into(), Assignment::Remove));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.assignments.is_empty()
    }
}

/// A document collection with mounted uploaders
#[derive(Debug)]
pub struct Model {
    collection: Collection,
    mounts: BTreeMap<String, Arc<Mount>>,
    backend: Arc<dyn StorageBackend>,
    store_dir: String,
}

impl Model {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn StorageBackend>,
    ) -> AttachmentResult<Self> {
        Ok(Self {
            collection: Collection::new(name, store)?,
            mounts: BTreeMap::new(),
            backend,
            store_dir: DEFAULT_STORE_DIR.to_string(),
        })
    }

    /// Directory stored content lives under, relative to the backend root.
    /// Applies to mounts added afterwards.
    pub fn with_store_dir(mut self, store_dir: impl Into<String>) -> Self {
        self.store_dir = store_dir.into();
        self
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Mounted field names
    pub fn mounted_fields(&self) -> Vec<&str> {
        self.mounts.keys().map(String::as_str).collect()
    }

    pub fn mount(&self, field: &str) -> AttachmentResult<&Mount> {
        self.mounts
            .get(field)
            .map(Arc::as_ref)
            .ok_or_else(|| AttachmentError::UnknownField(field.to_string()))
    }

    /// Mount a single-file uploader on `field`
    pub fn mount_uploader(&mut self, field: &str, options: MountOptions) -> AttachmentResult<()> {
        self.add_mount(field, MountKind::Single, options)
    }

    /// Mount an ordered multi-file uploader on `field`
    pub fn mount_uploaders(&mut self, field: &str, options: MountOptions) -> AttachmentResult<()> {
        if options.filename_strategy().is_fixed() {
            return Err(AttachmentError::InvalidMount {
                field: field.to_string(),
                reason: "a fixed filename cannot name more than one file".to_string(),
            });
        }
        self.add_mount(field, MountKind::Multiple, options)
    }

    fn add_mount(&mut self, field: &str, kind: MountKind, options: MountOptions) -> AttachmentResult<()> {
        validate_collection_name(field).map_err(|_| AttachmentError::InvalidMount {
            field: field.to_string(),
            reason: "field names may only contain letters, digits, '_' and '-'".to_string(),
        })?;
        if self.mounts.contains_key(field) {
            return Err(AttachmentError::AlreadyMounted(field.to_string()));
        }

        let (strategy, pipeline) = options.into_parts();
        let uploader = Uploader::new(Arc::clone(&self.backend))
            .with_store_dir(self.store_dir.as_str())
            .with_strategy(strategy)
            .with_pipeline(pipeline);
        let mount = Arc::new(Mount::new(field, self.collection.name(), kind, uploader));

        self.collection.register(mount.clone());
        self.mounts.insert(field.to_string(), mount);
        Ok(())
    }

    /// A new, unsaved document
    pub fn build(&self) -> AttachmentResult<Document> {
        self.collection.build().map_err(AttachmentError::from_document)
    }

    /// A new, unsaved document with the changeset applied.
    ///
    /// Rejected uploads are recorded on the document's errors.
    pub fn new_record(&self, changes: Changeset) -> AttachmentResult<Document> {
        let mut doc = self.build()?;
        self.assign(&mut doc, changes)?;
        Ok(doc)
    }

    /// Apply a changeset without saving.
    ///
    /// Rejected uploads are recorded on the document's errors rather than
    /// returned, so the next save reports them as a validation failure.
    pub fn assign(&self, doc: &mut Document, changes: Changeset) -> AttachmentResult<()> {
        for (name, value) in changes.values {
            if self.mounts.contains_key(&name) {
                return Err(AttachmentError::InvalidMount {
                    field: name,
                    reason: "mounted fields are assigned through uploads".to_string(),
                });
            }
            doc.set(name, value);
        }

        for (field, assignment) in changes.assignments {
            let result = match assignment {
                Assignment::Single(content) => self.attach(doc, &field, content),
                Assignment::Many(items) => self.attach_many(doc, &field, items),
                Assignment::Remove => self.remove_attachment(doc, &field),
            };
            match result {
                Ok(()) => {}
                Err(AttachmentError::Upload(_)) | Err(AttachmentError::CollectionRejected { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Build, assign and save a new document
    pub fn create(&self, changes: Changeset) -> AttachmentResult<Document> {
        let mut doc = self.new_record(changes)?;
        self.save(&mut doc)?;
        Ok(doc)
    }

    /// Assign and save
    pub fn update(&self, doc: &mut Document, changes: Changeset) -> AttachmentResult<()> {
        self.assign(doc, changes)?;
        self.save(doc)
    }

    pub fn save(&self, doc: &mut Document) -> AttachmentResult<()> {
        self.collection.save(doc).map_err(AttachmentError::from_document)
    }

    pub fn is_valid(&self, doc: &Document) -> bool {
        self.collection.is_valid(doc)
    }

    /// Delete the document and all of its content.
    ///
    /// If content cannot be deleted the document is kept.
    pub fn destroy(&self, doc: &mut Document) -> AttachmentResult<()> {
        self.collection.destroy(doc).map_err(AttachmentError::from_document)
    }

    pub fn find(&self, id: &Uuid) -> AttachmentResult<Document> {
        self.collection.find(id).map_err(AttachmentError::from_document)
    }

    pub fn first(&self) -> AttachmentResult<Option<Document>> {
        self.collection.first().map_err(AttachmentError::from_document)
    }

    pub fn all(&self) -> AttachmentResult<Vec<Document>> {
        self.collection.all().map_err(AttachmentError::from_document)
    }

    /// Oldest document as persisted
    pub fn raw_first(&self) -> AttachmentResult<Option<RawDocument>> {
        Ok(self.collection.raw_first()?)
    }

    pub fn raw_find(&self, id: &Uuid) -> AttachmentResult<Option<RawDocument>> {
        Ok(self.collection.raw_find(id)?)
    }

    pub fn count(&self) -> AttachmentResult<usize> {
        Ok(self.collection.count()?)
    }

    fn slot<'a>(&self, doc: &'a mut Document, field: &str) -> AttachmentResult<&'a mut Attachment> {
        self.mount(field)?;
        doc.attachment_mut(field)
            .ok_or_else(|| AttachmentError::UnknownField(field.to_string()))
    }

    /// Assign content to a single-file field.
    ///
    /// A processing failure is recorded under the field name and returned.
    pub fn attach(&self, doc: &mut Document, field: &str, content: UploadContent) -> AttachmentResult<()> {
        let mount = self.mount(field)?;
        let result = match self.slot(doc, field)? {
            Attachment::Single(slot) => slot.set(mount.uploader(), content),
            other => {
                return Err(AttachmentError::WrongKind {
                    field: field.to_string(),
                    expected: "a single file",
                    actual: other.kind_name(),
                })
            }
        };

        doc.errors_mut().clear_field(field);
        result.map_err(|e| {
            doc.errors_mut().add(field, failure_message(&e));
            AttachmentError::Upload(e)
        })
    }

    /// Replace a collection field.
    ///
    /// If any element is rejected nothing changes and every failure is
    /// recorded under the field name.
    pub fn attach_many<I>(&self, doc: &mut Document, field: &str, items: I) -> AttachmentResult<()>
    where
        I: IntoIterator,
        I::Item: Into<CollectionItem>,
    {
        let mount = self.mount(field)?;
        let items = items.into_iter().map(Into::into);
        let result = match self.slot(doc, field)? {
            Attachment::Multiple(slot) => slot.set(mount.uploader(), items),
            other => {
                return Err(AttachmentError::WrongKind {
                    field: field.to_string(),
                    expected: "a collection",
                    actual: other.kind_name(),
                })
            }
        };

        doc.errors_mut().clear_field(field);
        result.map_err(|failures| {
            for (_, e) in &failures {
                doc.errors_mut().add(field, failure_message(e));
            }
            AttachmentError::CollectionRejected {
                field: field.to_string(),
                failures,
            }
        })
    }

    /// Drop a field's content on the next save
    pub fn remove_attachment(&self, doc: &mut Document, field: &str) -> AttachmentResult<()> {
        self.slot(doc, field)?.remove();
        doc.errors_mut().clear_field(field);
        Ok(())
    }

    /// Drop a field's content and save right away
    pub fn purge_attachment(&self, doc: &mut Document, field: &str) -> AttachmentResult<()> {
        self.remove_attachment(doc, field)?;
        self.save(doc)
    }

    /// Point a single-file field at content that is already stored
    pub fn retrieve_from_store(
        &self,
        doc: &mut Document,
        field: &str,
        identifier: &str,
    ) -> AttachmentResult<StoredFile> {
        let mount = self.mount(field)?;
        let identifier = crate::uploader::Identifier::parse(identifier)?;
        let scope = mount.scope(doc);
        match self.slot(doc, field)? {
            Attachment::Single(slot) => Ok(slot
                .retrieve_from_store(mount.uploader(), &scope, &identifier)?
                .clone()),
            other => Err(AttachmentError::WrongKind {
                field: field.to_string(),
                expected: "a single file",
                actual: other.kind_name(),
            }),
        }
    }
}

/// Message recorded on the document for a rejected upload
fn failure_message(err: &UploadError) -> String {
    err.processing_message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}
