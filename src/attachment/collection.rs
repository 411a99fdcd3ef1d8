//! Ordered multi-file attachment field
//!
//! A `set` replaces the whole sequence. Each element is processed on its
//! own and any failure rejects the assignment. On save, new elements are
//! stored, dropped elements are deleted and kept elements are left alone.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use super::field::{discard_logged, promote_logged, remove_logged, FieldState, Staged};
use crate::observability::{log_event_with_fields, Event};
use crate::uploader::{
    calculate_checksum, CachedFile, Identifier, PendingFile, StoreScope, StoredFile,
    UploadContent, UploadError, UploadResult, Uploader,
};

/// One element of a collection assignment
#[derive(Debug, Clone)]
pub enum CollectionItem {
    /// New content
    Upload(UploadContent),
    /// An element that is already stored, kept as it is
    Existing(Identifier),
}

impl From<UploadContent> for CollectionItem {
    fn from(content: UploadContent) -> Self {
        CollectionItem::Upload(content)
    }
}

impl From<Identifier> for CollectionItem {
    fn from(identifier: Identifier) -> Self {
        CollectionItem::Existing(identifier)
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Keep(StoredFile),
    Cached {
        cached: CachedFile,
        identifier: Identifier,
    },
}

impl Entry {
    fn identifier(&self) -> &Identifier {
        match self {
            Entry::Keep(file) => file.identifier(),
            Entry::Cached { identifier, .. } => identifier,
        }
    }

    /// Checksum of new content; `None` for an element kept as stored
    fn checksum(&self) -> Option<&str> {
        match self {
            Entry::Keep(_) => None,
            Entry::Cached { cached, .. } => Some(cached.checksum.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingSave {
    previous: Vec<StoredFile>,
    written: Vec<Identifier>,
    in_place: Vec<PendingFile>,
}

/// An ordered sequence of files under one field name
#[derive(Debug, Clone)]
pub struct AttachmentCollection {
    field: String,
    stored: Vec<StoredFile>,
    assigned: Option<Vec<Entry>>,
    pending: Option<PendingSave>,
}

impl AttachmentCollection {
    pub fn new(field: impl Into<String>) -> Self {
        Self::with_stored(field, Vec::new())
    }

    pub fn with_stored(field: impl Into<String>, stored: Vec<StoredFile>) -> Self {
        Self {
            field: field.into(),
            stored,
            assigned: None,
            pending: None,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn state(&self) -> FieldState {
        let has_cached = self
            .assigned
            .as_ref()
            .is_some_and(|entries| entries.iter().any(|e| matches!(e, Entry::Cached { .. })));
        if has_cached {
            FieldState::Cached
        } else if self.stored.is_empty() {
            FieldState::Empty
        } else {
            FieldState::Persisted
        }
    }

    pub fn is_dirty(&self) -> bool {
        let Some(entries) = &self.assigned else {
            return false;
        };
        if entries.len() != self.stored.len() {
            return true;
        }
        entries.iter().zip(&self.stored).any(|(entry, stored)| match entry {
            Entry::Keep(kept) => kept.identifier() != stored.identifier(),
            Entry::Cached { .. } => true,
        })
    }

    /// Stored elements, in order
    pub fn files(&self) -> &[StoredFile] {
        &self.stored
    }

    pub fn identifiers(&self) -> Vec<&Identifier> {
        self.stored.iter().map(StoredFile::identifier).collect()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.stored.iter().map(StoredFile::path).collect()
    }

    /// Elements waiting for the next save
    pub fn cached(&self) -> Vec<&CachedFile> {
        self.assigned
            .iter()
            .flatten()
            .filter_map(|entry| match entry {
                Entry::Cached { cached, .. } => Some(cached),
                Entry::Keep(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// Replace the whole collection.
    ///
    /// Every element is processed; if any fails, all failures are returned
    /// with their positions and nothing changes. An element whose identifier
    /// is already claimed by different content earlier in the sequence fails
    /// with `IdentifierConflict`.
    pub fn set<I>(&mut self, uploader: &Uploader, items: I) -> Result<(), Vec<(usize, UploadError)>>
    where
        I: IntoIterator<Item = CollectionItem>,
    {
        let mut resolved = Vec::new();
        let mut failures = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            match self.resolve_item(uploader, item) {
                Ok(entry) => resolved.push((index, entry)),
                Err(e) => failures.push((index, e)),
            }
        }

        let mut claimed: BTreeMap<&Identifier, Option<&str>> = BTreeMap::new();
        for (index, entry) in &resolved {
            match claimed.get(entry.identifier()) {
                Some(checksum) if *checksum != entry.checksum() => failures.push((
                    *index,
                    UploadError::IdentifierConflict(entry.identifier().to_string()),
                )),
                Some(_) => {}
                None => {
                    claimed.insert(entry.identifier(), entry.checksum());
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            return Err(failures);
        }
        self.assigned = Some(resolved.into_iter().map(|(_, entry)| entry).collect());
        Ok(())
    }

    fn resolve_item(&self, uploader: &Uploader, item: CollectionItem) -> UploadResult<Entry> {
        match item {
            CollectionItem::Existing(identifier) => self
                .find_stored(&identifier)
                .cloned()
                .map(Entry::Keep)
                .ok_or_else(|| UploadError::ObjectNotFound(identifier.to_string())),
            CollectionItem::Upload(content) => {
                let cached = uploader.cache(content)?;
                let identifier = uploader.identifier_for(&cached)?;
                match self.find_stored(&identifier) {
                    Some(stored) if same_content(stored, &cached) => Ok(Entry::Keep(stored.clone())),
                    _ => Ok(Entry::Cached { cached, identifier }),
                }
            }
        }
    }

    fn find_stored(&self, identifier: &Identifier) -> Option<&StoredFile> {
        self.stored.iter().find(|f| f.identifier() == identifier)
    }

    /// Empty the collection on the next save
    pub fn remove(&mut self) {
        self.assigned = Some(Vec::new());
    }

    /// Point the collection at existing stored content. All identifiers must resolve.
    pub fn retrieve_from_store(
        &mut self,
        uploader: &Uploader,
        scope: &StoreScope,
        identifiers: &[Identifier],
    ) -> UploadResult<&[StoredFile]> {
        let files = identifiers
            .iter()
            .map(|id| uploader.retrieve(scope, id))
            .collect::<UploadResult<Vec<_>>>()?;
        self.stored = files;
        self.assigned = None;
        Ok(&self.stored)
    }

    /// Store new elements. Returns the identifier list to persist.
    ///
    /// New content under an identifier that is already stored is written
    /// beside it and only moved into place by `commit`.
    pub fn stage(
        &mut self,
        uploader: &Uploader,
        scope: &StoreScope,
    ) -> UploadResult<Staged<Vec<Identifier>>> {
        let Some(entries) = &self.assigned else {
            return Ok(Staged::Unchanged);
        };

        let previous_ids: BTreeSet<&Identifier> =
            self.stored.iter().map(StoredFile::identifier).collect();
        let mut next = Vec::with_capacity(entries.len());
        let mut written = Vec::new();
        let mut in_place = Vec::new();

        for entry in entries {
            let result = match entry {
                Entry::Keep(file) => Ok(file.clone()),
                Entry::Cached { cached, identifier } if previous_ids.contains(identifier) => uploader
                    .store_pending(scope, cached)
                    .map(|pending| {
                        in_place.push(pending);
                        uploader.locate(scope, identifier)
                    }),
                Entry::Cached { cached, .. } => uploader.store(scope, cached).map(|file| {
                    written.push(file.identifier().clone());
                    file
                }),
            };
            match result {
                Ok(file) => next.push(file),
                Err(e) => {
                    for id in &written {
                        remove_logged(uploader, scope, &self.field, id);
                    }
                    for pending in &in_place {
                        discard_logged(uploader, &self.field, pending);
                    }
                    return Err(e);
                }
            }
        }

        let identifiers = next.iter().map(|f| f.identifier().clone()).collect();
        let previous = std::mem::replace(&mut self.stored, next);
        self.pending = Some(PendingSave {
            previous,
            written,
            in_place,
        });
        Ok(Staged::Write(identifiers))
    }

    /// The document is written: move replacements into place and delete
    /// elements that were dropped
    pub fn commit(&mut self, uploader: &Uploader, scope: &StoreScope) {
        self.assigned = None;
        let Some(pending) = self.pending.take() else {
            return;
        };
        for replacement in &pending.in_place {
            promote_logged(uploader, scope, &self.field, replacement);
        }
        let current: BTreeSet<&Identifier> =
            self.stored.iter().map(StoredFile::identifier).collect();
        for old in &pending.previous {
            if !current.contains(old.identifier()) {
                remove_logged(uploader, scope, &self.field, old.identifier());
            }
        }
    }

    /// The document write failed: delete what `stage` wrote and restore the old elements
    pub fn abort(&mut self, uploader: &Uploader, scope: &StoreScope) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        self.stored = pending.previous;
        for id in &pending.written {
            log_event_with_fields(
                Event::FileStageAborted,
                &[("field", self.field.as_str()), ("identifier", id.as_str())],
            );
            remove_logged(uploader, scope, &self.field, id);
        }
        for replacement in &pending.in_place {
            log_event_with_fields(
                Event::FileStageAborted,
                &[
                    ("field", self.field.as_str()),
                    ("identifier", replacement.identifier().as_str()),
                ],
            );
            discard_logged(uploader, &self.field, replacement);
        }
        true
    }

    /// Delete every stored element; the owning document is being destroyed
    pub fn destroy(&mut self, uploader: &Uploader, scope: &StoreScope) -> UploadResult<()> {
        while let Some(file) = self.stored.last() {
            uploader.remove(scope, file.identifier())?;
            self.stored.pop();
        }
        self.assigned = None;
        self.pending = None;
        Ok(())
    }
}

fn same_content(stored: &StoredFile, cached: &CachedFile) -> bool {
    stored
        .read()
        .map(|data| calculate_checksum(&data) == cached.checksum)
        .unwrap_or(false)
}
