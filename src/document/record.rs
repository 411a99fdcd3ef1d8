//! Documents, their persisted form, and change tracking
//!
//! A `Document` is the in-memory working copy of one record. It keeps the
//! attribute values it was loaded with (the persisted snapshot) so that
//! `changes()` can report exactly what a save would write.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::attachment::Attachment;

/// Attribute values keyed by name
pub type Attributes = Map<String, Value>;

/// Attribute name -> (persisted value, current value). Absent reads as null.
pub type Changes = BTreeMap<String, (Value, Value)>;

/// Validation errors keyed by field name, in insertion order per field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages for a field; empty if none
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear_field(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn merge(&mut self, other: &FieldErrors) {
        for (field, messages) in &other.0 {
            for message in messages {
                self.add(field.clone(), message.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of messages
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{} {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Document as persisted by a `DocumentStore`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RawDocument {
    /// Attribute value; None if absent or null
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }
}

/// In-memory working copy of a record
#[derive(Debug, Clone)]
pub struct Document {
    id: Uuid,
    collection: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    attributes: Attributes,
    persisted: Attributes,
    new_record: bool,
    destroyed: bool,
    errors: FieldErrors,
    attachments: BTreeMap<String, Attachment>,
}

impl Document {
    /// A new, unsaved document
    pub fn new(collection: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            collection: collection.into(),
            created_at: now,
            updated_at: now,
            attributes: Attributes::new(),
            persisted: Attributes::new(),
            new_record: true,
            destroyed: false,
            errors: FieldErrors::new(),
            attachments: BTreeMap::new(),
        }
    }

    /// A document loaded from its persisted form
    pub fn from_raw(collection: impl Into<String>, raw: RawDocument) -> Self {
        Self {
            id: raw.id,
            collection: collection.into(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            persisted: raw.attributes.clone(),
            attributes: raw.attributes,
            new_record: false,
            destroyed: false,
            errors: FieldErrors::new(),
            attachments: BTreeMap::new(),
        }
    }

    pub fn to_raw(&self) -> RawDocument {
        RawDocument {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            attributes: self.attributes.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Saved and not destroyed
    pub fn is_persisted(&self) -> bool {
        !self.new_record && !self.destroyed
    }

    /// Attribute value; None if absent or null
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Assign an attribute. Null removes it.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if value.is_null() {
            self.attributes.remove(&name);
        } else {
            self.attributes.insert(name, value);
        }
    }

    /// Attributes that differ from the persisted snapshot
    pub fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        for (name, value) in &self.attributes {
            let old = self.persisted.get(name).cloned().unwrap_or(Value::Null);
            if old != *value {
                changes.insert(name.clone(), (old, value.clone()));
            }
        }
        for (name, old) in &self.persisted {
            if old.is_null() || self.attributes.contains_key(name) {
                continue;
            }
            changes.insert(name.clone(), (old.clone(), Value::Null));
        }
        changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes().is_empty()
    }

    /// True if no errors were recorded
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut FieldErrors {
        &mut self.errors
    }

    pub fn attachment(&self, field: &str) -> Option<&Attachment> {
        self.attachments.get(field)
    }

    pub fn attachment_mut(&mut self, field: &str) -> Option<&mut Attachment> {
        self.attachments.get_mut(field)
    }

    pub fn attachment_names(&self) -> impl Iterator<Item = &str> {
        self.attachments.keys().map(String::as_str)
    }

    pub(crate) fn insert_attachment(&mut self, field: impl Into<String>, attachment: Attachment) {
        self.attachments.insert(field.into(), attachment);
    }

    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        if self.new_record {
            self.created_at = now;
        }
        self.updated_at = now;
    }

    pub(crate) fn restore_timestamps(&mut self, previous: &RawDocument) {
        self.created_at = previous.created_at;
        self.updated_at = previous.updated_at;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = self.attributes.clone();
        self.new_record = false;
    }

    /// Attributes whose value differs from an earlier copy of the attribute map
    pub(crate) fn changed_since(&self, earlier: &Attributes) -> Vec<String> {
        let mut names: Vec<String> = self
            .attributes
            .iter()
            .filter(|(name, value)| earlier.get(name.as_str()) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect();
        names.extend(
            earlier
                .keys()
                .filter(|name| !self.attributes.contains_key(name.as_str()))
                .cloned(),
        );
        names.sort();
        names
    }

    /// The persisted snapshot with `fields` taken from the current attributes
    pub(crate) fn persisted_with(&self, fields: &[String]) -> RawDocument {
        let mut attributes = self.persisted.clone();
        for name in fields {
            match self.attributes.get(name) {
                Some(value) => attributes.insert(name.clone(), value.clone()),
                None => attributes.remove(name),
            };
        }
        RawDocument {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            attributes,
        }
    }

    /// Record `fields` as written, leaving other changes pending
    pub(crate) fn mark_fields_persisted(&mut self, fields: &[String]) {
        self.persisted = self.persisted_with(fields).attributes;
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }
}
