//! # Filenames and Identifiers

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::{UploadError, UploadResult};

/// Characters allowed in a stored filename; everything else becomes `_`
fn sanitize_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w.\-+]").expect("static sanitize pattern"))
}

/// Reduce an uploaded name to a safe single path component.
///
/// Directory parts are dropped, disallowed characters replaced by `_`,
/// leading dots stripped. A name with nothing left becomes `unnamed`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned = sanitize_regex().replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Opaque reference to durably stored content
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse an identifier; it must be a single, non-hidden path component
    pub fn parse(value: impl Into<String>) -> UploadResult<Self> {
        let value = value.into();
        if value.is_empty()
            || value.starts_with('.')
            || value.contains('/')
            || value.contains('\\')
            || value.chars().any(char::is_control)
        {
            return Err(UploadError::InvalidIdentifier(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = UploadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// How stored content is named
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilenameStrategy {
    /// `<16 hex chars of the content sha256>-<sanitized name>`
    #[default]
    Digest,
    /// The sanitized original name
    Original,
    /// Always this name. The identifier is never persisted on the document.
    Fixed(String),
}

impl FilenameStrategy {
    /// Build a fixed strategy; the name is sanitized first
    pub fn fixed(name: &str) -> Self {
        FilenameStrategy::Fixed(sanitize_filename(name))
    }

    /// True if names are deterministic and identifiers are not persisted
    pub fn is_fixed(&self) -> bool {
        matches!(self, FilenameStrategy::Fixed(_))
    }

    /// Identifier for content with the given sanitized name and checksum
    pub fn identifier_for(&self, filename: &str, checksum: &str) -> UploadResult<Identifier> {
        match self {
            FilenameStrategy::Digest => {
                let prefix = checksum.get(..16).unwrap_or(checksum);
                Identifier::parse(format!("{}-{}", prefix, filename))
            }
            FilenameStrategy::Original => Identifier::parse(filename),
            FilenameStrategy::Fixed(name) => Identifier::parse(name.as_str()),
        }
    }
}
