//! Document store error types
//!
//! Error codes:
//! - AERO_DOCUMENT_NOT_FOUND
//! - AERO_DOCUMENT_ALREADY_EXISTS
//! - AERO_DOCUMENT_INVALID (validation failed; carries the field errors)
//! - AERO_DOCUMENT_HOOK_FAILED (a lifecycle hook aborted the operation)
//! - AERO_DOCUMENT_IO_ERROR
//! - AERO_DOCUMENT_CORRUPTION (persisted documents could not be decoded)
//! - AERO_DOCUMENT_INVALID_COLLECTION

use std::error::Error;
use std::fmt;
use std::io;

use super::record::FieldErrors;

/// Document store error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentErrorCode {
    AeroDocumentNotFound,
    AeroDocumentAlreadyExists,
    AeroDocumentInvalid,
    AeroDocumentHookFailed,
    AeroDocumentIoError,
    AeroDocumentCorruption,
    AeroDocumentInvalidCollection,
}

impl DocumentErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            DocumentErrorCode::AeroDocumentNotFound => "AERO_DOCUMENT_NOT_FOUND",
            DocumentErrorCode::AeroDocumentAlreadyExists => "AERO_DOCUMENT_ALREADY_EXISTS",
            DocumentErrorCode::AeroDocumentInvalid => "AERO_DOCUMENT_INVALID",
            DocumentErrorCode::AeroDocumentHookFailed => "AERO_DOCUMENT_HOOK_FAILED",
            DocumentErrorCode::AeroDocumentIoError => "AERO_DOCUMENT_IO_ERROR",
            DocumentErrorCode::AeroDocumentCorruption => "AERO_DOCUMENT_CORRUPTION",
            DocumentErrorCode::AeroDocumentInvalidCollection => {
                "AERO_DOCUMENT_INVALID_COLLECTION"
            }
        }
    }
}

impl fmt::Display for DocumentErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Document store error with context
#[derive(Debug)]
pub struct DocumentError {
    code: DocumentErrorCode,
    message: String,
    details: Option<String>,
    field_errors: Option<FieldErrors>,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl DocumentError {
    fn new(code: DocumentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            field_errors: None,
            source: None,
        }
    }

    /// No document with this id in the collection
    pub fn not_found(collection: &str, id: impl fmt::Display) -> Self {
        let mut err = Self::new(DocumentErrorCode::AeroDocumentNotFound, "Document not found");
        err.details = Some(format!("collection: {}, id: {}", collection, id));
        err
    }

    /// Insert of an id that is already present
    pub fn already_exists(collection: &str, id: impl fmt::Display) -> Self {
        let mut err = Self::new(
            DocumentErrorCode::AeroDocumentAlreadyExists,
            "Document already exists",
        );
        err.details = Some(format!("collection: {}, id: {}", collection, id));
        err
    }

    /// Validation failed; the field errors travel with the error
    pub fn validation_failed(errors: FieldErrors) -> Self {
        let mut err = Self::new(
            DocumentErrorCode::AeroDocumentInvalid,
            format!("Validation failed: {}", errors),
        );
        err.field_errors = Some(errors);
        err
    }

    /// A lifecycle hook aborted the operation
    pub fn hook_failed(hook: &str, source: impl Error + Send + Sync + 'static) -> Self {
        let mut err = Self::new(
            DocumentErrorCode::AeroDocumentHookFailed,
            format!("Hook '{}' failed: {}", hook, source),
        );
        err.source = Some(Box::new(source));
        err
    }

    /// Underlying I/O failure
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        let mut err = Self::new(DocumentErrorCode::AeroDocumentIoError, message);
        err.source = Some(Box::new(source));
        err
    }

    /// Persisted data could not be decoded
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(DocumentErrorCode::AeroDocumentCorruption, message)
    }

    /// Collection name unusable as a storage name
    pub fn invalid_collection(name: &str) -> Self {
        Self::new(
            DocumentErrorCode::AeroDocumentInvalidCollection,
            format!("Invalid collection name: '{}'", name),
        )
    }

    /// Lock poisoning and similar conditions
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(DocumentErrorCode::AeroDocumentIoError, message)
    }

    pub fn code(&self) -> DocumentErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Field errors of a failed validation
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.field_errors.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        self.code == DocumentErrorCode::AeroDocumentNotFound
    }

    /// Unwrap the hook error a `hook_failed` error was built from
    pub fn into_source(self) -> Option<Box<dyn Error + Send + Sync>> {
        self.source
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl Error for DocumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;
