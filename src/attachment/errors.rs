//! # Attachment Errors

use thiserror::Error;

use crate::document::{DocumentError, DocumentErrorCode, FieldErrors};
use crate::uploader::UploadError;

/// Result type for attachment operations
pub type AttachmentResult<T> = Result<T, AttachmentError>;

/// Attachment layer errors
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    // Mount errors
    #[error("Unknown attachment field: {0}")]
    UnknownField(String),

    #[error("Field already mounted: {0}")]
    AlreadyMounted(String),

    #[error("Invalid mount for '{field}': {reason}")]
    InvalidMount { field: String, reason: String },

    #[error("Field '{field}' holds {actual}, not {expected}")]
    WrongKind {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    // Assignment errors
    #[error("{} element(s) of '{field}' were rejected", .failures.len())]
    CollectionRejected {
        field: String,
        failures: Vec<(usize, UploadError)>,
    },

    #[error("Validation failed: {0}")]
    Invalid(FieldErrors),
}

impl AttachmentError {
    /// Recover the attachment error a document operation carried, if any.
    ///
    /// Validation failures become `Invalid`; hook failures raised by a mount
    /// are unwrapped to the error the mount produced.
    pub fn from_document(err: DocumentError) -> Self {
        if let Some(errors) = err.field_errors() {
            return AttachmentError::Invalid(errors.clone());
        }
        if err.code() != DocumentErrorCode::AeroDocumentHookFailed {
            return AttachmentError::Document(err);
        }
        // hook_failed always carries a source; keep the original error if not ours
        let message = err.message().to_string();
        match err.into_source().map(|source| source.downcast::<AttachmentError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => AttachmentError::Document(DocumentError::internal(format!(
                "{}: {}",
                message, other
            ))),
            None => AttachmentError::Document(DocumentError::internal(message)),
        }
    }

    /// Field errors of a failed validation
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AttachmentError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            AttachmentError::Upload(e) => e.is_not_found(),
            AttachmentError::Document(e) => e.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_becomes_invalid() {
        let mut errors = FieldErrors::new();
        errors.add("file", "Oops");

        let err = AttachmentError::from_document(DocumentError::validation_failed(errors));
        assert_eq!(err.field_errors().unwrap().get("file"), ["Oops".to_string()]);
    }

    #[test]
    fn test_hook_failure_is_unwrapped() {
        let inner = AttachmentError::Upload(UploadError::IoError("disk full".into()));
        let err = AttachmentError::from_document(DocumentError::hook_failed("file", inner));
        assert!(matches!(
            err,
            AttachmentError::Upload(UploadError::IoError(ref m)) if m == "disk full"
        ));
    }

    #[test]
    fn test_not_found_passes_through() {
        let err = AttachmentError::from_document(DocumentError::not_found("models", "x"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_collection_rejected_display() {
        let err = AttachmentError::CollectionRejected {
            field: "files".into(),
            failures: vec![(1, UploadError::IoError("x".into()))],
        };
        assert_eq!(err.to_string(), "1 element(s) of 'files' were rejected");
    }
}
