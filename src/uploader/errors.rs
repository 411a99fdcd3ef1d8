//! # Upload Errors

use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Upload processor errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    // Object errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    // Validation errors
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Identifier already taken by other content: {0}")]
    IdentifierConflict(String),

    #[error("Processing step '{step}' failed: {message}")]
    ProcessingFailed { step: String, message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    IoError(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// True when the error only says the object is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, UploadError::ObjectNotFound(_))
    }

    /// The message a failed processing step reported, if this is one
    pub fn processing_message(&self) -> Option<&str> {
        match self {
            UploadError::ProcessingFailed { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        UploadError::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        assert!(UploadError::ObjectNotFound("a.txt".into()).is_not_found());
        assert!(!UploadError::IoError("disk".into()).is_not_found());
    }

    #[test]
    fn test_processing_message() {
        let err = UploadError::ProcessingFailed {
            step: "raise_error".into(),
            message: "Oops".into(),
        };
        assert_eq!(err.processing_message(), Some("Oops"));
        assert_eq!(err.to_string(), "Processing step 'raise_error' failed: Oops");
        assert_eq!(UploadError::Internal("x".into()).processing_message(), None);
    }
}
