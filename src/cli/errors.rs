//! CLI-specific error types
//!
//! Every CLI error ends the command with a non-zero exit code.

use std::fmt;
use std::io;

use crate::attachment::AttachmentError;
use crate::config::ConfigError;
use crate::document::DocumentError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Already initialized
    AlreadyInitialized,
    /// Not initialized
    NotInitialized,
    /// Bad command line value
    InvalidArgument,
    /// Record or content missing
    NotFound,
    /// Record failed validation
    Rejected,
    /// Storing or deleting content failed
    AttachmentFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::AlreadyInitialized => "AERO_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "AERO_CLI_NOT_INITIALIZED",
            Self::InvalidArgument => "AERO_CLI_INVALID_ARGUMENT",
            Self::NotFound => "AERO_CLI_NOT_FOUND",
            Self::Rejected => "AERO_CLI_REJECTED",
            Self::AttachmentFailed => "AERO_CLI_ATTACHMENT_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Data directory already initialized",
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Data directory not initialized. Run 'aeroattach init' first.",
        )
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::NotFound, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::UnknownModel(name) => {
                Self::invalid_argument(format!("Unknown model: {}", name))
            }
            ConfigError::Attachment(inner) => inner.into(),
            ConfigError::Document(inner) => inner.into(),
            other => Self::config_error(other.to_string()),
        }
    }
}

impl From<DocumentError> for CliError {
    fn from(e: DocumentError) -> Self {
        if e.is_not_found() {
            Self::not_found(e.to_string())
        } else {
            Self::io_error(e.to_string())
        }
    }
}

impl From<AttachmentError> for CliError {
    fn from(e: AttachmentError) -> Self {
        let code = match &e {
            _ if e.is_not_found() => CliErrorCode::NotFound,
            AttachmentError::Invalid(_) | AttachmentError::CollectionRejected { .. } => {
                CliErrorCode::Rejected
            }
            AttachmentError::UnknownField(_)
            | AttachmentError::WrongKind { .. }
            | AttachmentError::InvalidMount { .. }
            | AttachmentError::AlreadyMounted(_) => CliErrorCode::InvalidArgument,
            AttachmentError::Upload(_) | AttachmentError::Document(_) => {
                CliErrorCode::AttachmentFailed
            }
        };
        Self::new(code, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldErrors;
    use crate::uploader::UploadError;

    #[test]
    fn test_attachment_error_codes() {
        let missing: CliError = AttachmentError::Upload(UploadError::ObjectNotFound("x".into())).into();
        assert_eq!(missing.code(), &CliErrorCode::NotFound);

        let mut errors = FieldErrors::new();
        errors.add("file", "Oops");
        let rejected: CliError = AttachmentError::Invalid(errors).into();
        assert_eq!(rejected.code_str(), "AERO_CLI_REJECTED");
        assert_eq!(rejected.message(), "Validation failed: file Oops");

        let unknown: CliError = AttachmentError::UnknownField("nope".into()).into();
        assert_eq!(unknown.code(), &CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_display_includes_code() {
        let err = CliError::not_initialized();
        assert!(err.to_string().starts_with("AERO_CLI_NOT_INITIALIZED: "));
    }
}
