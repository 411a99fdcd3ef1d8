//! Observability events for aeroattach
//!
//! Every observable step of the attachment lifecycle has a typed event.
//! Events are explicit; free-form event names are not used by the crate.

use std::fmt;

use super::logger::Severity;

/// Observable events in the attachment lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded and validated
    ConfigLoaded,

    // Upload processing
    /// Content passed the processing pipeline and is held in the cache
    FileCached,
    /// A processing step rejected the content
    ProcessingFailed,

    // Durable storage
    /// Content written to the store
    FileStored,
    /// Stored content deleted
    FileRemoved,
    /// Deleting stored content failed (the owning operation continues)
    FileRemoveFailed,
    /// Staged content rolled back after a failed document write
    FileStageAborted,
    /// Replacement content could not be moved into place (the owning operation continues)
    FilePromoteFailed,

    // Documents
    /// Document persisted
    DocumentSaved,
    /// Document rejected by validation
    DocumentInvalid,
    /// Document removed from its collection
    DocumentDestroyed,
    /// A destroy hook failed; the document was kept
    DocumentDestroyAborted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::FileCached => "FILE_CACHED",
            Event::ProcessingFailed => "PROCESSING_FAILED",

            Event::FileStored => "FILE_STORED",
            Event::FileRemoved => "FILE_REMOVED",
            Event::FileRemoveFailed => "FILE_REMOVE_FAILED",
            Event::FileStageAborted => "FILE_STAGE_ABORTED",
            Event::FilePromoteFailed => "FILE_PROMOTE_FAILED",

            Event::DocumentSaved => "DOCUMENT_SAVED",
            Event::DocumentInvalid => "DOCUMENT_INVALID",
            Event::DocumentDestroyed => "DOCUMENT_DESTROYED",
            Event::DocumentDestroyAborted => "DOCUMENT_DESTROY_ABORTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::FileCached => Severity::Trace,
            Event::ProcessingFailed | Event::DocumentInvalid => Severity::Info,
            Event::FileRemoveFailed
            | Event::FileStageAborted
            | Event::FilePromoteFailed
            | Event::DocumentDestroyAborted => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::FileCached,
            Event::ProcessingFailed,
            Event::FileStored,
            Event::FileRemoved,
            Event::FileRemoveFailed,
            Event::FileStageAborted,
            Event::FilePromoteFailed,
            Event::DocumentSaved,
            Event::DocumentInvalid,
            Event::DocumentDestroyed,
            Event::DocumentDestroyAborted,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_remove_failure_is_a_warning() {
        assert_eq!(Event::FileRemoveFailed.severity(), Severity::Warn);
        assert_eq!(Event::FilePromoteFailed.severity(), Severity::Warn);
        assert_eq!(Event::FileStored.severity(), Severity::Info);
        assert_eq!(Event::FileCached.severity(), Severity::Trace);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::FileStored), "FILE_STORED");
        assert_eq!(format!("{}", Event::DocumentDestroyed), "DOCUMENT_DESTROYED");
    }
}
