//! # Processing Pipeline
//!
//! An ordered list of named steps run over a working copy of uploaded
//! content before it is cached. Any step may reject the content with a
//! message; the first rejection stops the pipeline.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::errors::{UploadError, UploadResult};

/// Working copy a step may inspect or rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl ProcessedFile {
    /// Lowercased extension without the dot, if any
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// A step's rejection, carrying the message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProcessingError(String);

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// One processing step
pub trait ProcessingStep: Send + Sync {
    fn process(&self, file: &mut ProcessedFile) -> Result<(), ProcessingError>;
}

impl<F> ProcessingStep for F
where
    F: Fn(&mut ProcessedFile) -> Result<(), ProcessingError> + Send + Sync,
{
    fn process(&self, file: &mut ProcessedFile) -> Result<(), ProcessingError> {
        self(file)
    }
}

/// Rejects content larger than a byte limit
#[derive(Debug, Clone, Copy)]
pub struct MaxSize(pub u64);

impl ProcessingStep for MaxSize {
    fn process(&self, file: &mut ProcessedFile) -> Result<(), ProcessingError> {
        let size = file.data.len() as u64;
        if size > self.0 {
            return Err(ProcessingError::new(format!(
                "File too large: {} bytes (max: {})",
                size, self.0
            )));
        }
        Ok(())
    }
}

/// Accepts only the listed extensions (case-insensitive, without dots)
#[derive(Debug, Clone)]
pub struct AllowedExtensions(Vec<String>);

impl AllowedExtensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        )
    }
}

impl ProcessingStep for AllowedExtensions {
    fn process(&self, file: &mut ProcessedFile) -> Result<(), ProcessingError> {
        match file.extension() {
            Some(ext) if self.0.iter().any(|allowed| *allowed == ext) => Ok(()),
            Some(ext) => Err(ProcessingError::new(format!(
                "You are not allowed to upload \"{}\" files, allowed types: {}",
                ext,
                self.0.join(", ")
            ))),
            None => Err(ProcessingError::new(format!(
                "File has no extension, allowed types: {}",
                self.0.join(", ")
            ))),
        }
    }
}

/// Ordered, named processing steps
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<(String, Arc<dyn ProcessingStep>)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named step
    pub fn step(mut self, name: impl Into<String>, step: impl ProcessingStep + 'static) -> Self {
        self.steps.push((name.into(), Arc::new(step)));
        self
    }

    /// Append a named step written as a closure
    pub fn step_fn<F>(self, name: impl Into<String>, step: F) -> Self
    where
        F: Fn(&mut ProcessedFile) -> Result<(), ProcessingError> + Send + Sync + 'static,
    {
        self.step(name, step)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Step names in run order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Run every step in order over the working copy
    pub fn run(&self, file: &mut ProcessedFile) -> UploadResult<()> {
        for (name, step) in &self.steps {
            step.process(file)
                .map_err(|e| UploadError::ProcessingFailed {
                    step: name.clone(),
                    message: e.message().to_string(),
                })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, data: &[u8]) -> ProcessedFile {
        ProcessedFile {
            filename: name.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_empty_pipeline_passes() {
        let mut f = file("a.txt", b"abc");
        Pipeline::new().run(&mut f).unwrap();
        assert_eq!(f.data, b"abc");
    }

    #[test]
    fn test_steps_run_in_order() {
        let pipeline = Pipeline::new()
            .step_fn("upcase", |f| {
                f.data = f.data.to_ascii_uppercase();
                Ok(())
            })
            .step_fn("suffix", |f| {
                f.data.extend_from_slice(b"!");
                Ok(())
            });

        let mut f = file("a.txt", b"hi");
        pipeline.run(&mut f).unwrap();
        assert_eq!(f.data, b"HI!");
        assert_eq!(pipeline.step_names(), vec!["upcase", "suffix"]);
    }

    #[test]
    fn test_failure_stops_pipeline_and_names_step() {
        let pipeline = Pipeline::new()
            .step_fn("raise_error", |_| {
                Err(ProcessingError::new("Oops"))
            })
            .step_fn("never", |f| {
                f.data.clear();
                Ok(())
            });

        let mut f = file("a.txt", b"keep");
        let err = pipeline.run(&mut f).unwrap_err();
        assert_eq!(
            err,
            UploadError::ProcessingFailed {
                step: "raise_error".into(),
                message: "Oops".into()
            }
        );
        assert_eq!(f.data, b"keep");
    }

    #[test]
    fn test_max_size() {
        let mut small = file("a.txt", b"1234");
        let mut big = file("a.txt", b"12345");
        assert!(MaxSize(4).process(&mut small).is_ok());
        let err = MaxSize(4).process(&mut big).unwrap_err();
        assert_eq!(err.message(), "File too large: 5 bytes (max: 4)");
    }

    #[test]
    fn test_allowed_extensions() {
        let step = AllowedExtensions::new([".TXT", "md"]);
        assert!(step.process(&mut file("notes.Txt", b"")).is_ok());
        assert!(step.process(&mut file("readme.md", b"")).is_ok());
        assert!(step.process(&mut file("image.png", b"")).is_err());
        assert!(step.process(&mut file("Makefile", b"")).is_err());
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(file("archive.tar.GZ", b"").extension(), Some("gz".into()));
        assert_eq!(file("noext", b"").extension(), None);
        assert_eq!(file("trailing.", b"").extension(), None);
    }
}
