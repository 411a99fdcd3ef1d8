//! Configuration file (`aeroattach.json`)
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "store_dir": "uploads",
//!   "log_level": "info",
//!   "models": {
//!     "posts": [
//!       { "field": "cover", "allowed_extensions": ["png", "jpg"] },
//!       { "field": "files", "multiple": true, "max_file_size": 1048576 }
//!     ]
//!   }
//! }
//! ```
//!
//! Documents live in `<data_dir>/documents`, content in `<data_dir>/<store_dir>`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attachment::{AttachmentError, Model, MountOptions};
use crate::document::{validate_collection_name, DocumentError, DocumentStore, JsonFileDocumentStore};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::uploader::{
    AllowedExtensions, FilenameStrategy, LocalBackend, MaxSize, StorageBackend, DEFAULT_STORE_DIR,
};

/// Directory under `data_dir` holding the document files
pub const DOCUMENTS_DIR: &str = "documents";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    /// Content directory relative to `data_dir` (default "uploads")
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Minimum log severity: trace, info, warn or error (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Collection name -> mounted fields
    #[serde(default)]
    pub models: BTreeMap<String, Vec<MountConfig>>,
}

/// One mounted field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    pub field: String,

    /// Ordered collection of files instead of a single file
    #[serde(default)]
    pub multiple: bool,

    /// Fixed stored name; the identifier is then never persisted
    #[serde(default)]
    pub filename: Option<String>,

    /// "digest" (default) or "original"
    #[serde(default = "default_filename_strategy")]
    pub filename_strategy: String,

    #[serde(default)]
    pub max_file_size: Option<u64>,

    #[serde(default)]
    pub allowed_extensions: Option<Vec<String>>,
}

fn default_store_dir() -> String {
    DEFAULT_STORE_DIR.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_filename_strategy() -> String {
    "digest".to_string()
}

impl MountConfig {
    fn validate(&self, model: &str) -> ConfigResult<()> {
        let invalid = |reason: &str| {
            ConfigError::Invalid(format!("{}.{}: {}", model, self.field, reason))
        };

        validate_collection_name(&self.field).map_err(|_| invalid("invalid field name"))?;

        if !matches!(self.filename_strategy.as_str(), "digest" | "original") {
            return Err(invalid("filename_strategy must be 'digest' or 'original'"));
        }
        if let Some(name) = &self.filename {
            if name.trim().is_empty() {
                return Err(invalid("filename must not be empty"));
            }
            if self.multiple {
                return Err(invalid("filename cannot be used with multiple"));
            }
        }
        if self.max_file_size == Some(0) {
            return Err(invalid("max_file_size must be > 0"));
        }
        if matches!(&self.allowed_extensions, Some(exts) if exts.is_empty()) {
            return Err(invalid("allowed_extensions must not be empty"));
        }
        Ok(())
    }

    /// Uploader options for this field
    pub fn mount_options(&self) -> MountOptions {
        let mut options = match (&self.filename, self.filename_strategy.as_str()) {
            (Some(name), _) => MountOptions::new().filename(name),
            (None, "original") => MountOptions::new().strategy(FilenameStrategy::Original),
            (None, _) => MountOptions::new(),
        };
        if let Some(max) = self.max_file_size {
            options = options.process("max_size", MaxSize(max));
        }
        if let Some(exts) = &self.allowed_extensions {
            options = options.process("allowed_extensions", AllowedExtensions::new(exts));
        }
        options
    }
}

impl Config {
    /// Load, validate and apply the log level
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;

        Logger::set_min_severity(config.log_severity());
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("models", config.models.len().to_string().as_str()),
                ("path", path.display().to_string().as_str()),
            ],
        );
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }

        let store_dir = self.store_dir.trim_matches('/');
        if store_dir.is_empty()
            || store_dir.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(ConfigError::Invalid(format!(
                "store_dir must be a relative path without '.' or '..': '{}'",
                self.store_dir
            )));
        }
        if store_dir == DOCUMENTS_DIR {
            return Err(ConfigError::Invalid(format!(
                "store_dir cannot be '{}'",
                DOCUMENTS_DIR
            )));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level: '{}'. Must be trace, info, warn or error.",
                self.log_level
            )));
        }

        for (model, mounts) in &self.models {
            validate_collection_name(model)
                .map_err(|_| ConfigError::Invalid(format!("Invalid model name: '{}'", model)))?;
            let mut seen = BTreeSet::new();
            for mount in mounts {
                mount.validate(model)?;
                if !seen.insert(mount.field.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "{}.{}: mounted twice",
                        model, mount.field
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn documents_path(&self) -> PathBuf {
        self.data_path().join(DOCUMENTS_DIR)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_path().join(self.store_dir.trim_matches('/'))
    }

    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Open the document store under `data_dir`
    pub fn open_store(&self) -> ConfigResult<Arc<dyn DocumentStore>> {
        Ok(Arc::new(JsonFileDocumentStore::open(self.documents_path())?))
    }

    /// Content backend rooted at `data_dir`
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::new(LocalBackend::new(self.data_path().to_path_buf()))
    }

    /// Build a declared model with all of its mounts
    pub fn build_model(&self, name: &str, store: Arc<dyn DocumentStore>) -> ConfigResult<Model> {
        let mounts = self
            .models
            .get(name)
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))?;

        let mut model = Model::new(name, store, self.backend())?
            .with_store_dir(self.store_dir.as_str());
        for mount in mounts {
            if mount.multiple {
                model.mount_uploaders(&mount.field, mount.mount_options())?;
            } else {
                model.mount_uploader(&mount.field, mount.mount_options())?;
            }
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(temp_dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = temp_dir.path().join("aeroattach.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        let path = write_config(&temp_dir, json!({ "data_dir": data_dir.to_string_lossy() }));

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store_dir, "uploads");
        assert_eq!(config.log_level, "info");
        assert!(config.models.is_empty());
        assert_eq!(config.store_path(), data_dir.join("uploads"));
        assert_eq!(config.documents_path(), data_dir.join("documents"));
    }

    #[test]
    fn test_mount_defaults() {
        let mount: MountConfig = serde_json::from_value(json!({ "field": "file" })).unwrap();
        assert!(!mount.multiple);
        assert_eq!(mount.filename_strategy, "digest");
        assert_eq!(mount.filename, None);
        assert!(mount.mount_options().filename_strategy() == &FilenameStrategy::Digest);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let temp_dir = TempDir::new().unwrap();
        let cases = [
            json!({ "data_dir": "" }),
            json!({ "data_dir": "d", "store_dir": "../escape" }),
            json!({ "data_dir": "d", "store_dir": "documents" }),
            json!({ "data_dir": "d", "log_level": "loud" }),
            json!({ "data_dir": "d", "models": { "bad name": [] } }),
            json!({ "data_dir": "d", "models": { "m": [{ "field": "f", "filename_strategy": "random" }] } }),
            json!({ "data_dir": "d", "models": { "m": [{ "field": "f", "multiple": true, "filename": "x.txt" }] } }),
            json!({ "data_dir": "d", "models": { "m": [{ "field": "f", "max_file_size": 0 }] } }),
            json!({ "data_dir": "d", "models": { "m": [{ "field": "f" }, { "field": "f" }] } }),
        ];
        for case in cases {
            let path = write_config(&temp_dir, case.clone());
            assert!(
                matches!(Config::load(&path), Err(ConfigError::Invalid(_))),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_missing_file_and_bad_json() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.json");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Read { .. })));

        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_build_model_mounts_declared_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            json!({
                "data_dir": temp_dir.path().join("data").to_string_lossy(),
                "models": {
                    "posts": [
                        { "field": "cover", "allowed_extensions": ["png"] },
                        { "field": "files", "multiple": true }
                    ]
                }
            }),
        );
        let config = Config::load(&path).unwrap();
        let store = config.open_store().unwrap();

        let model = config.build_model("posts", store.clone()).unwrap();
        assert_eq!(model.mounted_fields(), vec!["cover", "files"]);
        assert_eq!(
            model.mount("cover").unwrap().uploader().pipeline().step_names(),
            vec!["allowed_extensions"]
        );
        assert!(matches!(
            config.build_model("comments", store),
            Err(ConfigError::UnknownModel(_))
        ));
    }
}
