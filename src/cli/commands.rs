//! CLI command implementations
//!
//! Every command loads the config, opens the declared model and returns
//! the JSON `data` of its response. `run_command` writes that response.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::attachment::{AttachmentError, Changeset, CollectionItem, Model, MountKind};
use crate::config::Config;
use crate::document::Document;
use crate::uploader::UploadContent;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command and write its response
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Init { config } => init(&config)?,
        Command::Attach {
            config,
            model,
            field,
            id,
            set,
            files,
        } => attach(&config, &model, &field, id.as_deref(), &set, &files)?,
        Command::Detach {
            config,
            model,
            field,
            id,
        } => detach(&config, &model, &field, &id)?,
        Command::Show { config, model, id } => show(&config, &model, id.as_deref())?,
        Command::Destroy { config, model, id } => destroy(&config, &model, &id)?,
    };
    write_response(data)
}

/// Initialize a new data directory
///
/// Creates the document and content directories. Refuses to run twice.
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = Config::load(config_path)?;

    if is_initialized(&config) {
        return Err(CliError::already_initialized());
    }

    for dir in [config.documents_path(), config.store_path()] {
        fs::create_dir_all(&dir).map_err(|e| {
            CliError::config_error(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }

    Ok(json!({
        "initialized": true,
        "data_dir": config.data_dir,
        "models": config.model_names(),
    }))
}

/// Attach files to a record
///
/// Without an id a new record is created. A collection field keeps its
/// current files and appends the new ones.
pub fn attach(
    config_path: &Path,
    model_name: &str,
    field: &str,
    id: Option<&str>,
    set: &[String],
    files: &[PathBuf],
) -> CliResult<Value> {
    let model = open_model(config_path, model_name)?;
    let kind = model.mount(field)?.kind();

    let contents = files
        .iter()
        .map(UploadContent::from_path)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AttachmentError::from)?;

    let mut doc = match id {
        Some(id) => model.find(&parse_uuid(id)?)?,
        None => model.build()?,
    };

    let mut changes = Changeset::new();
    for assignment in set {
        let (key, value) = parse_assignment(assignment)?;
        changes = changes.set(key, value);
    }

    changes = match kind {
        MountKind::Single => {
            let [content]: [UploadContent; 1] = contents.try_into().map_err(|_| {
                CliError::invalid_argument(format!("Field '{}' takes exactly one file", field))
            })?;
            changes.attach(field, content)
        }
        MountKind::Multiple => {
            let existing = doc
                .attachment(field)
                .map(|a| a.identifiers().into_iter().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            let items = existing
                .into_iter()
                .map(CollectionItem::Existing)
                .chain(contents.into_iter().map(CollectionItem::Upload));
            changes.attach_many(field, items)
        }
    };

    model.update(&mut doc, changes)?;
    Ok(record_json(&doc))
}

/// Remove a field's files from a record
pub fn detach(config_path: &Path, model_name: &str, field: &str, id: &str) -> CliResult<Value> {
    let model = open_model(config_path, model_name)?;
    let mut doc = model.find(&parse_uuid(id)?)?;
    model.purge_attachment(&mut doc, field)?;
    Ok(record_json(&doc))
}

/// Show one record, or all records of a model
pub fn show(config_path: &Path, model_name: &str, id: Option<&str>) -> CliResult<Value> {
    let model = open_model(config_path, model_name)?;
    match id {
        Some(id) => Ok(record_json(&model.find(&parse_uuid(id)?)?)),
        None => Ok(Value::Array(model.all()?.iter().map(record_json).collect())),
    }
}

/// Delete a record and its files
pub fn destroy(config_path: &Path, model_name: &str, id: &str) -> CliResult<Value> {
    let model = open_model(config_path, model_name)?;
    let mut doc = model.find(&parse_uuid(id)?)?;
    model.destroy(&mut doc)?;
    Ok(json!({ "destroyed": doc.id().to_string() }))
}

fn open_model(config_path: &Path, model_name: &str) -> CliResult<Model> {
    let config = Config::load(config_path)?;
    if !is_initialized(&config) {
        return Err(CliError::not_initialized());
    }
    let store = config.open_store()?;
    Ok(config.build_model(model_name, store)?)
}

/// Check if a data directory is initialized
fn is_initialized(config: &Config) -> bool {
    config.documents_path().is_dir() && config.store_path().is_dir()
}

fn parse_uuid(s: &str) -> CliResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| CliError::invalid_argument(format!("Invalid UUID '{}': {}", s, e)))
}

/// `key=value`; the value is read as JSON when it parses, else as a string
fn parse_assignment(assignment: &str) -> CliResult<(String, Value)> {
    let (key, raw) = assignment
        .split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .ok_or_else(|| {
            CliError::invalid_argument(format!("Expected KEY=VALUE, got '{}'", assignment))
        })?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}

fn record_json(doc: &Document) -> Value {
    let mut attachments = Map::new();
    for name in doc.attachment_names() {
        let Some(attachment) = doc.attachment(name) else {
            continue;
        };
        let files: Vec<Value> = attachment
            .files()
            .into_iter()
            .map(|file| {
                json!({
                    "identifier": file.identifier().as_str(),
                    "path": file.path().to_string_lossy(),
                    "size": file.size().ok(),
                })
            })
            .collect();
        attachments.insert(name.to_string(), Value::Array(files));
    }

    json!({
        "id": doc.id().to_string(),
        "created_at": doc.created_at().to_rfc3339(),
        "updated_at": doc.updated_at().to_rfc3339(),
        "attributes": Value::Object(doc.attributes().clone()),
        "attachments": attachments,
    })
}
