//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroattach init --config <path>
//! - aeroattach attach --config <path> --model <name> --field <field> [--id <uuid>] <files>...
//! - aeroattach detach --config <path> --model <name> --field <field> --id <uuid>
//! - aeroattach show --config <path> --model <name> [--id <uuid>]
//! - aeroattach destroy --config <path> --model <name> --id <uuid>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aeroattach - file attachments for JSON documents
#[derive(Parser, Debug)]
#[command(name = "aeroattach")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroattach.json")]
        config: PathBuf,
    },

    /// Attach files to a record, creating the record if no id is given
    Attach {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroattach.json")]
        config: PathBuf,

        /// Model (collection) name
        #[arg(long)]
        model: String,

        /// Mounted field to attach to
        #[arg(long)]
        field: String,

        /// Record id; omitted to create a new record
        #[arg(long)]
        id: Option<String>,

        /// Plain attributes to set, as key=value
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Files to attach; a single-file field takes exactly one
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove a field's files from a record
    Detach {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroattach.json")]
        config: PathBuf,

        #[arg(long)]
        model: String,

        #[arg(long)]
        field: String,

        #[arg(long)]
        id: String,
    },

    /// Show one record, or every record of a model
    Show {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroattach.json")]
        config: PathBuf,

        #[arg(long)]
        model: String,

        #[arg(long)]
        id: Option<String>,
    },

    /// Delete a record and its files
    Destroy {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroattach.json")]
        config: PathBuf,

        #[arg(long)]
        model: String,

        #[arg(long)]
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attach() {
        let cli = Cli::try_parse_from([
            "aeroattach",
            "attach",
            "--model",
            "posts",
            "--field",
            "files",
            "--set",
            "title=hello",
            "a.txt",
            "b.txt",
        ])
        .unwrap();

        match cli.command {
            Command::Attach {
                config,
                model,
                field,
                id,
                set,
                files,
            } => {
                assert_eq!(config, PathBuf::from("./aeroattach.json"));
                assert_eq!(model, "posts");
                assert_eq!(field, "files");
                assert_eq!(id, None);
                assert_eq!(set, vec!["title=hello"]);
                assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_attach_requires_files() {
        let result = Cli::try_parse_from(["aeroattach", "attach", "--model", "m", "--field", "f"]);
        assert!(result.is_err());
    }
}
