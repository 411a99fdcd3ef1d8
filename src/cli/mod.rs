//! CLI module for aeroattach
//!
//! Provides command-line interface for:
//! - init: Create the data directory layout
//! - attach: Attach files to a record
//! - detach: Remove a field's files from a record
//! - show: Print records with their files
//! - destroy: Delete a record and its files

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{attach, destroy, detach, init, run, run_command, show};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
