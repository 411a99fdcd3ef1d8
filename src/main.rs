//! aeroattach CLI entry point
//!
//! This is a minimal entrypoint that:
//! 1. Parses CLI arguments and dispatches commands (via cli::run)
//! 2. Writes errors as a JSON error response
//! 3. Exits with non-zero on failure
//!
//! All logic is delegated to the CLI module.

use aeroattach::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(e.code_str(), e.message()).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}
