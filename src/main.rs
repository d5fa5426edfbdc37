//! dagquery CLI entry point
//!
//! This is a minimal entrypoint that:
//! 1. Delegates argument parsing and dispatch to `cli::run`
//! 2. Prints fatal errors to stderr
//! 3. Exits with non-zero on failure
//!
//! All logic lives in the CLI module.

use dagquery::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
