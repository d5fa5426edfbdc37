//! CLI module for dagquery
//!
//! Provides command-line interface for:
//! - parse: Canonicalize a constraint
//! - paths: Bounded path enumeration
//! - plan: Edge query planning (JSON or explain output)
//! - ingest: Store a connector response
//! - select: Reconciled slice series
//! - compose: Evidence/forecast for an edge

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, ModeArg};
pub use commands::{compose, ingest, parse, paths, plan, run, run_command, select};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_envelope, ok_envelope, read_request, write_error, write_response};
