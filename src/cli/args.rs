//! CLI argument definitions using clap
//!
//! Commands:
//! - dagquery parse <query>
//! - dagquery paths --graph <path> --from <node> --to <node>
//! - dagquery plan --config <path> --graph <path> --edge <id> --connection <name>
//! - dagquery ingest --config <path> --param <id> --mode <mode> (response on stdin)
//! - dagquery select --config <path> --param <id> --mode <mode>
//! - dagquery compose --config <path> --graph <path> --edge <id>

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::dsl::SliceMode;

/// dagquery - constraint queries and evidence for conversion DAGs
#[derive(Parser, Debug)]
#[command(name = "dagquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Cohort,
    Window,
}

impl From<ModeArg> for SliceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Cohort => SliceMode::Cohort,
            ModeArg::Window => SliceMode::Window,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a constraint and print its canonical form
    Parse {
        /// Constraint DSL text
        query: String,
    },

    /// Enumerate simple paths between two nodes
    Paths {
        /// Graph document (JSON)
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Configuration file supplying the search budget
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Plan an edge's query for a connection
    Plan {
        /// Path to configuration file
        #[arg(long, default_value = "./dagquery.json")]
        config: PathBuf,

        /// Graph document (JSON)
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        edge: String,

        #[arg(long)]
        connection: String,

        /// Build the denominator for this mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Print explain output instead of the plan
        #[arg(long)]
        explain: bool,

        /// Write the annotated graph document here
        #[arg(long)]
        annotate: Option<PathBuf>,
    },

    /// Store a connector response read from stdin
    Ingest {
        /// Path to configuration file
        #[arg(long, default_value = "./dagquery.json")]
        config: PathBuf,

        #[arg(long)]
        param: String,

        #[arg(long, value_enum)]
        mode: ModeArg,

        /// Slice key, e.g. "context(channel:google)"
        #[arg(long, default_value = "")]
        slice: String,
    },

    /// Select the reconciled series for a parameter
    Select {
        /// Path to configuration file
        #[arg(long, default_value = "./dagquery.json")]
        config: PathBuf,

        #[arg(long)]
        param: String,

        #[arg(long, value_enum)]
        mode: ModeArg,

        #[arg(long, default_value = "")]
        slice: String,
    },

    /// Compose evidence and forecast for an edge
    Compose {
        /// Path to configuration file
        #[arg(long, default_value = "./dagquery.json")]
        config: PathBuf,

        /// Graph document (JSON)
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        edge: String,

        #[arg(long, default_value = "")]
        slice: String,

        /// Measure ages to this date (YYYY-MM-DD, default today)
        #[arg(long)]
        as_of: Option<String>,

        /// Asserted constraints for conditional_p activation
        #[arg(long)]
        what_if: Option<String>,
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
    fn test_parse_plan_args() {
        let cli = Cli::try_parse_from([
            "dagquery",
            "plan",
            "--graph",
            "g.json",
            "--edge",
            "a-b",
            "--connection",
            "amp",
            "--mode",
            "cohort",
        ])
        .unwrap();
        match cli.command {
            Command::Plan { mode, explain, config, .. } => {
                assert_eq!(mode, Some(ModeArg::Cohort));
                assert!(!explain);
                assert_eq!(config, PathBuf::from("./dagquery.json"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mode_is_required_for_ingest() {
        assert!(Cli::try_parse_from(["dagquery", "ingest", "--param", "p"]).is_err());
    }
}
