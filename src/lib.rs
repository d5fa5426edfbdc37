//! dagquery - constraint queries and evidence for conversion DAGs
//!
//! Parses constraint DSL strings, isolates one path among alternates with a
//! minimal discriminating constraint set, compiles provider queries under a
//! connection's capabilities, and reconciles cached per-day slices into
//! evidence and forecast probabilities per edge.

pub mod budget;
pub mod cli;
pub mod compiler;
pub mod composer;
pub mod config;
pub mod context;
pub mod denominator;
pub mod dsl;
pub mod error;
pub mod graph;
pub mod msmdc;
pub mod observability;
pub mod planning;
pub mod slices;

pub use error::{EngineError, EngineResult};
