//! Constraint DSL
//!
//! The textual constraint language is the only interchange format between
//! graph documents, callers and the engine.
//!
//! # Guarantees
//!
//! - Parsing never drops content: malformed input is a `DslError`
//! - Canonical output is deterministic and usable as a cache key
//! - `parse(canonicalize(parse(s))) == parse(s)` for every valid `s`
//! - Evaluation of unsupported constructs is an explicit diagnostic

mod ast;
mod canonical;
mod dates;
mod errors;
mod evaluator;
mod memo;
mod parser;

pub use ast::{CohortSpec, Constraint, NodeId, SliceMode};
pub use canonical::canonicalize;
pub use dates::{DateBound, DateRange, OffsetUnit};
pub use errors::{DslError, DslResult};
pub use evaluator::{entails, evaluate, matches_path, EvalState};
pub use memo::QueryMemo;
pub use parser::parse;
