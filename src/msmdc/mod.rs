//! Minimal discriminating constraint (MSMDC) solving
//!
//! Given a target path and the alternate paths between the same endpoints,
//! derive the smallest practical set of `visited`/`exclude` literals that
//! keeps the target valid and invalidates every alternate.

mod errors;
mod literal;
mod solver;

pub use errors::{MsmdcError, MsmdcResult, AMBIGUOUS_PATH_CODE};
pub use literal::Literal;
pub use solver::{AmbiguityReason, MsmdcOutcome, MsmdcSolver, MsmdcStatus};
