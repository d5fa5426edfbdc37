//! Denominator (n_query) resolution
//!
//! Computes the arrival-count baseline for an edge in cohort or window
//! mode. Construction errors are raised before any query runs.

mod errors;
mod resolver;

pub use errors::{DenominatorError, DenominatorResult};
pub use resolver::{DenominatorQuery, DenominatorRequest, DenominatorResolver};
