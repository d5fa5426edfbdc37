//! Evidence/forecast composer
//!
//! Merges cohort evidence and window forecast per edge and day.
//! conditional_p branches apply only under explicit What-If activation.

mod compose;
mod errors;
mod latency;
mod whatif;

pub use compose::{ComposeRequest, DayComposition, EdgeComposer, EdgeComposition, ProbabilitySource};
pub use errors::{ComposeError, ComposeResult};
pub use latency::{LatencyConfig, LatencyModel, SIGMA_FLOOR};
pub use whatif::{activate_branches, BranchDecision, BranchStatus};
