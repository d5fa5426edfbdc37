//! Edge query planning
//!
//! Ties the pipeline together for one edge: parse, enumerate, discriminate,
//! compile, resolve the denominator, annotate.
//!
//! # Design Principles
//!
//! - Deterministic: same graph, edge and capability → same plan
//! - Bounded: enumeration and MSMDC run under the request's budget
//! - Explicit: ambiguity and truncation surface as plan warnings

mod explain;
mod planner;

pub use explain::ExplainPlan;
pub use planner::{EdgePlan, EdgeQueryPlanner, PlanWarning, PATHS_TRUNCATED_CODE};
