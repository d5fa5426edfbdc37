//! What-If activation of conditional_p branches
//!
//! Branches never apply by default. A branch becomes active only when the
//! analysis request asserts constraints that entail its condition; the
//! first entailed branch in declared order wins. A condition containing a
//! construct that cannot be judged is reported, never treated as a silent
//! non-match.

use serde::Serialize;

use crate::dsl::{entails, Constraint};
use crate::graph::Edge;
use crate::observability::{log_event_with_fields, Event};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchStatus {
    /// Entailed and applied
    Active,
    /// Entailed, but an earlier branch is already active
    Shadowed,
    Inactive,
    Unsupported { code: &'static str, diagnostic: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchDecision {
    pub index: usize,
    pub condition: String,
    pub p: f64,
    #[serde(flatten)]
    pub status: BranchStatus,
}

impl BranchDecision {
    pub fn is_active(&self) -> bool {
        self.status == BranchStatus::Active
    }
}

/// Judges every branch of `edge` against the asserted What-If constraints.
///
/// With no assertion every supported branch is inactive.
pub fn activate_branches(edge: &Edge, what_if: Option<&Constraint>) -> Vec<BranchDecision> {
    let none = Constraint::new();
    let asserted = what_if.unwrap_or(&none);
    let mut active_seen = false;

    edge.conditional_p
        .iter()
        .enumerate()
        .map(|(index, branch)| {
            let condition = branch.condition.canonical().to_string();
            let status = match entails(asserted, branch.condition.constraint()) {
                Err(err) => {
                    log_event_with_fields(
                        Event::BranchUnsupported,
                        &[
                            ("edge", edge.id.as_str()),
                            ("branch", index.to_string().as_str()),
                            ("condition", condition.as_str()),
                            ("diagnostic", err.to_string().as_str()),
                        ],
                    );
                    BranchStatus::Unsupported {
                        code: err.code(),
                        diagnostic: err.to_string(),
                    }
                }
                Ok(true) if what_if.is_some() => {
                    if active_seen {
                        BranchStatus::Shadowed
                    } else {
                        active_seen = true;
                        log_event_with_fields(
                            Event::BranchActivated,
                            &[
                                ("edge", edge.id.as_str()),
                                ("branch", index.to_string().as_str()),
                                ("condition", condition.as_str()),
                            ],
                        );
                        BranchStatus::Active
                    }
                }
                Ok(_) => BranchStatus::Inactive,
            };
            BranchDecision {
                index,
                condition,
                p: branch.p,
                status,
            }
        })
        .collect()
}
