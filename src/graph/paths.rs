//! Bounded simple-path enumeration
//!
//! Depth-first, successors visited in id order, so the enumeration order is
//! deterministic. Nodes that cannot reach the target are pruned before the
//! search starts. Every bound that cuts the search is reported; a partial
//! enumeration is never presented as complete.

use std::collections::BTreeSet;

use serde::Serialize;

use super::errors::GraphResult;
use super::model::Graph;
use crate::budget::SearchBudget;
use crate::dsl::NodeId;
use crate::observability::{log_event_with_fields, Event};

/// Ordered node sequence from source to target
pub type Path = Vec<NodeId>;

/// Which bound stopped the search first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// More paths existed than `max_paths`
    MaxPaths,
    /// Some branch was longer than `max_depth` edges
    MaxDepth,
    /// Node expansions exceeded `max_steps`
    StepBudget,
}

impl TruncationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TruncationReason::MaxPaths => "max_paths",
            TruncationReason::MaxDepth => "max_depth",
            TruncationReason::StepBudget => "step_budget",
        }
    }
}

/// Result of a bounded enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathEnumeration {
    pub paths: Vec<Path>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationReason>,
    pub steps: u64,
}

impl PathEnumeration {
    /// Paths other than `target`
    pub fn alternates<'a>(&'a self, target: &'a [NodeId]) -> impl Iterator<Item = &'a Path> {
        self.paths.iter().filter(move |p| p.as_slice() != target)
    }
}

struct Search<'a> {
    graph: &'a Graph,
    target: &'a str,
    can_reach: BTreeSet<NodeId>,
    budget: &'a SearchBudget,
    paths: Vec<Path>,
    stack: Path,
    on_stack: BTreeSet<NodeId>,
    steps: u64,
    truncation: Option<TruncationReason>,
}

impl<'a> Search<'a> {
    fn note(&mut self, reason: TruncationReason) {
        if self.truncation.is_none() {
            self.truncation = Some(reason);
        }
    }

    /// Returns false when the search must stop entirely
    fn visit(&mut self, node: &NodeId) -> bool {
        if self.steps >= self.budget.max_steps {
            self.note(TruncationReason::StepBudget);
            return false;
        }
        self.steps += 1;

        self.stack.push(node.clone());
        self.on_stack.insert(node.clone());

        let keep_going = if node == self.target {
            if self.paths.len() >= self.budget.max_paths {
                self.note(TruncationReason::MaxPaths);
                false
            } else {
                self.paths.push(self.stack.clone());
                true
            }
        } else if self.stack.len() > self.budget.max_depth {
            // Depth exhaustion only cuts this branch.
            self.note(TruncationReason::MaxDepth);
            true
        } else {
            let graph = self.graph;
            let next: Vec<NodeId> = graph
                .successors(node)
                .filter(|n| self.can_reach.contains(*n) && !self.on_stack.contains(*n))
                .cloned()
                .collect();
            next.iter().all(|n| self.visit(n))
        };

        self.on_stack.remove(node);
        self.stack.pop();
        keep_going
    }
}

/// Enumerates simple paths from `from` to `to` within `budget`.
///
/// `max_depth` counts edges. `from == to` yields the single path `[from]`.
pub fn enumerate_paths(
    graph: &Graph,
    from: &str,
    to: &str,
    budget: &SearchBudget,
) -> GraphResult<PathEnumeration> {
    graph.require_node(from)?;
    graph.require_node(to)?;

    let mut can_reach = graph.ancestors(to);
    can_reach.insert(to.to_string());

    let mut search = Search {
        graph,
        target: to,
        can_reach,
        budget,
        paths: Vec::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        steps: 0,
        truncation: None,
    };

    if search.can_reach.contains(from) {
        search.visit(&from.to_string());
    }

    let result = PathEnumeration {
        truncated: search.truncation.is_some(),
        truncation: search.truncation,
        paths: search.paths,
        steps: search.steps,
    };

    if let Some(reason) = result.truncation {
        log_event_with_fields(
            Event::PathsTruncated,
            &[
                ("from", from),
                ("to", to),
                ("reason", reason.as_str()),
                ("paths", &result.paths.len().to_string()),
            ],
        );
    }

    Ok(result)
}
