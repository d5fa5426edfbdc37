//! Constraint evaluation
//!
//! Two questions are answered here:
//! - `evaluate`: does a concrete user state satisfy a condition?
//! - `entails`: do asserted constraints guarantee a condition? (What-If)
//!
//! Conditions describe user state only. `from`, `to`, `cohort` and `window`
//! scope a retrieval and are rejected with an explicit diagnostic instead of
//! being evaluated to a silent `false`.

use std::collections::{BTreeMap, BTreeSet};

use super::ast::{Constraint, NodeId};
use super::errors::{DslError, DslResult};

/// Observed state of one user (or one path)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalState {
    pub visited: BTreeSet<NodeId>,
    pub context: BTreeMap<String, String>,
    pub case: BTreeMap<String, String>,
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a user who walked exactly this path
    pub fn from_path(path: &[NodeId]) -> Self {
        Self {
            visited: path.iter().cloned().collect(),
            ..Self::default()
        }
    }

    pub fn with_visited(mut self, node: impl Into<NodeId>) -> Self {
        self.visited.insert(node.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_case(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.case.insert(key.into(), value.into());
        self
    }
}

fn reject_query_scope(condition: &Constraint) -> DslResult<()> {
    match condition.query_scoped_clauses().first() {
        Some(clause) => Err(DslError::unsupported(format!("{}()", clause))),
        None => Ok(()),
    }
}

/// Evaluates a condition against a user state
pub fn evaluate(condition: &Constraint, state: &EvalState) -> DslResult<bool> {
    reject_query_scope(condition)?;
    Ok(path_clauses_hold(condition, &state.visited) && segment_clauses_hold(condition, state))
}

/// Returns true if the visited/exclude/visitedAny clauses hold for a path.
///
/// Context, case and query-scoped clauses are ignored: a path carries no
/// segment information.
pub fn matches_path(constraint: &Constraint, path: &[NodeId]) -> bool {
    let visited: BTreeSet<NodeId> = path.iter().cloned().collect();
    path_clauses_hold(constraint, &visited)
}

fn path_clauses_hold(c: &Constraint, visited: &BTreeSet<NodeId>) -> bool {
    c.visited.iter().all(|n| visited.contains(n))
        && !c.exclude.iter().any(|n| visited.contains(n))
        && c
            .visited_any
            .iter()
            .all(|group| group.iter().any(|n| visited.contains(n)))
}

fn segment_clauses_hold(c: &Constraint, state: &EvalState) -> bool {
    c.context
        .iter()
        .all(|(k, v)| state.context.get(k) == Some(v))
        && c.context_any
            .iter()
            .all(|(k, values)| state.context.get(k).map_or(false, |v| values.contains(v)))
        && c.case.iter().all(|(k, v)| state.case.get(k) == Some(v))
}

/// Returns true if `asserted` guarantees `condition` for every user it admits.
///
/// - visited: every required node is asserted visited
/// - exclude: every excluded node is asserted excluded
/// - visitedAny: an asserted visit lies in the group, or an asserted group is a subset
/// - context/contextAny/case: asserted values match exactly (or fall in the set)
pub fn entails(asserted: &Constraint, condition: &Constraint) -> DslResult<bool> {
    reject_query_scope(condition)?;

    let visited = condition.visited.is_subset(&asserted.visited);
    let excluded = condition.exclude.is_subset(&asserted.exclude);

    let visited_any = condition.visited_any.iter().all(|group| {
        !group.is_disjoint(&asserted.visited)
            || asserted.visited_any.iter().any(|g| g.is_subset(group))
    });

    let context = condition
        .context
        .iter()
        .all(|(k, v)| asserted.context.get(k) == Some(v));

    let context_any = condition.context_any.iter().all(|(k, values)| {
        asserted.context.get(k).map_or(false, |v| values.contains(v))
            || asserted
                .context_any
                .get(k)
                .map_or(false, |asserted_values| asserted_values.is_subset(values))
    });

    let case = condition
        .case
        .iter()
        .all(|(k, v)| asserted.case.get(k) == Some(v));

    Ok(visited && excluded && visited_any && context && context_any && case)
}
