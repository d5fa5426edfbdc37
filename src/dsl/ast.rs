//! Structured constraint representation
//!
//! Every collection is ordered (`BTreeSet`/`BTreeMap`) so two constraints with
//! the same semantic content compare equal and serialize identically.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::canonical::canonicalize;
use super::dates::DateRange;
use super::errors::{DslError, DslResult};

/// Graph node identifier
pub type NodeId = String;

/// Retrieval mode of a query or slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceMode {
    /// Dates bound the anchor's entry day
    Cohort,
    /// Dates bound the from-node's own event day
    Window,
}

impl SliceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SliceMode::Cohort => "cohort",
            SliceMode::Window => "window",
        }
    }
}

impl fmt::Display for SliceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SliceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cohort" => Ok(SliceMode::Cohort),
            "window" => Ok(SliceMode::Window),
            other => Err(format!("unknown mode '{}', expected cohort or window", other)),
        }
    }
}

/// `cohort(anchor, range)` or `cohort(range)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortSpec {
    pub anchor: Option<NodeId>,
    pub range: DateRange,
}

/// Parsed, canonical form of a DSL string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub from: Option<NodeId>,
    pub to: Option<NodeId>,
    pub visited: BTreeSet<NodeId>,
    pub visited_any: BTreeSet<BTreeSet<NodeId>>,
    pub exclude: BTreeSet<NodeId>,
    pub context: BTreeMap<String, String>,
    pub context_any: BTreeMap<String, BTreeSet<String>>,
    pub case: BTreeMap<String, String>,
    pub cohort: Option<CohortSpec>,
    pub window: Option<DateRange>,
}

impl Constraint {
    /// Creates an empty constraint (matches every state)
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `from(from).to(to)`
    pub fn funnel(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            ..Self::default()
        }
    }

    pub fn with_visited(mut self, node: impl Into<NodeId>) -> Self {
        self.visited.insert(node.into());
        self
    }

    pub fn with_exclude(mut self, node: impl Into<NodeId>) -> Self {
        self.exclude.insert(node.into());
        self
    }

    pub fn with_visited_any<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        let group: BTreeSet<NodeId> = nodes.into_iter().map(Into::into).collect();
        if !group.is_empty() {
            self.visited_any.insert(group);
        }
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

    pub fn with_cohort(mut self, anchor: Option<NodeId>, range: DateRange) -> Self {
        self.cohort = Some(CohortSpec { anchor, range });
        self.window = None;
        self
    }

    pub fn with_window(mut self, range: DateRange) -> Self {
        self.window = Some(range);
        self.cohort = None;
        self
    }

    /// Returns true if no clause is present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Mode implied by the date clause, if any
    pub fn mode(&self) -> Option<SliceMode> {
        if self.cohort.is_some() {
            Some(SliceMode::Cohort)
        } else if self.window.is_some() {
            Some(SliceMode::Window)
        } else {
            None
        }
    }

    /// Names of clauses that scope a retrieval rather than describe user state
    pub fn query_scoped_clauses(&self) -> Vec<&'static str> {
        let mut clauses = Vec::new();
        if self.from.is_some() {
            clauses.push("from");
        }
        if self.to.is_some() {
            clauses.push("to");
        }
        if self.cohort.is_some() {
            clauses.push("cohort");
        }
        if self.window.is_some() {
            clauses.push("window");
        }
        clauses
    }

    /// Returns true if the constraint says anything about the traversed path
    pub fn has_path_clauses(&self) -> bool {
        !self.visited.is_empty() || !self.exclude.is_empty() || !self.visited_any.is_empty()
    }

    /// Only the visited/exclude/visitedAny clauses
    pub fn path_component(&self) -> Constraint {
        Constraint {
            visited: self.visited.clone(),
            visited_any: self.visited_any.clone(),
            exclude: self.exclude.clone(),
            ..Constraint::default()
        }
    }

    /// Only the context/contextAny/case clauses
    pub fn segment_component(&self) -> Constraint {
        Constraint {
            context: self.context.clone(),
            context_any: self.context_any.clone(),
            case: self.case.clone(),
            ..Constraint::default()
        }
    }

    /// Unions `other` into a copy of `self`.
    ///
    /// Set-valued clauses accumulate. Singular clauses and map keys must
    /// agree; a disagreement is a parse-level conflict.
    pub fn merge(&self, other: &Constraint) -> DslResult<Constraint> {
        let mut merged = self.clone();

        merged.from = merge_singular("from", &self.from, &other.from)?;
        merged.to = merge_singular("to", &self.to, &other.to)?;
        merged.cohort = merge_singular("cohort", &self.cohort, &other.cohort)?;
        merged.window = merge_singular("window", &self.window, &other.window)?;
        if merged.cohort.is_some() && merged.window.is_some() {
            return Err(DslError::parse(0, "cohort() and window() cannot be combined"));
        }

        merged.visited.extend(other.visited.iter().cloned());
        merged.exclude.extend(other.exclude.iter().cloned());
        merged.visited_any.extend(other.visited_any.iter().cloned());

        for (key, value) in &other.context {
            insert_unique("context", &mut merged.context, key, value)?;
        }
        for (key, value) in &other.case {
            insert_unique("case", &mut merged.case, key, value)?;
        }
        for (key, values) in &other.context_any {
            merged
                .context_any
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }

        Ok(merged)
    }

    /// Canonical DSL string
    pub fn canonical(&self) -> String {
        canonicalize(self)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", canonicalize(self))
    }
}

fn merge_singular<T: Clone + PartialEq>(
    clause: &str,
    left: &Option<T>,
    right: &Option<T>,
) -> DslResult<Option<T>> {
    match (left, right) {
        (Some(a), Some(b)) if a != b => Err(DslError::parse(
            0,
            format!("conflicting {}() clauses", clause),
        )),
        (Some(a), _) => Ok(Some(a.clone())),
        (None, b) => Ok(b.clone()),
    }
}

pub(crate) fn insert_unique(
    clause: &str,
    map: &mut BTreeMap<String, String>,
    key: &str,
    value: &str,
) -> DslResult<()> {
    match map.get(key) {
        Some(existing) if existing != value => Err(DslError::parse(
            0,
            format!(
                "conflicting {}() values for key '{}': '{}' and '{}'",
                clause, key, existing, value
            ),
        )),
        Some(_) => Ok(()),
        None => {
            map.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }
}
