//! n_query resolution
//!
//! Cohort mode counts users who entered at the anchor and reached the
//! edge's from-node: `from(anchor).to(from_node)`, with the anchor written
//! exactly once (the `cohort()` clause keeps only the date range).
//!
//! Window mode counts single-event arrivals at the from-node inside the
//! window. A window denominator is never anchor-prefixed; asking for one is
//! an error rather than a silently different query.

use serde::Serialize;

use super::errors::{DenominatorError, DenominatorResult};
use crate::dsl::{Constraint, DateRange, NodeId, SliceMode};

/// A constructed denominator query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenominatorQuery {
    /// Users entering at `anchor` who reached `from_node`
    AnchorFunnel {
        anchor: NodeId,
        from_node: NodeId,
        constraint: Constraint,
    },
    /// Arrivals at `node`
    Arrivals { node: NodeId, constraint: Constraint },
}

impl DenominatorQuery {
    pub fn constraint(&self) -> &Constraint {
        match self {
            DenominatorQuery::AnchorFunnel { constraint, .. }
            | DenominatorQuery::Arrivals { constraint, .. } => constraint,
        }
    }

    pub fn canonical(&self) -> String {
        self.constraint().canonical()
    }

    pub fn anchor(&self) -> Option<&str> {
        match self {
            DenominatorQuery::AnchorFunnel { anchor, .. } => Some(anchor),
            DenominatorQuery::Arrivals { .. } => None,
        }
    }
}

/// Inputs for resolving one edge's denominator
#[derive(Debug, Clone)]
pub struct DenominatorRequest<'a> {
    pub mode: SliceMode,
    /// The edge's from-node
    pub from_node: &'a str,
    /// The edge's (possibly MSMDC-augmented) query
    pub edge_query: &'a Constraint,
    /// The authored `n_query`, if any
    pub n_query: Option<&'a Constraint>,
    /// Anchor resolved from the graph
    pub resolved_anchor: Option<&'a str>,
}

/// Builds cohort and window denominators
pub struct DenominatorResolver;

impl DenominatorResolver {
    /// Cohort denominator: `from(anchor).to(from_node)` plus `extra` clauses
    pub fn cohort(
        anchor: Option<&str>,
        from_node: &str,
        extra: &Constraint,
        range: Option<DateRange>,
    ) -> DenominatorResult<DenominatorQuery> {
        let anchor = anchor.ok_or_else(|| DenominatorError::MissingAnchor {
            node: from_node.to_string(),
        })?;

        let mut constraint = without_scope(extra);
        if let Some(range) = range {
            constraint = constraint.with_cohort(None, range);
        }

        if anchor == from_node {
            // Entering at the from-node: the cohort is its own arrivals.
            constraint.to = Some(from_node.to_string());
            return Ok(DenominatorQuery::Arrivals {
                node: from_node.to_string(),
                constraint,
            });
        }

        constraint.from = Some(anchor.to_string());
        constraint.to = Some(from_node.to_string());
        Ok(DenominatorQuery::AnchorFunnel {
            anchor: anchor.to_string(),
            from_node: from_node.to_string(),
            constraint,
        })
    }

    /// Window denominator: arrivals at `from_node`; anchoring is rejected
    pub fn window(
        anchor: Option<&str>,
        from_node: &str,
        extra: &Constraint,
        range: Option<DateRange>,
    ) -> DenominatorResult<DenominatorQuery> {
        if let Some(anchor) = anchor {
            return Err(DenominatorError::AnchoredWindow {
                anchor: anchor.to_string(),
                node: from_node.to_string(),
            });
        }

        let mut constraint = without_scope(extra);
        if let Some(range) = range {
            constraint = constraint.with_window(range);
        }
        constraint.to = Some(from_node.to_string());
        Ok(DenominatorQuery::Arrivals {
            node: from_node.to_string(),
            constraint,
        })
    }

    /// Resolves an edge's denominator for the requested mode.
    ///
    /// The edge query contributes its segment clauses (context, case) and
    /// date range; an authored `n_query` contributes its path clauses and
    /// may pin the anchor (cohort) or the arrival node (window).
    pub fn resolve(request: &DenominatorRequest<'_>) -> DenominatorResult<DenominatorQuery> {
        let query = request.edge_query;
        if let Some(found) = query.mode() {
            if found != request.mode {
                return Err(DenominatorError::ModeMismatch {
                    expected: request.mode,
                    found,
                });
            }
        }

        let mut extra = query.segment_component();
        let mut n_query_from: Option<&str> = None;
        if let Some(n_query) = request.n_query {
            check_n_query(request, n_query)?;
            n_query_from = n_query.from.as_deref();
            extra = extra
                .merge(&without_scope(n_query))
                .map_err(|e| DenominatorError::InvalidNQuery(e.to_string()))?;
        }

        match request.mode {
            SliceMode::Cohort => {
                let range = query.cohort.as_ref().map(|c| c.range);
                let query_anchor = query.cohort.as_ref().and_then(|c| c.anchor.as_deref());
                let mut anchor = None;
                for candidate in [query_anchor, request.resolved_anchor, n_query_from]
                    .into_iter()
                    .flatten()
                {
                    match anchor {
                        None => anchor = Some(candidate),
                        Some(existing) if existing != candidate => {
                            return Err(DenominatorError::AnchorConflict {
                                first: existing.to_string(),
                                second: candidate.to_string(),
                            })
                        }
                        Some(_) => {}
                    }
                }
                Self::cohort(anchor, request.from_node, &extra, range)
            }
            SliceMode::Window => {
                Self::window(None, request.from_node, &extra, query.window)
            }
        }
    }
}

/// Drops from/to/cohort/window, keeping state clauses only
fn without_scope(constraint: &Constraint) -> Constraint {
    Constraint {
        from: None,
        to: None,
        cohort: None,
        window: None,
        ..constraint.clone()
    }
}

fn check_n_query(request: &DenominatorRequest<'_>, n_query: &Constraint) -> DenominatorResult<()> {
    if let Some(to) = &n_query.to {
        if to != request.from_node {
            return Err(DenominatorError::InvalidNQuery(format!(
                "to({}) must name the edge's from-node '{}'",
                to, request.from_node
            )));
        }
    }
    match request.mode {
        SliceMode::Window => {
            if n_query.cohort.is_some() {
                return Err(DenominatorError::InvalidNQuery(
                    "cohort() in a window-mode n_query".into(),
                ));
            }
            if let Some(from) = &n_query.from {
                if from != request.from_node {
                    return Err(DenominatorError::AnchoredWindow {
                        anchor: from.clone(),
                        node: request.from_node.to_string(),
                    });
                }
            }
        }
        SliceMode::Cohort => {
            if n_query.window.is_some() {
                return Err(DenominatorError::InvalidNQuery(
                    "window() in a cohort-mode n_query".into(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    #[test]
    fn test_cohort_is_anchor_prefixed() {
        let q = DenominatorResolver::cohort(Some("A"), "X", &Constraint::new(), None).unwrap();
        assert_eq!(q.canonical(), "from(A).to(X)");
        assert_eq!(q.anchor(), Some("A"));
    }

    #[test]
    fn test_cohort_without_anchor_rejected() {
        let err = DenominatorResolver::cohort(None, "X", &Constraint::new(), None).unwrap_err();
        assert_eq!(err.code(), "DQ_DENOMINATOR_CONSTRUCTION");
    }

    #[test]
    fn test_window_never_anchored() {
        let q = DenominatorResolver::window(None, "X", &Constraint::new(), None).unwrap();
        assert_eq!(q.canonical(), "to(X)");
        assert!(q.anchor().is_none());

        let err = DenominatorResolver::window(Some("A"), "X", &Constraint::new(), None).unwrap_err();
        assert!(matches!(err, DenominatorError::AnchoredWindow { .. }));
    }

    #[test]
    fn test_anchor_written_once() {
        let edge = parse("from(X).to(Y).cohort(A,1-Jan-25:31-Jan-25)").unwrap();
        let q = DenominatorResolver::resolve(&DenominatorRequest {
            mode: SliceMode::Cohort,
            from_node: "X",
            edge_query: &edge,
            n_query: None,
            resolved_anchor: Some("A"),
        })
        .unwrap();
        assert_eq!(q.canonical(), "from(A).to(X).cohort(1-Jan-25:31-Jan-25)");
    }

    #[test]
    fn test_anchor_conflict() {
        let edge = parse("from(X).to(Y).cohort(A,-30d:)").unwrap();
        let err = DenominatorResolver::resolve(&DenominatorRequest {
            mode: SliceMode::Cohort,
            from_node: "X",
            edge_query: &edge,
            n_query: None,
            resolved_anchor: Some("B"),
        })
        .unwrap_err();
        assert!(matches!(err, DenominatorError::AnchorConflict { .. }));
    }

    #[test]
    fn test_window_keeps_segments() {
        let edge = parse("from(X).to(Y).context(channel:google).window(-7d:)").unwrap();
        let q = DenominatorResolver::resolve(&DenominatorRequest {
            mode: SliceMode::Window,
            from_node: "X",
            edge_query: &edge,
            n_query: None,
            resolved_anchor: Some("A"),
        })
        .unwrap();
        assert_eq!(q.canonical(), "to(X).context(channel:google).window(-7d:)");
    }

    #[test]
    fn test_anchored_window_n_query_rejected() {
        let edge = parse("from(X).to(Y)").unwrap();
        let n_query = parse("from(A).to(X)").unwrap();
        let err = DenominatorResolver::resolve(&DenominatorRequest {
            mode: SliceMode::Window,
            from_node: "X",
            edge_query: &edge,
            n_query: Some(&n_query),
            resolved_anchor: None,
        })
        .unwrap_err();
        assert!(matches!(err, DenominatorError::AnchoredWindow { .. }));
    }

    #[test]
    fn test_mode_mismatch() {
        let edge = parse("from(X).to(Y).window(-7d:)").unwrap();
        let err = DenominatorResolver::resolve(&DenominatorRequest {
            mode: SliceMode::Cohort,
            from_node: "X",
            edge_query: &edge,
            n_query: None,
            resolved_anchor: Some("A"),
        })
        .unwrap_err();
        assert!(matches!(err, DenominatorError::ModeMismatch { .. }));
    }

    #[test]
    fn test_entry_node_degenerates_to_arrivals() {
        let q = DenominatorResolver::cohort(Some("X"), "X", &Constraint::new(), None).unwrap();
        assert_eq!(q.canonical(), "to(X)");
    }
}
