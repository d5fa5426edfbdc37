//! Capability-aware constraint compilation
//!
//! Translates a canonical constraint into a `ProviderQuery` for one
//! connection without changing what it counts:
//! - funnel steps follow the graph's topological order
//! - `visited`/`visitedAny` between `from` and `to` become (any-of) steps
//! - `visited`/`exclude` upstream of `from` become lookback segment
//!   filters, recorded as approximations
//! - an in-funnel `exclude` becomes a segment filter when the provider
//!   excludes natively, else inclusion-exclusion terms over every subset
//! - an `exclude` on no from→to path is already satisfied and dropped
//!
//! Anything the provider cannot express is an error, never a silent drop.

use std::collections::BTreeSet;

use super::capability::CapabilityDescriptor;
use super::errors::{CompileError, CompileResult};
use super::query::{
    Approximation, FunnelStep, FunnelTerm, PropertyFilter, ProviderQuery, SegmentFilter, TermSign,
};
use crate::dsl::{Constraint, NodeId};
use crate::graph::Graph;
use crate::observability::{log_event_with_fields, Event};

/// Largest exclude set expanded by inclusion-exclusion (2^6 - 1 extra terms)
pub const MAX_ARITHMETIC_EXCLUSIONS: usize = 6;

/// Default rolling lookback for upstream clauses
pub const DEFAULT_UPSTREAM_LOOKBACK_DAYS: u32 = 30;

/// Where a node sits relative to the funnel `from → to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Endpoint,
    Upstream,
    InFunnel,
    Downstream,
    OffPath,
}

/// Compiles constraints for one connection over one graph
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    graph: &'a Graph,
    capability: &'a CapabilityDescriptor,
    upstream_lookback_days: u32,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(graph: &'a Graph, capability: &'a CapabilityDescriptor) -> Self {
        Self {
            graph,
            capability,
            upstream_lookback_days: DEFAULT_UPSTREAM_LOOKBACK_DAYS,
        }
    }

    pub fn with_upstream_lookback(mut self, days: u32) -> Self {
        self.upstream_lookback_days = days;
        self
    }

    fn place(&self, node: &str, from: &str, to: &str) -> Placement {
        if node == from || node == to {
            Placement::Endpoint
        } else if self.graph.is_upstream(node, from) {
            Placement::Upstream
        } else if self.graph.reaches(from, node) && self.graph.reaches(node, to) {
            Placement::InFunnel
        } else if self.graph.is_upstream(to, node) {
            Placement::Downstream
        } else {
            Placement::OffPath
        }
    }

    fn rank(&self, node: &str) -> usize {
        self.graph.topo_rank(node).unwrap_or(usize::MAX)
    }

    fn check_nodes(&self, constraint: &Constraint) -> CompileResult<()> {
        let anchor = constraint.cohort.as_ref().and_then(|c| c.anchor.as_ref());
        let nodes = constraint
            .from
            .iter()
            .chain(constraint.to.iter())
            .chain(constraint.visited.iter())
            .chain(constraint.exclude.iter())
            .chain(constraint.visited_any.iter().flatten())
            .chain(anchor);
        for node in nodes {
            if !self.graph.contains_node(node) {
                return Err(CompileError::UnknownNode(node.clone()));
            }
        }
        Ok(())
    }

    /// Compiles one constraint
    pub fn compile(&self, constraint: &Constraint) -> CompileResult<ProviderQuery> {
        let (from, to) = match (&constraint.from, &constraint.to) {
            (Some(from), Some(to)) => (from.as_str(), to.as_str()),
            _ => {
                return Err(CompileError::InvalidConstraint(
                    "a provider query needs both from() and to()".into(),
                ))
            }
        };
        self.check_nodes(constraint)?;
        if !self.graph.reaches(from, to) {
            return Err(CompileError::InvalidConstraint(format!(
                "no path from '{}' to '{}'",
                from, to
            )));
        }

        let provider = self.capability.provider_type();
        if !provider.executes_funnels() && constraint.has_path_clauses() {
            return Err(CompileError::UnsupportedByProvider {
                provider: provider.as_str(),
                construct: "path constraints (visited/visitedAny/exclude)".into(),
            });
        }

        let lookback = self.upstream_lookback_days;
        let mut ranked_steps: Vec<(usize, FunnelStep)> = vec![
            (self.rank(from), FunnelStep::event(from)),
            (self.rank(to), FunnelStep::event(to)),
        ];
        let mut segments = Vec::new();
        let mut approximations = Vec::new();

        for node in &constraint.visited {
            match self.place(node, from, to) {
                Placement::Endpoint => {}
                Placement::InFunnel => ranked_steps.push((self.rank(node), FunnelStep::event(node))),
                Placement::Upstream => {
                    segments.push(SegmentFilter::PerformedWithin {
                        node: node.clone(),
                        lookback_days: lookback,
                    });
                    approximations.push(Approximation::UpstreamLookback {
                        node: node.clone(),
                        lookback_days: lookback,
                    });
                }
                Placement::Downstream => {
                    return Err(CompileError::InvalidConstraint(format!(
                        "visited({}) is downstream of to({})",
                        node, to
                    )))
                }
                Placement::OffPath => {
                    return Err(CompileError::InvalidConstraint(format!(
                        "visited({}) lies on no path from '{}' to '{}'",
                        node, from, to
                    )))
                }
            }
        }

        for group in &constraint.visited_any {
            self.compile_any_group(
                group,
                constraint,
                from,
                to,
                &mut ranked_steps,
                &mut segments,
                &mut approximations,
            )?;
        }

        let mut arithmetic: Vec<&NodeId> = Vec::new();
        for node in &constraint.exclude {
            if constraint.visited.contains(node) {
                return Err(CompileError::InvalidConstraint(format!(
                    "'{}' is both visited and excluded",
                    node
                )));
            }
            let placement = self.place(node, from, to);
            match placement {
                Placement::Endpoint => {
                    return Err(CompileError::InvalidConstraint(format!(
                        "exclude({}) removes a funnel endpoint",
                        node
                    )))
                }
                Placement::Downstream => {
                    return Err(CompileError::InvalidConstraint(format!(
                        "exclude({}) is downstream of to({})",
                        node, to
                    )))
                }
                Placement::Upstream => {
                    segments.push(SegmentFilter::NotPerformedWithin {
                        node: node.clone(),
                        lookback_days: lookback,
                    });
                    approximations.push(Approximation::UpstreamLookback {
                        node: node.clone(),
                        lookback_days: lookback,
                    });
                }
                Placement::InFunnel if !self.capability.supports_native_exclude() => {
                    arithmetic.push(node)
                }
                Placement::InFunnel => {
                    segments.push(SegmentFilter::NotPerformedInFunnel { node: node.clone() })
                }
                // No from→to path passes through it.
                Placement::OffPath => {}
            }
        }

        if arithmetic.len() > MAX_ARITHMETIC_EXCLUSIONS {
            return Err(CompileError::TooManyExclusions {
                count: arithmetic.len(),
                max: MAX_ARITHMETIC_EXCLUSIONS,
            });
        }

        let terms = expand_terms(&ranked_steps, &segments, &arithmetic, |n| self.rank(n));

        let mut property_filters = Vec::new();
        for (key, value) in &constraint.context {
            property_filters.push(PropertyFilter::Equals {
                key: key.clone(),
                value: value.clone(),
            });
        }
        for (key, values) in &constraint.context_any {
            property_filters.push(PropertyFilter::OneOf {
                key: key.clone(),
                values: values.iter().cloned().collect(),
            });
        }
        for (key, variant) in &constraint.case {
            property_filters.push(PropertyFilter::CaseVariant {
                key: key.clone(),
                variant: variant.clone(),
            });
        }

        let query = ProviderQuery {
            connection: self.capability.connection_name().to_string(),
            provider,
            mode: constraint.mode(),
            date_range: constraint
                .cohort
                .as_ref()
                .map(|c| c.range)
                .or(constraint.window),
            cohort_anchor: constraint.cohort.as_ref().and_then(|c| c.anchor.clone()),
            terms,
            property_filters,
            approximations,
        };

        log_event_with_fields(
            Event::QueryCompiled,
            &[
                ("connection", query.connection.as_str()),
                ("terms", query.terms.len().to_string().as_str()),
            ],
        );
        for approximation in &query.approximations {
            log_event_with_fields(
                Event::QueryApproximated,
                &[
                    ("connection", query.connection.as_str()),
                    ("detail", approximation.describe().as_str()),
                ],
            );
        }

        Ok(query)
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_any_group(
        &self,
        group: &BTreeSet<NodeId>,
        constraint: &Constraint,
        from: &str,
        to: &str,
        ranked_steps: &mut Vec<(usize, FunnelStep)>,
        segments: &mut Vec<SegmentFilter>,
        approximations: &mut Vec<Approximation>,
    ) -> CompileResult<()> {
        // Already guaranteed by an endpoint or a required visit.
        if group
            .iter()
            .any(|n| n == from || n == to || constraint.visited.contains(n))
        {
            return Ok(());
        }

        let placements: Vec<Placement> = group.iter().map(|n| self.place(n, from, to)).collect();
        let nodes: Vec<NodeId> = group.iter().cloned().collect();
        let rendered = nodes.join(",");

        if placements.iter().all(|p| *p == Placement::InFunnel) {
            let rank = nodes.iter().map(|n| self.rank(n)).min().unwrap_or(usize::MAX);
            ranked_steps.push((rank, FunnelStep::AnyOf { nodes }));
            Ok(())
        } else if placements.iter().all(|p| *p == Placement::Upstream) {
            let lookback = self.upstream_lookback_days;
            for node in &nodes {
                approximations.push(Approximation::UpstreamLookback {
                    node: node.clone(),
                    lookback_days: lookback,
                });
            }
            segments.push(SegmentFilter::PerformedAnyWithin {
                nodes,
                lookback_days: lookback,
            });
            Ok(())
        } else {
            Err(CompileError::InvalidConstraint(format!(
                "visitedAny({}) must lie entirely inside or entirely upstream of the funnel",
                rendered
            )))
        }
    }
}

/// Base term plus one signed term per non-empty subset of `excluded`.
///
/// count(no excluded node) = Σ over subsets S of (-1)^|S| · count(funnel ∪ S)
fn expand_terms<F>(
    base: &[(usize, FunnelStep)],
    segments: &[SegmentFilter],
    excluded: &[&NodeId],
    rank: F,
) -> Vec<FunnelTerm>
where
    F: Fn(&str) -> usize,
{
    let build = |extra: &[&NodeId]| {
        let mut ranked: Vec<(usize, FunnelStep)> = base.to_vec();
        ranked.extend(extra.iter().map(|n| (rank(n.as_str()), FunnelStep::event(n.as_str()))));
        ranked.sort_by_key(|(r, _)| *r);
        ranked.into_iter().map(|(_, step)| step).collect::<Vec<_>>()
    };

    let mut terms = vec![FunnelTerm {
        sign: TermSign::Plus,
        steps: build(&[]),
        segments: segments.to_vec(),
    }];

    for mask in 1u32..(1u32 << excluded.len()) {
        let subset: Vec<&NodeId> = excluded
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, n)| *n)
            .collect();
        let sign = if subset.len() % 2 == 1 {
            TermSign::Minus
        } else {
            TermSign::Plus
        };
        terms.push(FunnelTerm {
            sign,
            steps: build(&subset),
            segments: segments.to_vec(),
        });
    }

    terms
}
