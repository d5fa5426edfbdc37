//! Edge query planner
//!
//! Runs the full pipeline for one edge:
//!
//! 1. Base constraint: the authored `query` (memoised parse) or `from(u).to(v)`
//! 2. Target path `[u, v]`; alternates are the other enumerated u→v paths
//!    still admitted by the base constraint
//! 3. MSMDC adds literals to rule out the alternates
//! 4. Compile for the connection; resolve the anchor and the denominator
//! 5. Annotate the edge with the derived fields
//!
//! Ambiguity and truncation never fail a plan; they are warnings on it.

use serde::Serialize;

use crate::compiler::{CapabilityRegistry, CompileError, ProviderQuery, QueryCompiler};
use crate::context::RequestContext;
use crate::denominator::{DenominatorQuery, DenominatorRequest, DenominatorResolver};
use crate::dsl::{matches_path, Constraint, NodeId, SliceMode};
use crate::error::EngineResult;
use crate::graph::{enumerate_paths, EdgeAnnotations, Graph, Path, TruncationReason};
use crate::msmdc::{MsmdcOutcome, MsmdcSolver};
use crate::observability::{log_event_with_fields, Event};

pub const PATHS_TRUNCATED_CODE: &str = "DQ_PATHS_TRUNCATED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgePlan {
    pub edge_id: String,
    /// Canonical base constraint
    pub base_query: String,
    pub target: Path,
    /// Alternates the base constraint still admits
    pub alternates: Vec<Path>,
    pub msmdc: MsmdcOutcome,
    /// Canonical base constraint plus MSMDC literals
    pub generated_query: String,
    pub provider_query: ProviderQuery,
    pub signature: String,
    pub anchor: Option<NodeId>,
    pub mode: Option<SliceMode>,
    pub denominator: Option<DenominatorQuery>,
    pub warnings: Vec<PlanWarning>,
}

impl EdgePlan {
    pub fn annotations(&self) -> EdgeAnnotations {
        EdgeAnnotations {
            generated_query: self.generated_query.clone(),
            anchor: self.anchor.clone(),
            connection: self.provider_query.connection.clone(),
            signature: self.signature.clone(),
            ambiguous: self.msmdc.is_ambiguous(),
        }
    }
}

pub struct EdgeQueryPlanner<'a> {
    graph: &'a Graph,
    registry: &'a CapabilityRegistry,
    upstream_lookback_days: u32,
}

impl<'a> EdgeQueryPlanner<'a> {
    pub fn new(graph: &'a Graph, registry: &'a CapabilityRegistry, upstream_lookback_days: u32) -> Self {
        Self {
            graph,
            registry,
            upstream_lookback_days,
        }
    }

    /// Plans `edge_id` for `connection`.
    ///
    /// `mode` selects the denominator; when the query carries its own
    /// `cohort()`/`window()` clause that clause decides. With neither, no
    /// denominator is built.
    pub fn plan(
        &self,
        ctx: &mut RequestContext,
        edge_id: &str,
        connection: &str,
        mode: Option<SliceMode>,
    ) -> EngineResult<EdgePlan> {
        let edge = self.graph.edge(edge_id)?;
        let capability = self.registry.get(connection)?;

        let mut base = match &edge.query {
            Some(text) => (*ctx.parse(text)?).clone(),
            None => Constraint::funnel(edge.from.clone(), edge.to.clone()),
        };
        check_endpoint("from", &mut base.from, &edge.from)?;
        check_endpoint("to", &mut base.to, &edge.to)?;

        let target: Path = vec![edge.from.clone(), edge.to.clone()];
        let span = self.span_constraint(&base, &edge.from);
        if !matches_path(&span, &target) {
            return Err(CompileError::InvalidConstraint(format!(
                "query for edge '{}' rules out the edge itself",
                edge.id
            ))
            .into());
        }

        let mut warnings = Vec::new();
        let enumeration = enumerate_paths(self.graph, &edge.from, &edge.to, &ctx.budget)?;
        if let Some(reason) = enumeration.truncation {
            warnings.push(truncation_warning(reason));
        }

        let mut alternates: Vec<Path> = enumeration
            .alternates(&target)
            .filter(|p| matches_path(&span, p))
            .cloned()
            .collect();
        // Parallel edges share the target's node set.
        for _ in 1..self.graph.edges_between(&edge.from, &edge.to).len() {
            alternates.push(target.clone());
        }

        let solver = MsmdcSolver::new(capability.supports_native_exclude(), ctx.budget.max_steps);
        let msmdc = solver.solve(&target, &alternates)?;
        if let Some(code) = msmdc.warning_code() {
            warnings.push(PlanWarning {
                code,
                message: format!(
                    "edge '{}' cannot be fully isolated from its alternate paths",
                    edge.id
                ),
            });
        }

        let generated = base.merge(&msmdc.to_constraint())?;
        let provider_query = QueryCompiler::new(self.graph, capability)
            .with_upstream_lookback(self.upstream_lookback_days)
            .compile(&generated)?;
        let signature = provider_query.signature();

        let anchor = self.graph.resolve_anchor(&edge.from)?;
        let mode = generated.mode().or(mode);
        let denominator = match mode {
            Some(mode) => {
                let n_query = match &edge.n_query {
                    Some(text) => Some(ctx.parse(text)?),
                    None => None,
                };
                Some(DenominatorResolver::resolve(&DenominatorRequest {
                    mode,
                    from_node: &edge.from,
                    edge_query: &generated,
                    n_query: n_query.as_deref(),
                    resolved_anchor: anchor.as_deref(),
                })?)
            }
            None => None,
        };

        let plan = EdgePlan {
            edge_id: edge.id.clone(),
            base_query: base.canonical(),
            target,
            alternates,
            generated_query: generated.canonical(),
            msmdc,
            provider_query,
            signature,
            anchor,
            mode,
            denominator,
            warnings,
        };

        log_event_with_fields(
            Event::EdgePlanned,
            &[
                ("request_id", ctx.request_id.to_string().as_str()),
                ("edge", plan.edge_id.as_str()),
                ("connection", connection),
                ("query", plan.generated_query.as_str()),
                ("warnings", plan.warnings.len().to_string().as_str()),
            ],
        );
        Ok(plan)
    }

    /// Plans `edge_id` and writes the derived fields back onto the graph
    pub fn plan_and_annotate(
        graph: &mut Graph,
        registry: &CapabilityRegistry,
        upstream_lookback_days: u32,
        ctx: &mut RequestContext,
        edge_id: &str,
        connection: &str,
        mode: Option<SliceMode>,
    ) -> EngineResult<EdgePlan> {
        let plan = EdgeQueryPlanner::new(graph, registry, upstream_lookback_days)
            .plan(ctx, edge_id, connection, mode)?;
        graph.annotate_edge(edge_id, plan.annotations())?;
        Ok(plan)
    }

    /// The part of `constraint` a from→to path can witness.
    ///
    /// Nodes upstream of `from` are reached before the funnel starts, so a
    /// `visited` on them (or a `visitedAny` group holding one) says nothing
    /// about which from→to path was taken.
    fn span_constraint(&self, constraint: &Constraint, from: &NodeId) -> Constraint {
        let upstream = |node: &NodeId| self.graph.is_upstream(node, from);
        let mut span = constraint.clone();
        span.visited.retain(|node| !upstream(node));
        span.visited_any.retain(|group| !group.iter().any(|n| upstream(n)));
        span
    }
}

/// Fills a missing endpoint; an authored one must match the edge
fn check_endpoint(clause: &str, slot: &mut Option<NodeId>, expected: &NodeId) -> EngineResult<()> {
    match slot {
        Some(node) if *node != *expected => Err(CompileError::InvalidConstraint(format!(
            "{}({}) does not match the edge endpoint '{}'",
            clause, node, expected
        ))
        .into()),
        Some(_) => Ok(()),
        None => {
            *slot = Some(expected.clone());
            Ok(())
        }
    }
}

fn truncation_warning(reason: TruncationReason) -> PlanWarning {
    PlanWarning {
        code: PATHS_TRUNCATED_CODE,
        message: format!(
            "path enumeration stopped at {}; alternates may be missing",
            reason.as_str()
        ),
    }
}
