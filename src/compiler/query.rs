//! Provider query representation
//!
//! A `ProviderQuery` is provider-neutral data: connectors translate it into
//! their own request format. Terms carry a sign so inclusion-exclusion
//! arithmetic stays explicit: k = Σ sign·count(term).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::capability::ProviderType;
use crate::dsl::{DateRange, NodeId, SliceMode};

/// One ordered funnel step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunnelStep {
    Event { node: NodeId },
    /// Any one of the nodes satisfies the step
    AnyOf { nodes: Vec<NodeId> },
}

impl FunnelStep {
    pub fn event(node: impl Into<NodeId>) -> Self {
        FunnelStep::Event { node: node.into() }
    }
}

/// User-level filter applied to a whole term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentFilter {
    /// Performed `node` within the lookback before entering the funnel
    PerformedWithin { node: NodeId, lookback_days: u32 },
    /// Performed any of `nodes` within the lookback
    PerformedAnyWithin { nodes: Vec<NodeId>, lookback_days: u32 },
    /// Did not perform `node` between the first and last funnel step
    NotPerformedInFunnel { node: NodeId },
    /// Did not perform `node` within the lookback before the funnel
    NotPerformedWithin { node: NodeId, lookback_days: u32 },
}

/// Event/user property filter from context, contextAny and case clauses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyFilter {
    Equals { key: String, value: String },
    OneOf { key: String, values: Vec<String> },
    CaseVariant { key: String, variant: String },
}

/// Sign of a term in the k arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermSign {
    Plus,
    Minus,
}

impl TermSign {
    pub fn factor(&self) -> i64 {
        match self {
            TermSign::Plus => 1,
            TermSign::Minus => -1,
        }
    }
}

/// One signed funnel count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelTerm {
    pub sign: TermSign,
    pub steps: Vec<FunnelStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentFilter>,
}

/// A documented deviation from exact semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Approximation {
    /// A visit/exclusion upstream of `from` is bounded to a rolling lookback
    UpstreamLookback { node: NodeId, lookback_days: u32 },
}

impl Approximation {
    pub fn describe(&self) -> String {
        match self {
            Approximation::UpstreamLookback {
                node,
                lookback_days,
            } => format!(
                "'{}' is upstream of the funnel; checked over a {}-day rolling lookback",
                node, lookback_days
            ),
        }
    }
}

/// Compiled, provider-neutral query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuery {
    pub connection: String,
    pub provider: ProviderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SliceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_anchor: Option<NodeId>,
    pub terms: Vec<FunnelTerm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_filters: Vec<PropertyFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approximations: Vec<Approximation>,
}

impl ProviderQuery {
    /// Stable query-generation identifier (`coreHash`).
    ///
    /// Property filters and the date range are left out: they select a
    /// slice and a retrieval window, not a query generation.
    pub fn signature(&self) -> String {
        let mut core = self.clone();
        core.property_filters.clear();
        core.date_range = None;
        // Serialization of plain data cannot fail; an empty input still hashes.
        let bytes = serde_json::to_vec(&core).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Returns true if the query uses inclusion-exclusion arithmetic
    pub fn is_arithmetic(&self) -> bool {
        self.terms.len() > 1
    }

    pub fn is_approximate(&self) -> bool {
        !self.approximations.is_empty()
    }
}
