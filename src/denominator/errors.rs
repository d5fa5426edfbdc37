//! Denominator construction errors
//!
//! Every variant reports the same code, DQ_DENOMINATOR_CONSTRUCTION: the
//! denominator was rejected before any query ran.

use thiserror::Error;

use crate::dsl::{NodeId, SliceMode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenominatorError {
    /// Cohort denominators need an anchor
    #[error("Cohort denominator for '{node}' has no anchor")]
    MissingAnchor { node: NodeId },

    /// Window denominators are never anchor-prefixed
    #[error("Window denominator for '{node}' cannot be anchored at '{anchor}'")]
    AnchoredWindow { anchor: NodeId, node: NodeId },

    /// Two sources name different anchors
    #[error("Conflicting cohort anchors '{first}' and '{second}'")]
    AnchorConflict { first: NodeId, second: NodeId },

    /// Requested mode disagrees with the query's date clause
    #[error("Denominator requested in {expected} mode but the query is {found}")]
    ModeMismatch {
        expected: SliceMode,
        found: SliceMode,
    },

    /// Authored n_query contradicts the resolved denominator
    #[error("Invalid n_query: {0}")]
    InvalidNQuery(String),
}

impl DenominatorError {
    pub fn code(&self) -> &'static str {
        "DQ_DENOMINATOR_CONSTRUCTION"
    }
}

pub type DenominatorResult<T> = Result<T, DenominatorError>;
