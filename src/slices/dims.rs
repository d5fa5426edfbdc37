//! Slice dimensions
//!
//! The dimensions of a slice are its single-valued `context` and `case`
//! pairs. Their canonical DSL text (`context(channel:google)`) is the
//! `sliceKey`; the empty string is the uncontexted slice.

use std::collections::BTreeMap;
use std::fmt;

use super::errors::{SliceError, SliceResult};
use crate::dsl::{canonicalize, parse, Constraint};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceDims {
    context: BTreeMap<String, String>,
    case: BTreeMap<String, String>,
}

impl SliceDims {
    /// Uncontexted dimensions
    pub fn none() -> Self {
        Self::default()
    }

    /// Parses a slice key that may only contain context/case pairs
    pub fn parse(key: &str) -> SliceResult<Self> {
        if key.trim().is_empty() {
            return Ok(Self::none());
        }
        let constraint = parse(key)
            .map_err(|e| SliceError::invalid_record(format!("bad slice key '{}': {}", key, e)))?;
        let dims = Self::from_constraint(&constraint)?;
        if dims.to_constraint() != constraint {
            return Err(SliceError::invalid_record(format!(
                "slice key '{}' may only contain context() and case()",
                key
            )));
        }
        Ok(dims)
    }

    /// Extracts dimensions from a query's segment clauses.
    ///
    /// `contextAny` names no single slice and is rejected.
    pub fn from_constraint(constraint: &Constraint) -> SliceResult<Self> {
        if !constraint.context_any.is_empty() {
            return Err(SliceError::invalid_record(
                "contextAny() does not name a single slice",
            ));
        }
        Ok(Self {
            context: constraint.context.clone(),
            case: constraint.case.clone(),
        })
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_case(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.case.insert(key.into(), value.into());
        self
    }

    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    pub fn is_uncontexted(&self) -> bool {
        self.context.is_empty() && self.case.is_empty()
    }

    pub fn to_constraint(&self) -> Constraint {
        Constraint {
            context: self.context.clone(),
            case: self.case.clone(),
            ..Constraint::default()
        }
    }

    /// Canonical slice key
    pub fn key(&self) -> String {
        canonicalize(&self.to_constraint())
    }
}

impl fmt::Display for SliceDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
