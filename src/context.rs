//! Request Context
//!
//! Carried through one engine request: request id for tracing, the parse
//! memo shared by every query the request touches, and the search budget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::budget::SearchBudget;
use crate::dsl::{Constraint, DslResult, QueryMemo};

#[derive(Debug)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// Bounds for path enumeration and MSMDC
    pub budget: SearchBudget,

    /// Metadata for observability
    pub metadata: HashMap<String, Value>,

    memo: QueryMemo,
    started_at: Instant,
}

impl RequestContext {
    pub fn new(budget: SearchBudget) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            budget,
            metadata: HashMap::new(),
            memo: QueryMemo::new(),
            started_at: Instant::now(),
        }
    }

    /// Parses through the request's memo
    pub fn parse(&mut self, text: &str) -> DslResult<Arc<Constraint>> {
        self.memo.parse(text)
    }

    pub fn memo(&self) -> &QueryMemo {
        &self.memo
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(SearchBudget::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_request_ids() {
        let a = RequestContext::default();
        let b = RequestContext::default();
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_parse_is_memoised() {
        let mut ctx = RequestContext::default();
        let first = ctx.parse("from(a).to(b)").unwrap();
        let second = ctx.parse("from(a).to(b)").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.memo().hits(), 1);
    }

    #[test]
    fn test_metadata() {
        let ctx = RequestContext::default().with_metadata("command", Value::from("plan"));
        assert_eq!(ctx.metadata["command"], Value::from("plan"));
    }
}
