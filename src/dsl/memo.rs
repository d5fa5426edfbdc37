//! Per-request memo table of parsed constraints
//!
//! Entries are keyed by canonical string; raw spellings map onto the
//! canonical key so `from(a).to(b)` and `to(b).from(a)` share one entry.
//! The table lives in a request context and dies with it.

use std::collections::HashMap;
use std::sync::Arc;

use super::ast::Constraint;
use super::canonical::canonicalize;
use super::errors::DslResult;
use super::parser::parse;

/// Memoised parse results
#[derive(Debug, Default)]
pub struct QueryMemo {
    spellings: HashMap<String, String>,
    parsed: HashMap<String, Arc<Constraint>>,
    hits: u64,
    misses: u64,
}

impl QueryMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `text`, reusing an earlier result when possible.
    ///
    /// Parse errors are returned every time and never cached.
    pub fn parse(&mut self, text: &str) -> DslResult<Arc<Constraint>> {
        let cached = self
            .spellings
            .get(text)
            .and_then(|key| self.parsed.get(key))
            .cloned();
        if let Some(constraint) = cached {
            self.hits += 1;
            return Ok(constraint);
        }

        self.misses += 1;
        let constraint = parse(text)?;
        let key = canonicalize(&constraint);
        let entry = self
            .parsed
            .entry(key.clone())
            .or_insert_with(|| Arc::new(constraint));
        let shared = Arc::clone(entry);
        self.spellings.insert(text.to_string(), key);
        Ok(shared)
    }

    /// Number of distinct canonical constraints held
    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
