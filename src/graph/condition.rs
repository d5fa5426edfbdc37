//! conditional_p conditions
//!
//! Persisted conditions come in two shapes: a DSL string, or a legacy
//! structured object (`{"visited": [...], "exclude": [...], ...}`). Both are
//! migrated at the document boundary into one `Condition` through a single
//! canonicalizing parse. Any other shape is a migration error; nothing
//! defaults to an empty (always-true) condition.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::dsl::{canonicalize, parse, Constraint, DslError, DslResult};

/// Where a condition came from before migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOrigin {
    Dsl,
    LegacyObject,
}

/// A migrated, canonical branch condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    constraint: Constraint,
    canonical: String,
    origin: ConditionOrigin,
}

impl Condition {
    /// Parses a DSL condition string
    pub fn parse(text: &str) -> DslResult<Self> {
        let constraint = parse(text)?;
        reject_empty(&constraint)?;
        Ok(Self {
            canonical: canonicalize(&constraint),
            constraint,
            origin: ConditionOrigin::Dsl,
        })
    }

    /// Migrates any persisted condition shape
    pub fn migrate(value: &Value) -> DslResult<Self> {
        match value {
            Value::String(text) => Self::parse(text),
            Value::Object(map) => {
                let mut constraint = Constraint::new();
                for (key, field) in map {
                    match key.as_str() {
                        "visited" => {
                            for node in string_list(key, field)? {
                                constraint.visited.insert(node);
                            }
                        }
                        "exclude" => {
                            for node in string_list(key, field)? {
                                constraint.exclude.insert(node);
                            }
                        }
                        "visitedAny" | "visited_any" => {
                            for group in group_list(key, field)? {
                                constraint = constraint.with_visited_any(group);
                            }
                        }
                        "context" => {
                            for (k, v) in string_map(key, field)? {
                                constraint.context.insert(k, v);
                            }
                        }
                        "case" => {
                            for (k, v) in string_map(key, field)? {
                                constraint.case.insert(k, v);
                            }
                        }
                        other => {
                            return Err(DslError::Migration(format!(
                                "unrecognized condition field '{}'",
                                other
                            )))
                        }
                    }
                }

                reject_empty(&constraint)?;

                // One canonicalizing parse: the object must survive a round trip.
                let canonical = canonicalize(&constraint);
                let reparsed = parse(&canonical)
                    .map_err(|e| DslError::Migration(format!("unrepresentable condition: {}", e)))?;
                if reparsed != constraint {
                    return Err(DslError::Migration(format!(
                        "condition does not round-trip through '{}'",
                        canonical
                    )));
                }

                Ok(Self {
                    constraint: reparsed,
                    canonical,
                    origin: ConditionOrigin::LegacyObject,
                })
            }
            other => Err(DslError::Migration(format!(
                "unrecognized condition shape: {}",
                shape_name(other)
            ))),
        }
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn origin(&self) -> ConditionOrigin {
        self.origin
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Condition::migrate(&value).map_err(D::Error::custom)
    }
}

/// An empty condition would match every user
fn reject_empty(constraint: &Constraint) -> DslResult<()> {
    if constraint.is_empty() {
        return Err(DslError::Migration(
            "condition is empty and would always be true".to_string(),
        ));
    }
    Ok(())
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_list(field: &str, value: &Value) -> DslResult<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| DslError::Migration(format!("'{}' must be an array of node ids", field)))?;
    items
        .iter()
        .map(|item| match item.as_str() {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(DslError::Migration(format!(
                "'{}' entries must be non-empty strings",
                field
            ))),
        })
        .collect()
}

/// Accepts either one group (`["a","b"]`) or several (`[["a","b"],["c"]]`)
fn group_list(field: &str, value: &Value) -> DslResult<Vec<Vec<String>>> {
    let items = value
        .as_array()
        .ok_or_else(|| DslError::Migration(format!("'{}' must be an array", field)))?;
    if items.iter().all(Value::is_string) {
        return Ok(vec![string_list(field, value)?]);
    }
    items.iter().map(|group| string_list(field, group)).collect()
}

fn string_map(field: &str, value: &Value) -> DslResult<Vec<(String, String)>> {
    let map = value
        .as_object()
        .ok_or_else(|| DslError::Migration(format!("'{}' must be an object", field)))?;
    map.iter()
        .map(|(k, v)| match v.as_str() {
            Some(s) if !s.is_empty() => Ok((k.clone(), s.to_string())),
            _ => Err(DslError::Migration(format!(
                "'{}.{}' must be a non-empty string",
                field, k
            ))),
        })
        .collect()
}
