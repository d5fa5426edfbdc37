//! Connection capability descriptors
//!
//! Descriptors are parsed strictly (unknown or missing fields fail) and
//! validated once, when configuration loads. A rejected descriptor disables
//! only its own connection; every later lookup of that connection reports
//! the original rejection.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{CompileError, CompileResult};
use crate::observability::{log_event_with_fields, Event};

/// Analytics provider behind a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Amplitude,
    Sql,
    Sheets,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Amplitude => "amplitude",
            ProviderType::Sql => "sql",
            ProviderType::Sheets => "sheets",
        }
    }

    /// Whether the provider evaluates multi-step funnels at all
    pub fn executes_funnels(&self) -> bool {
        !matches!(self, ProviderType::Sheets)
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wire form of a descriptor, before validation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawDescriptor {
    connection_name: String,
    provider_type: ProviderType,
    supports_native_exclude: bool,
}

/// Validated capability descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDescriptor")]
pub struct CapabilityDescriptor {
    connection_name: String,
    provider_type: ProviderType,
    supports_native_exclude: bool,
}

impl TryFrom<RawDescriptor> for CapabilityDescriptor {
    type Error = CompileError;

    fn try_from(raw: RawDescriptor) -> CompileResult<Self> {
        CapabilityDescriptor::new(
            raw.connection_name,
            raw.provider_type,
            raw.supports_native_exclude,
        )
    }
}

impl CapabilityDescriptor {
    pub fn new(
        connection_name: impl Into<String>,
        provider_type: ProviderType,
        supports_native_exclude: bool,
    ) -> CompileResult<Self> {
        let connection_name = connection_name.into();
        if connection_name.trim().is_empty() {
            return Err(CompileError::mismatch("", "connectionName must not be empty"));
        }
        if connection_name.chars().any(char::is_whitespace) {
            return Err(CompileError::mismatch(
                connection_name,
                "connectionName must not contain whitespace",
            ));
        }
        if supports_native_exclude && !provider_type.executes_funnels() {
            return Err(CompileError::mismatch(
                connection_name,
                format!("provider '{}' cannot exclude natively", provider_type),
            ));
        }
        Ok(Self {
            connection_name,
            provider_type,
            supports_native_exclude,
        })
    }

    /// Parses a descriptor from a JSON value
    pub fn from_value(value: &Value) -> CompileResult<Self> {
        let name = value
            .get("connectionName")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let raw: RawDescriptor = serde_json::from_value(value.clone())
            .map_err(|e| CompileError::mismatch(name, e.to_string()))?;
        Self::try_from(raw)
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    pub fn supports_native_exclude(&self) -> bool {
        self.supports_native_exclude
    }
}

/// Accepted descriptors plus the reasons others were rejected
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    accepted: BTreeMap<String, CapabilityDescriptor>,
    rejected: BTreeMap<String, String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates each entry on its own; failures are logged and recorded
    pub fn from_values(values: &[Value]) -> Self {
        let mut registry = Self::new();
        for (index, value) in values.iter().enumerate() {
            registry.register_value(index, value);
        }
        registry
    }

    fn register_value(&mut self, index: usize, value: &Value) {
        let key = value
            .get("connectionName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("connections[{}]", index));

        let result = CapabilityDescriptor::from_value(value).and_then(|descriptor| {
            if self.accepted.contains_key(descriptor.connection_name()) {
                Err(CompileError::mismatch(key.as_str(), "duplicate connectionName"))
            } else {
                Ok(descriptor)
            }
        });

        match result {
            Ok(descriptor) => {
                self.accepted
                    .insert(descriptor.connection_name().to_string(), descriptor);
            }
            Err(err) => {
                let reason = match &err {
                    CompileError::CapabilityMismatch { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                log_event_with_fields(
                    Event::CapabilityRejected,
                    &[("connection", key.as_str()), ("reason", reason.as_str())],
                );
                self.rejected.insert(key, reason);
            }
        }
    }

    pub fn insert(&mut self, descriptor: CapabilityDescriptor) {
        self.rejected.remove(descriptor.connection_name());
        self.accepted
            .insert(descriptor.connection_name().to_string(), descriptor);
    }

    /// Looks up a connection; rejected and unknown names are mismatches
    pub fn get(&self, connection: &str) -> CompileResult<&CapabilityDescriptor> {
        if let Some(descriptor) = self.accepted.get(connection) {
            return Ok(descriptor);
        }
        let reason = match self.rejected.get(connection) {
            Some(reason) => format!("descriptor rejected at load: {}", reason),
            None => "no such connection".to_string(),
        };
        Err(CompileError::mismatch(connection, reason))
    }

    pub fn accepted(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.accepted.values()
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&String, &String)> {
        self.rejected.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_descriptor() {
        let d = CapabilityDescriptor::from_value(&json!({
            "connectionName": "amp-prod",
            "providerType": "amplitude",
            "supportsNativeExclude": true
        }))
        .unwrap();
        assert_eq!(d.connection_name(), "amp-prod");
        assert!(d.supports_native_exclude());
    }

    #[test]
    fn test_malformed_descriptors_fail_fast() {
        let cases = [
            json!({"connectionName": "x", "providerType": "amplitude"}),
            json!({"connectionName": "x", "providerType": "bigquery", "supportsNativeExclude": false}),
            json!({"connectionName": "x", "providerType": "sql", "supportsNativeExclude": "yes"}),
            json!({"connectionName": "x", "providerType": "sql", "supportsNativeExclude": false, "extra": 1}),
            json!({"connectionName": "", "providerType": "sql", "supportsNativeExclude": false}),
            json!({"connectionName": "sheet", "providerType": "sheets", "supportsNativeExclude": true}),
        ];
        for value in cases {
            let err = CapabilityDescriptor::from_value(&value).unwrap_err();
            assert_eq!(err.code(), "DQ_CAPABILITY_MISMATCH", "{}", value);
        }
    }

    #[test]
    fn test_registry_isolates_rejections() {
        let registry = CapabilityRegistry::from_values(&[
            json!({"connectionName": "good", "providerType": "sql", "supportsNativeExclude": false}),
            json!({"connectionName": "bad", "providerType": "sql"}),
        ]);
        assert!(registry.get("good").is_ok());
        let err = registry.get("bad").unwrap_err();
        assert!(err.to_string().contains("rejected at load"));
        assert!(registry.get("missing").is_err());
        assert_eq!(registry.rejected().count(), 1);
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let entry = json!({"connectionName": "a", "providerType": "sql", "supportsNativeExclude": false});
        let registry = CapabilityRegistry::from_values(&[entry.clone(), entry]);
        assert_eq!(registry.accepted().count(), 1);
        assert_eq!(registry.rejected().count(), 1);
        assert!(registry.get("a").is_ok());
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = r#"{"connectionName":"s","providerType":"sheets","supportsNativeExclude":true}"#;
        assert!(serde_json::from_str::<CapabilityDescriptor>(json).is_err());
    }
}
