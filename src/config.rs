//! Engine configuration
//!
//! A single JSON file:
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "connections": [{"connectionName": "amp", "providerType": "amplitude", "supportsNativeExclude": true}],
//!   "mece": [{"key": "channel", "values": ["google", "meta", "other"]}],
//!   "search": {"max_paths": 64, "max_depth": 12, "max_steps": 100000},
//!   "upstream_lookback_days": 30,
//!   "latency": {"p-signup": {"median_lag_days": 2.0, "mean_lag_days": 3.5}}
//! }
//! ```
//!
//! Global fields are validated on load and any failure is fatal.
//! Connections are validated one by one: a malformed descriptor is rejected
//! alone and reported when something asks for that connection.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::budget::SearchBudget;
use crate::compiler::{CapabilityRegistry, DEFAULT_UPSTREAM_LOOKBACK_DAYS};
use crate::composer::{LatencyConfig, LatencyModel};
use crate::observability::{log_event_with_fields, Event};
use crate::slices::MeceDeclaration;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "DQ_CONFIG_ERROR"
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    /// Raw capability descriptors, validated individually
    #[serde(default)]
    pub connections: Vec<Value>,

    #[serde(default)]
    pub mece: Vec<MeceDeclaration>,

    #[serde(default)]
    pub search: SearchBudget,

    #[serde(default = "default_upstream_lookback_days")]
    pub upstream_lookback_days: u32,

    /// Lag parameters by parameter id
    #[serde(default)]
    pub latency: BTreeMap<String, LatencyConfig>,
}

fn default_upstream_lookback_days() -> u32 {
    DEFAULT_UPSTREAM_LOOKBACK_DAYS
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("data_dir", config.data_dir.as_str()),
                ("connections", config.connections.len().to_string().as_str()),
                ("mece", config.mece.len().to_string().as_str()),
            ],
        );
        Ok(config)
    }

    /// Validates global fields; connections are checked by the registry
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.upstream_lookback_days == 0 {
            return Err(ConfigError::Invalid("upstream_lookback_days must be > 0".into()));
        }
        self.search.validate().map_err(ConfigError::Invalid)?;

        let mut keys = Vec::new();
        for mece in &self.mece {
            mece.validate().map_err(ConfigError::Invalid)?;
            if keys.contains(&mece.key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "mece key '{}' declared twice",
                    mece.key
                )));
            }
            keys.push(mece.key.as_str());
        }

        for (param_id, latency) in &self.latency {
            latency
                .model()
                .map_err(|e| ConfigError::Invalid(format!("latency for '{}': {}", param_id, e)))?;
        }
        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Validates every connection; rejections are kept for lookup
    pub fn capability_registry(&self) -> CapabilityRegistry {
        CapabilityRegistry::from_values(&self.connections)
    }

    pub fn latency_model(&self, param_id: &str) -> Option<LatencyModel> {
        // validated at load
        self.latency.get(param_id).and_then(|l| l.model().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_json(r#"{"data_dir": "./data"}"#).unwrap();
        assert_eq!(config.search, SearchBudget::default());
        assert_eq!(config.upstream_lookback_days, 30);
        assert!(config.connections.is_empty());
        assert!(config.latency_model("p").is_none());
    }

    #[test]
    fn test_invalid_global_fields_fatal() {
        assert!(Config::from_json(r#"{"data_dir": ""}"#).is_err());
        assert!(Config::from_json(r#"{"data_dir": "d", "upstream_lookback_days": 0}"#).is_err());
        assert!(Config::from_json(r#"{"data_dir": "d", "search": {"max_paths": 0}}"#).is_err());
        let err = Config::from_json(r#"{"data_dir": "d", "mece": [{"key": "c", "values": []}]}"#)
            .unwrap_err();
        assert_eq!(err.code(), "DQ_CONFIG_ERROR");
    }

    #[test]
    fn test_bad_connection_rejected_alone() {
        let config = Config::from_json(
            &json!({
                "data_dir": "d",
                "connections": [
                    {"connectionName": "amp", "providerType": "amplitude", "supportsNativeExclude": true},
                    {"connectionName": "sheet", "providerType": "sheets", "supportsNativeExclude": true}
                ]
            })
            .to_string(),
        )
        .unwrap();
        let registry = config.capability_registry();
        assert!(registry.get("amp").is_ok());
        assert_eq!(
            registry.get("sheet").unwrap_err().code(),
            "DQ_CAPABILITY_MISMATCH"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dagquery.json");
        fs::write(
            &path,
            json!({
                "data_dir": dir.path().join("data"),
                "latency": {"p": {"median_lag_days": 2.0, "mean_lag_days": 3.0}}
            })
            .to_string(),
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert!(config.latency_model("p").is_some());
        assert!(Config::load(&dir.path().join("missing.json")).is_err());
    }
}
