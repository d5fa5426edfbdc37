//! Slice records
//!
//! One record is one day of one series. A series is identified by
//! (paramId, coreHash, sliceKey, mode); within a series, the last record
//! appended for a day wins.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::dims::SliceDims;
use super::errors::{SliceError, SliceResult};
use crate::dsl::SliceMode;

/// Identity of a series
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesKey {
    pub param_id: String,
    pub core_hash: String,
    pub slice_key: String,
    pub mode: SliceMode,
}

/// Persisted per-day counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceRecord {
    pub param_id: String,
    pub core_hash: String,
    /// Canonical dimensions; empty for the uncontexted slice
    #[serde(default)]
    pub slice_key: String,
    pub mode: SliceMode,
    pub day: NaiveDate,
    pub retrieved_at: DateTime<Utc>,
    /// Trials
    pub n: u64,
    /// Successes
    pub k: u64,
}

impl SliceRecord {
    /// Checks the record's invariants
    pub fn validate(&self) -> SliceResult<()> {
        if self.param_id.trim().is_empty() {
            return Err(SliceError::invalid_record("paramId is empty"));
        }
        if self.core_hash.trim().is_empty() {
            return Err(SliceError::invalid_record("coreHash is empty"));
        }
        if self.k > self.n {
            return Err(SliceError::invalid_record(format!(
                "k ({}) exceeds n ({}) on {}",
                self.k, self.n, self.day
            )));
        }
        let dims = SliceDims::parse(&self.slice_key)?;
        if dims.key() != self.slice_key {
            return Err(SliceError::invalid_record(format!(
                "sliceKey '{}' is not canonical (expected '{}')",
                self.slice_key,
                dims.key()
            )));
        }
        Ok(())
    }

    pub fn series_key(&self) -> SeriesKey {
        SeriesKey {
            param_id: self.param_id.clone(),
            core_hash: self.core_hash.clone(),
            slice_key: self.slice_key.clone(),
            mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> SliceRecord {
        SliceRecord {
            param_id: "p1".into(),
            core_hash: "h1".into(),
            slice_key: "context(channel:google)".into(),
            mode: SliceMode::Window,
            day: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            retrieved_at: Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
            n: 10,
            k: 3,
        }
    }

    #[test]
    fn test_valid_record() {
        assert!(record().validate().is_ok());
    }

    #[test]
    fn test_k_above_n_invalid() {
        let mut r = record();
        r.k = 11;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_non_canonical_key_invalid() {
        let mut r = record();
        r.slice_key = "context(channel='google')".into();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let value = serde_json::to_value(record()).unwrap();
        assert!(value.get("paramId").is_some());
        assert!(value.get("retrievedAt").is_some());
        assert_eq!(value["mode"], "window");
    }
}
