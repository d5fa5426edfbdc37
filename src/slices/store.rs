//! Slice store interface and the in-memory implementation
//!
//! The store is the engine's one shared mutable resource. Writes are
//! append-only per series and last-writer-wins per day; there is no
//! cross-series locking.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};

use super::errors::{SliceError, SliceResult};
use super::record::{SeriesKey, SliceRecord};
use crate::observability::{log_event_with_fields, Event};

/// What an append did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// First record for this series/day
    Inserted,
    /// Replaced an earlier record for this series/day
    Replaced,
}

/// One series as currently visible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSeries {
    pub key: SeriesKey,
    pub days: BTreeMap<NaiveDate, SliceRecord>,
}

impl StoredSeries {
    /// Latest retrieval time of any day in the series
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        self.days.values().map(|r| r.retrieved_at).max()
    }
}

/// Abstract slice persistence
pub trait SliceStore: Send + Sync {
    /// Appends one validated record
    fn append(&self, record: SliceRecord) -> SliceResult<AppendOutcome>;

    /// All series for a parameter, ordered by key
    fn series(&self, param_id: &str) -> SliceResult<Vec<StoredSeries>>;

    /// Appends several records in order
    fn append_all(&self, records: Vec<SliceRecord>) -> SliceResult<Vec<AppendOutcome>> {
        records.into_iter().map(|r| self.append(r)).collect()
    }
}

type SeriesMap = BTreeMap<SeriesKey, BTreeMap<NaiveDate, SliceRecord>>;

/// In-memory store; also the index behind `FileSliceStore`
#[derive(Debug, Default)]
pub struct MemorySliceStore {
    series: RwLock<SeriesMap>,
}

impl MemorySliceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct series
    pub fn series_count(&self) -> usize {
        self.series.read().map(|s| s.len()).unwrap_or(0)
    }

    pub(crate) fn insert_validated(&self, record: SliceRecord) -> SliceResult<AppendOutcome> {
        let mut series = self
            .series
            .write()
            .map_err(|_| SliceError::poisoned())?;
        let days = series.entry(record.series_key()).or_default();
        let outcome = match days.insert(record.day, record) {
            Some(_) => AppendOutcome::Replaced,
            None => AppendOutcome::Inserted,
        };
        Ok(outcome)
    }
}

impl SliceStore for MemorySliceStore {
    fn append(&self, record: SliceRecord) -> SliceResult<AppendOutcome> {
        record.validate()?;
        let param_id = record.param_id.clone();
        let day = record.day.to_string();
        let outcome = self.insert_validated(record)?;
        log_event_with_fields(
            Event::SliceAppended,
            &[("param_id", param_id.as_str()), ("day", day.as_str())],
        );
        Ok(outcome)
    }

    fn series(&self, param_id: &str) -> SliceResult<Vec<StoredSeries>> {
        let series = self
            .series
            .read()
            .map_err(|_| SliceError::poisoned())?;
        Ok(series
            .iter()
            .filter(|(key, _)| key.param_id == param_id)
            .map(|(key, days)| StoredSeries {
                key: key.clone(),
                days: days.clone(),
            })
            .collect())
    }
}
