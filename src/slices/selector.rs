//! Series selection and reconciliation
//!
//! For a (param, dims, mode) request two kinds of candidate compete:
//! - explicit: the series stored under exactly these dims; its recency is
//!   the latest `retrievedAt` of any day
//! - MECE: one complete partition over a declared context key, all members
//!   from one generation (coreHash); its recency is the stalest member's
//!
//! Within each kind the most recent generation is used (for MECE, the most
//! recent *complete* generation). Between kinds the greater recency wins and
//! ties go to the explicit series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::dims::SliceDims;
use super::errors::{SliceError, SliceResult};
use super::mece::MeceDeclaration;
use super::store::{SliceStore, StoredSeries};
use crate::dsl::SliceMode;
use crate::observability::{log_event_with_fields, Event};

/// Trials and successes for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub n: u64,
    pub k: u64,
}

impl DayCounts {
    pub fn new(n: u64, k: u64) -> Self {
        Self { n, k }
    }

    /// Saturates rather than wrapping on absurd counts
    pub fn add(self, other: DayCounts) -> DayCounts {
        DayCounts {
            n: self.n.saturating_add(other.n),
            k: self.k.saturating_add(other.k),
        }
    }
}

/// Where a reconciled series came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesSource {
    Explicit,
    Mece { key: String },
}

/// One trustworthy (n, k) per day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledSeries {
    pub param_id: String,
    pub mode: SliceMode,
    pub slice_key: String,
    pub source: SeriesSource,
    pub core_hash: String,
    pub recency: DateTime<Utc>,
    pub days: BTreeMap<NaiveDate, DayCounts>,
    /// Days some MECE member lacks; excluded from `days`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incomplete_days: Vec<NaiveDate>,
}

impl ReconciledSeries {
    pub fn totals(&self) -> DayCounts {
        self.days.values().fold(DayCounts::default(), |acc, d| acc.add(*d))
    }
}

struct Candidate {
    source: SeriesSource,
    core_hash: String,
    recency: DateTime<Utc>,
    days: BTreeMap<NaiveDate, DayCounts>,
    incomplete_days: Vec<NaiveDate>,
}

/// Chooses and reconciles cached series
pub struct SliceSelector<'a> {
    store: &'a dyn SliceStore,
    mece: &'a [MeceDeclaration],
}

impl<'a> SliceSelector<'a> {
    pub fn new(store: &'a dyn SliceStore, mece: &'a [MeceDeclaration]) -> Self {
        Self { store, mece }
    }

    /// Selects the reconciled series for a parameter, dims and mode
    pub fn select(
        &self,
        param_id: &str,
        dims: &SliceDims,
        mode: SliceMode,
    ) -> SliceResult<ReconciledSeries> {
        let all: Vec<StoredSeries> = self
            .store
            .series(param_id)?
            .into_iter()
            .filter(|s| s.key.mode == mode)
            .collect();
        let key = dims.key();

        let explicit = explicit_candidate(&all, &key);
        let mece = self
            .mece
            .iter()
            .filter(|decl| decl.applies_to(dims))
            .filter_map(|decl| mece_candidate(&all, dims, decl))
            .fold(None::<Candidate>, |best, next| match best {
                Some(b) if b.recency >= next.recency => Some(b),
                _ => Some(next),
            });

        let chosen = match (explicit, mece) {
            (Some(e), Some(m)) => {
                if e.recency >= m.recency {
                    e
                } else {
                    m
                }
            }
            (Some(e), None) => e,
            (None, Some(m)) => m,
            (None, None) => {
                return Err(SliceError::not_found(
                    param_id,
                    format!(
                        "no {} series for slice '{}' and no complete MECE partition",
                        mode, key
                    ),
                ))
            }
        };

        let source_name = match &chosen.source {
            SeriesSource::Explicit => "explicit".to_string(),
            SeriesSource::Mece { key } => format!("mece:{}", key),
        };
        log_event_with_fields(
            Event::SeriesSelected,
            &[
                ("param_id", param_id),
                ("slice_key", key.as_str()),
                ("source", source_name.as_str()),
                ("core_hash", chosen.core_hash.as_str()),
            ],
        );
        if !chosen.incomplete_days.is_empty() {
            log_event_with_fields(
                Event::MeceIncomplete,
                &[
                    ("param_id", param_id),
                    ("source", source_name.as_str()),
                    ("days", chosen.incomplete_days.len().to_string().as_str()),
                ],
            );
        }

        Ok(ReconciledSeries {
            param_id: param_id.to_string(),
            mode,
            slice_key: key,
            source: chosen.source,
            core_hash: chosen.core_hash,
            recency: chosen.recency,
            days: chosen.days,
            incomplete_days: chosen.incomplete_days,
        })
    }
}

fn counts(series: &StoredSeries) -> BTreeMap<NaiveDate, DayCounts> {
    series
        .days
        .iter()
        .map(|(day, r)| (*day, DayCounts::new(r.n, r.k)))
        .collect()
}

/// Most recent generation stored under exactly `key`
fn explicit_candidate(all: &[StoredSeries], key: &str) -> Option<Candidate> {
    all.iter()
        .filter(|s| s.key.slice_key == key)
        .filter_map(|s| s.recency().map(|r| (r, s)))
        .max_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.key.core_hash.cmp(&b.key.core_hash)))
        .map(|(recency, series)| Candidate {
            source: SeriesSource::Explicit,
            core_hash: series.key.core_hash.clone(),
            recency,
            days: counts(series),
            incomplete_days: Vec::new(),
        })
}

/// Most recent complete single-generation partition for one declaration
fn mece_candidate(
    all: &[StoredSeries],
    dims: &SliceDims,
    decl: &MeceDeclaration,
) -> Option<Candidate> {
    let members = decl.member_keys(dims);

    // coreHash -> member value -> series
    let mut generations: BTreeMap<&str, BTreeMap<&str, &StoredSeries>> = BTreeMap::new();
    for (value, member_key) in &members {
        for series in all.iter().filter(|s| &s.key.slice_key == member_key) {
            generations
                .entry(series.key.core_hash.as_str())
                .or_default()
                .insert(value.as_str(), series);
        }
    }

    generations
        .into_iter()
        .filter(|(_, by_value)| by_value.len() == members.len())
        .filter_map(|(core_hash, by_value)| {
            let recency = by_value
                .values()
                .map(|s| s.recency())
                .collect::<Option<Vec<_>>>()?
                .into_iter()
                .min()?;
            Some((recency, core_hash, by_value))
        })
        .max_by(|(ra, ha, _), (rb, hb, _)| ra.cmp(rb).then_with(|| ha.cmp(hb)))
        .map(|(recency, core_hash, by_value)| {
            let member_days: Vec<BTreeMap<NaiveDate, DayCounts>> =
                by_value.values().map(|s| counts(s)).collect();
            let all_days: BTreeSet<NaiveDate> =
                member_days.iter().flat_map(|d| d.keys().copied()).collect();

            let mut days = BTreeMap::new();
            let mut incomplete_days = Vec::new();
            for day in all_days {
                let per_member: Option<Vec<DayCounts>> =
                    member_days.iter().map(|d| d.get(&day).copied()).collect();
                match per_member {
                    Some(values) => {
                        let total = values
                            .into_iter()
                            .fold(DayCounts::default(), DayCounts::add);
                        days.insert(day, total);
                    }
                    None => incomplete_days.push(day),
                }
            }

            Candidate {
                source: SeriesSource::Mece {
                    key: decl.key.clone(),
                },
                core_hash: core_hash.to_string(),
                recency,
                days,
                incomplete_days,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slices::record::SliceRecord;
    use crate::slices::store::MemorySliceStore;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, hour, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn put(store: &MemorySliceStore, key: &str, hash: &str, d: u32, n: u64, k: u64, hour: u32) {
        store
            .append(SliceRecord {
                param_id: "p".into(),
                core_hash: hash.into(),
                slice_key: key.into(),
                mode: SliceMode::Window,
                day: day(d),
                retrieved_at: at(hour),
                n,
                k,
            })
            .unwrap();
    }

    fn channel() -> Vec<MeceDeclaration> {
        vec![MeceDeclaration::new("channel", ["a", "b", "c", "d"])]
    }

    fn fill_mece(store: &MemorySliceStore, hash: &str, hour: u32) {
        put(store, "context(channel:a)", hash, 1, 11, 7, hour);
        put(store, "context(channel:b)", hash, 1, 0, 0, hour);
        put(store, "context(channel:c)", hash, 1, 29, 18, hour);
        put(store, "context(channel:d)", hash, 1, 206, 120, hour);
    }

    #[test]
    fn test_mece_sum_saturates_on_overflow() {
        let store = MemorySliceStore::new();
        put(&store, "context(channel:a)", "h", 1, u64::MAX - 1, 5, 1);
        put(&store, "context(channel:b)", "h", 1, 10, 5, 1);
        put(&store, "context(channel:c)", "h", 1, 1, 0, 1);
        put(&store, "context(channel:d)", "h", 1, 1, 0, 1);
        let mece = channel();
        let series = SliceSelector::new(&store, &mece)
            .select("p", &SliceDims::none(), SliceMode::Window)
            .unwrap();
        assert_eq!(series.days[&day(1)], DayCounts::new(u64::MAX, 10));
        assert_eq!(
            DayCounts::new(u64::MAX, u64::MAX).add(DayCounts::new(1, 1)),
            DayCounts::new(u64::MAX, u64::MAX)
        );
    }

    #[test]
    fn test_mece_sum() {
        let store = MemorySliceStore::new();
        fill_mece(&store, "h", 1);
        let mece = channel();
        let series = SliceSelector::new(&store, &mece)
            .select("p", &SliceDims::none(), SliceMode::Window)
            .unwrap();
        assert_eq!(series.days[&day(1)], DayCounts::new(246, 145));
        assert_eq!(series.source, SeriesSource::Mece { key: "channel".into() });
    }

    #[test]
    fn test_fresher_explicit_beats_mece() {
        let store = MemorySliceStore::new();
        fill_mece(&store, "h", 1);
        put(&store, "", "h", 1, 250, 150, 2);
        let mece = channel();
        let series = SliceSelector::new(&store, &mece)
            .select("p", &SliceDims::none(), SliceMode::Window)
            .unwrap();
        assert_eq!(series.source, SeriesSource::Explicit);
        assert_eq!(series.days[&day(1)], DayCounts::new(250, 150));
    }

    #[test]
    fn test_tie_prefers_explicit() {
        let store = MemorySliceStore::new();
        fill_mece(&store, "h", 3);
        put(&store, "", "h", 1, 250, 150, 3);
        let mece = channel();
        let series = SliceSelector::new(&store, &mece)
            .select("p", &SliceDims::none(), SliceMode::Window)
            .unwrap();
        assert_eq!(series.source, SeriesSource::Explicit);
    }

    #[test]
    fn test_stalest_member_sets_mece_recency() {
        let store = MemorySliceStore::new();
        fill_mece(&store, "h", 5);
        put(&store, "context(channel:b)", "h", 2, 1, 1, 0);
        put(&store, "", "h", 1, 250, 150, 4);
        let mece = channel();
        let series = SliceSelector::new(&store, &mece)
            .select("p", &SliceDims::none(), SliceMode::Window)
            .unwrap();
        // member b's latest retrieval is still hour 5; recency min is 5 > 4
        assert_eq!(series.source, SeriesSource::Mece { key: "channel".into() });
        assert_eq!(series.incomplete_days, vec![day(2)]);
    }

    #[test]
    fn test_incomplete_generation_skipped() {
        let store = MemorySliceStore::new();
        fill_mece(&store, "old", 1);
        put(&store, "context(channel:a)", "new", 1, 1, 1, 9);
        let mece = channel();
        let series = SliceSelector::new(&store, &mece)
            .select("p", &SliceDims::none(), SliceMode::Window)
            .unwrap();
        assert_eq!(series.core_hash, "old");
    }

    #[test]
    fn test_contexted_query_uses_explicit_slice() {
        let store = MemorySliceStore::new();
        fill_mece(&store, "h", 1);
        let mece = channel();
        let dims = SliceDims::none().with_context("channel", "c");
        let series = SliceSelector::new(&store, &mece)
            .select("p", &dims, SliceMode::Window)
            .unwrap();
        assert_eq!(series.totals(), DayCounts::new(29, 18));
    }

    #[test]
    fn test_nothing_to_select() {
        let store = MemorySliceStore::new();
        let err = SliceSelector::new(&store, &[])
            .select("p", &SliceDims::none(), SliceMode::Cohort)
            .unwrap_err();
        assert_eq!(err.code().code(), "DQ_SLICE_NOT_FOUND");
    }
}
