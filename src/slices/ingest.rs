//! Connector responses into slice records
//!
//! Connectors live outside the engine. They receive a `ProviderQuery` and
//! return per-day counts together with the signature of the query they
//! actually ran; that signature becomes the records' `coreHash`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::dims::SliceDims;
use super::errors::{SliceError, SliceResult};
use super::record::SliceRecord;
use super::store::{AppendOutcome, SliceStore};
use crate::compiler::ProviderQuery;
use crate::dsl::SliceMode;
use crate::observability::{log_event_with_fields, Event};

/// One day of a connector response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDay {
    pub date: NaiveDate,
    pub n: u64,
    pub k: u64,
}

/// `retrieve(ProviderQuery)` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorResponse {
    pub per_day: Vec<ResponseDay>,
    pub retrieved_at: DateTime<Utc>,
    pub query_signature: String,
}

/// External data source contract; implemented by callers
pub trait Connector {
    fn retrieve(&self, query: &ProviderQuery) -> SliceResult<ConnectorResponse>;
}

/// Counts of what an ingest did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub inserted: usize,
    pub replaced: usize,
}

/// Converts a response into records and appends them.
///
/// Every record is validated before the first append, so a bad day
/// rejects the whole response and nothing is written.
pub fn ingest(
    store: &dyn SliceStore,
    response: &ConnectorResponse,
    param_id: &str,
    dims: &SliceDims,
    mode: SliceMode,
) -> SliceResult<IngestSummary> {
    if response.query_signature.trim().is_empty() {
        return Err(SliceError::connector_failed("response has no querySignature"));
    }

    let slice_key = dims.key();
    let records: Vec<SliceRecord> = response
        .per_day
        .iter()
        .map(|d| SliceRecord {
            param_id: param_id.to_string(),
            core_hash: response.query_signature.clone(),
            slice_key: slice_key.clone(),
            mode,
            day: d.date,
            retrieved_at: response.retrieved_at,
            n: d.n,
            k: d.k,
        })
        .collect();

    for record in &records {
        record.validate()?;
    }

    let mut summary = IngestSummary::default();
    for outcome in store.append_all(records)? {
        match outcome {
            AppendOutcome::Inserted => summary.inserted += 1,
            AppendOutcome::Replaced => summary.replaced += 1,
        }
    }
    Ok(summary)
}

/// Runs a compiled query through a connector and stores the result.
///
/// A response whose signature differs from the compiled query is still
/// stored under the connector's signature (it is what actually ran) and a
/// warning is logged.
pub fn fetch_and_store(
    connector: &dyn Connector,
    store: &dyn SliceStore,
    query: &ProviderQuery,
    param_id: &str,
    dims: &SliceDims,
) -> SliceResult<IngestSummary> {
    let mode = query
        .mode
        .ok_or_else(|| SliceError::connector_failed("query has no cohort() or window() mode"))?;
    let response = connector.retrieve(query)?;
    let expected = query.signature();
    if response.query_signature != expected {
        log_event_with_fields(
            Event::SignatureMismatch,
            &[
                ("param_id", param_id),
                ("expected", expected.as_str()),
                ("received", response.query_signature.as_str()),
            ],
        );
    }
    ingest(store, &response, param_id, dims, mode)
}
