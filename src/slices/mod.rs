//! Slice store and selector
//!
//! Cached per-day (n, k) series retrieved from analytics connectors.
//!
//! # Invariants
//!
//! - Records are append-only; same series/day is last-writer-wins
//! - A new coreHash starts a new generation; generations never mix
//! - A corrupt persisted record is excluded, never fatal to the store
//! - Reconciled series are deterministic for a given store state

mod checksum;
mod dims;
mod errors;
mod file_store;
mod ingest;
mod mece;
mod record;
mod selector;
mod store;

pub use dims::SliceDims;
pub use errors::{SliceError, SliceErrorCode, SliceResult};
pub use file_store::{CorruptLine, FileSliceStore};
pub use ingest::{fetch_and_store, ingest, Connector, ConnectorResponse, IngestSummary, ResponseDay};
pub use mece::MeceDeclaration;
pub use record::{SeriesKey, SliceRecord};
pub use selector::{DayCounts, ReconciledSeries, SeriesSource, SliceSelector};
pub use store::{AppendOutcome, MemorySliceStore, SliceStore, StoredSeries};
