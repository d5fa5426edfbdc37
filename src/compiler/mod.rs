//! Capability-aware query compilation
//!
//! Constraints are rendered into provider-neutral `ProviderQuery` values
//! shaped by a validated `CapabilityDescriptor`. Connectors (outside this
//! crate) execute them.

mod capability;
#[allow(clippy::module_inception)]
mod compiler;
mod errors;
mod query;

pub use capability::{CapabilityDescriptor, CapabilityRegistry, ProviderType};
pub use compiler::{QueryCompiler, DEFAULT_UPSTREAM_LOOKBACK_DAYS, MAX_ARITHMETIC_EXCLUSIONS};
pub use errors::{CompileError, CompileResult};
pub use query::{
    Approximation, FunnelStep, FunnelTerm, PropertyFilter, ProviderQuery, SegmentFilter, TermSign,
};
