//! Engine Error Types
//!
//! Unified error for operations that span subsystems (planning, the CLI).
//! Every variant keeps the stable code of the subsystem that raised it.

use thiserror::Error;

use crate::compiler::CompileError;
use crate::composer::ComposeError;
use crate::config::ConfigError;
use crate::denominator::DenominatorError;
use crate::dsl::DslError;
use crate::graph::GraphError;
use crate::msmdc::MsmdcError;
use crate::slices::SliceError;

/// Engine result type
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Dsl(#[from] DslError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Msmdc(#[from] MsmdcError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Denominator(#[from] DenominatorError),

    #[error(transparent)]
    Slice(#[from] SliceError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Get error code for CLI responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Dsl(e) => e.code(),
            Self::Graph(e) => e.code(),
            Self::Msmdc(e) => e.code(),
            Self::Compile(e) => e.code(),
            Self::Denominator(e) => e.code(),
            Self::Slice(e) => e.code().code(),
            Self::Compose(e) => e.code(),
            Self::Config(e) => e.code(),
        }
    }
}
