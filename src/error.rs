//! Engine error types
//!
//! Only configuration problems are hard failures. Model-level and
//! horizon-level failures are recovered locally by the pipeline with
//! documented fallbacks, and every degraded path sets the `degraded`
//! marker on its output instead of erroring.

use thiserror::Error;

/// Engine-wide result alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the prediction and signal-synthesis engine
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Business configuration is never silently renormalized; a weight
    /// table that does not sum to 1 is rejected up front.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("features unavailable for {symbol}: {reason}")]
    FeatureUnavailable { symbol: String, reason: String },

    #[error("model {model_id} failed: {reason}")]
    ModelFailure { model_id: String, reason: String },

    #[error("no surviving predictions for horizon {horizon}")]
    HorizonUnavailable { horizon: String },

    #[error("all models failed for {symbol}")]
    AllModelsFailed { symbol: String },

    #[error("collaborator lookup timed out after {timeout_secs}s: {lookup}")]
    LookupTimeout { lookup: String, timeout_secs: u64 },

    #[error("no signals supplied for conflict resolution")]
    EmptyTimeframeSet,
}

impl EngineError {
    /// Whether the pipeline may recover from this error with a fallback
    /// output. Configuration errors must surface to the caller.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::InvalidConfiguration(_))
    }
}
