//! Typed errors for the newsdesk pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Only failures that
//! make a run impossible are errors here; degraded capabilities are reported
//! on the [`AnswerRecord`](crate::types::answer::AnswerRecord) instead.

use thiserror::Error;

/// Pipeline-level failures. No partial answer is produced for any of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The vector index (or the embedding needed to query it) is unreachable.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(#[source] CapabilityError),

    /// The article store could not be read.
    #[error("document store unavailable: {0}")]
    DocumentStoreUnavailable(#[source] CapabilityError),

    /// The raw query was empty or whitespace.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// The run was cancelled between or during stages.
    #[error("pipeline run cancelled")]
    Cancelled,

    /// Invalid pipeline configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Failure of a single call to an external capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The call did not finish within its time budget.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The service refused or failed the request.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CapabilityError {
    /// Shorthand for an `Unavailable` error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Shorthand for a `Malformed` error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for capability calls.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
