//! Coach loop error types.

use cadence_llm::LlmError;
use cadence_strava::StravaError;
use cadence_streams::StreamError;

/// Unified error type for the coaching loop.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    /// Request validation failed before any round ran.
    #[error("invalid coaching request: {reason}")]
    InvalidRequest { reason: String },

    /// The chat-completion provider failed irrecoverably.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The activity provider failed outside tool dispatch.
    #[error(transparent)]
    Strava(#[from] StravaError),

    /// Stream processing failed outside tool dispatch.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Every tool in a round failed with no earlier data to fall back on.
    #[error("tool round failed: {reason}")]
    ToolRoundFailed { reason: String },

    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal coach error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the coach crate.
pub type Result<T> = std::result::Result<T, CoachError>;
