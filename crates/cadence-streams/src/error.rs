//! Stream-processing error types.
//!
//! Failures inside the processing pipeline are wrapped with enough typed
//! context (activity, mode, data size, token budget) for the fallback logic
//! and for diagnostics, without the caller parsing strings.

use cadence_llm::LlmError;

/// Unified error type for the stream-processing crate.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Request validation failed.
    #[error("invalid stream request: {reason}")]
    InvalidRequest { reason: String },

    /// Page arithmetic produced an unusable result.
    #[error("pagination failure: {reason}")]
    PaginationFailure { reason: String },

    /// The upstream provider call failed.
    #[error("provider failure: {reason}")]
    StravaApiFailure { reason: String },

    /// The requested data does not fit in the available context budget.
    #[error(
        "context budget exceeded: ~{estimated_tokens} tokens needed, {available_tokens} available"
    )]
    ContextExceeded {
        estimated_tokens: usize,
        available_tokens: usize,
        /// Modes that would fit the budget, for the caller to suggest.
        suggested_modes: Vec<String>,
    },

    /// Feature extraction or formatting failed.
    #[error("processing failure: {reason}")]
    ProcessingFailure { reason: String },

    /// The payload violates the parallel-array invariant or is otherwise
    /// unusable.
    #[error("stream data corrupted: {reason}")]
    DataCorrupted { reason: String },

    /// The secondary model needed for this mode is unavailable.
    #[error("summary processor unavailable: {0}")]
    ProcessorUnavailable(#[source] LlmError),

    /// A failure wrapped with the request context it occurred in.
    #[error(
        "stream processing failed for activity {activity_id} ({mode} mode, {data_size} samples, \
         {available_tokens} tokens available): {source}"
    )]
    Context {
        activity_id: i64,
        mode: String,
        data_size: usize,
        available_tokens: usize,
        #[source]
        source: Box<StreamError>,
    },
}

impl StreamError {
    /// Wrap this error with the request context it occurred in.
    pub fn in_context(
        self,
        activity_id: i64,
        mode: impl Into<String>,
        data_size: usize,
        available_tokens: usize,
    ) -> Self {
        Self::Context {
            activity_id,
            mode: mode.into(),
            data_size,
            available_tokens,
            source: Box::new(self),
        }
    }
}

/// Convenience alias used throughout the streams crate.
pub type Result<T> = std::result::Result<T, StreamError>;
