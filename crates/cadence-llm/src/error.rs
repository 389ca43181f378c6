//! Chat-completion error types.
//!
//! Errors carry enough classification for the coaching loop's degradation
//! policy: "unavailable" variants allow a graceful exit when data has already
//! been gathered, while the rest propagate.

/// Unified error type for the chat-completion client.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The provider is unreachable or returned a 5xx response.
    #[error("llm unavailable: {reason}")]
    Unavailable { reason: String },

    /// The request timed out at the network layer.
    #[error("llm network timeout")]
    NetworkTimeout,

    /// The provider throttled the request (429).
    #[error("llm rate limit exceeded")]
    RateLimited,

    /// The account has exhausted its quota.
    #[error("llm quota exceeded")]
    QuotaExceeded,

    /// The conversation does not fit in the model's context window.
    #[error("llm context window exceeded")]
    ContextExceeded,

    /// The request was rejected for another reason.
    #[error("llm request failed: {reason}")]
    RequestFailed { reason: String },

    /// The response or stream payload could not be parsed.
    #[error("llm response parse error: {reason}")]
    ParseFailed { reason: String },

    /// The SSE stream was interrupted mid-response.
    #[error("llm stream interrupted: {reason}")]
    StreamInterrupted { reason: String },

    /// The API key is missing.
    #[error("missing api key for chat-completion provider")]
    MissingApiKey,

    /// The caller dropped the output channel mid-stream.
    #[error("request cancelled by caller")]
    Cancelled,
}

impl LlmError {
    /// Whether the coaching loop may degrade gracefully on this error:
    /// connection failures, timeouts, and 5xx responses.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::NetworkTimeout | Self::StreamInterrupted { .. }
        )
    }
}

/// Convenience alias used throughout the llm crate.
pub type Result<T> = std::result::Result<T, LlmError>;

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkTimeout
        } else if err.is_connect() {
            Self::Unavailable {
                reason: err.to_string(),
            }
        } else {
            Self::RequestFailed {
                reason: err.to_string(),
            }
        }
    }
}
