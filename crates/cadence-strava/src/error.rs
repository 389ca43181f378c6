//! Provider client error types.
//!
//! Variants map one-to-one onto the HTTP status classes the provider
//! returns, which is what lets the refresh path decide whether a retry can
//! help.

/// Unified error type for the Strava client.
#[derive(Debug, thiserror::Error)]
pub enum StravaError {
    /// The process-wide sliding-window budget is exhausted; no HTTP was
    /// issued for this call.
    #[error("provider rate limit exceeded ({max} requests per {window_secs}s)")]
    RateLimitExceeded { max: usize, window_secs: u64 },

    /// 401 -- the access token has expired and should be refreshed.
    #[error("provider access token expired")]
    TokenExpired,

    /// 403 -- the token is present but rejected.
    #[error("provider access token invalid")]
    InvalidToken,

    /// 404 -- the resource does not exist or is not visible to this athlete.
    #[error("provider resource not found: {endpoint}")]
    NotFound { endpoint: String },

    /// 429 -- the provider itself throttled us.
    #[error("provider throttled the request")]
    Throttled,

    /// 5xx -- the provider is down or degraded.
    #[error("provider unavailable (status {status})")]
    ServiceUnavailable { status: u16 },

    /// The request timed out at the network layer.
    #[error("provider network timeout")]
    NetworkTimeout,

    /// Any other non-success status, with the provider's own error message
    /// when one could be parsed.
    #[error("provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded into the expected shape.
    #[error("provider response decode error: {reason}")]
    Decode { reason: String },

    /// The OAuth refresh exchange failed.
    #[error("token refresh failed: {reason}")]
    RefreshFailed { reason: String },

    /// Persisting refreshed credentials failed.
    #[error("credential persistence failed: {0}")]
    Persistence(#[from] cadence_core::RepoError),

    /// Transport-level failure that is not a timeout.
    #[error("provider request failed: {reason}")]
    RequestFailed { reason: String },
}

impl StravaError {
    /// Whether a single token refresh followed by a retry can resolve this.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::InvalidToken)
    }
}

/// Convenience alias used throughout the strava crate.
pub type Result<T> = std::result::Result<T, StravaError>;

impl From<reqwest::Error> for StravaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkTimeout
        } else {
            Self::RequestFailed {
                reason: err.to_string(),
            }
        }
    }
}
