//! Strava REST client for the Cadence coaching orchestrator.
//!
//! ## Modules
//!
//! - [`client`] -- the authenticated client with refresh-and-retry.
//! - [`rate_limit`] -- the process-wide sliding-window limiter.
//! - [`types`] -- wire-format decoding for streams and OAuth responses.
//! - [`error`] -- status-mapped error taxonomy.

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use client::{ActivityQuery, StravaClient, StravaConfig};
pub use error::{Result, StravaError};
pub use rate_limit::RateLimiter;
pub use types::{RawStream, RawStreamMap, TokenResponse, decode_streams};
