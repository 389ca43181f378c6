//! The upstream data seam for stream processing.
//!
//! The unified processor fetches payloads through this trait; the coaching
//! crate adapts the provider client onto it, and tests supply canned data.

use async_trait::async_trait;

use cadence_core::{Lap, Resolution, StreamSet, StreamType};

use crate::error::Result;

/// Fetches stream payloads and lap boundaries for one athlete.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Fetch the requested stream types at the given resolution.
    async fn streams(
        &self,
        activity_id: i64,
        types: &[StreamType],
        resolution: Resolution,
    ) -> Result<StreamSet>;

    /// Fetch the provider's lap boundaries, empty when none exist.
    async fn laps(&self, activity_id: i64) -> Result<Vec<Lap>>;
}
