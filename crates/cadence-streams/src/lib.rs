//! Stream statistics and context-budgeted processing for Cadence.
//!
//! ## Modules
//!
//! - [`stats`] -- per-metric, boolean, and location statistics.
//! - [`features`] -- trends, spikes, inflection points, derived features.
//! - [`laps`] -- provider-lap and distance-split analysis.
//! - [`pagination`] -- page sizing and slicing arithmetic.
//! - [`summary`] -- secondary-model summaries of stream tables.
//! - [`processor`] -- the unified mode router with fallback.
//! - [`render`] -- pure text rendering of typed results.
//! - [`source`] -- the upstream data seam.
//! - [`error`] -- the stream-processing error taxonomy.

pub mod error;
pub mod features;
pub mod laps;
pub mod pagination;
pub mod processor;
pub mod render;
pub mod source;
pub mod stats;
pub mod summary;

// Re-export the most commonly used types at the crate root.
pub use error::{Result, StreamError};
pub use features::{DerivedFeatures, InflectionKind, InflectionPoint, Spike, Trend, TrendDirection, extract_features};
pub use laps::{LapAnalysis, LapSplit, analyze_laps, segment_by_distance};
pub use pagination::{PaginationCalculator, PaginationConfig};
pub use processor::{PaginatedStreamRequest, ProcessingMode, StreamPage, UnifiedStreamProcessor};
pub use render::{
    navigation_instructions, render_activities, render_activity_details, render_derived_features,
    render_profile, render_stream_data,
};
pub use source::StreamSource;
pub use summary::{SummaryOutcome, SummaryProcessor, render_table};
