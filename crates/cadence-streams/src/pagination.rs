//! Pagination arithmetic for stream payloads.
//!
//! Pure calculations converting a context-token budget and a request into a
//! concrete page size, token estimate, page count, and index slice.  The
//! unified processor owns the fetching; everything here is deterministic.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Knobs for the pagination calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Total context-token ceiling.
    pub max_context_tokens: usize,
    /// Converts character counts into token estimates.
    pub token_per_char_ratio: f64,
    /// Page size used when the caller does not specify one.
    pub default_page_size: usize,
    /// Upper bound on any page size.
    pub max_page_size: usize,
    /// Lower bound the optimal-size mapping saturates at.
    pub min_page_size: usize,
    /// Average rendered characters per data point, per stream type.
    pub chars_per_point: f64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 15_000,
            token_per_char_ratio: 0.25,
            default_page_size: 1_000,
            max_page_size: 5_000,
            min_page_size: 100,
            chars_per_point: 8.0,
        }
    }
}

impl From<&cadence_core::CoachConfig> for PaginationConfig {
    fn from(config: &cadence_core::CoachConfig) -> Self {
        Self {
            max_context_tokens: config.max_context_tokens,
            token_per_char_ratio: config.token_per_char_ratio,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            ..Self::default()
        }
    }
}

/// Fraction of the context budget considered "plenty": at or above it the
/// calculator hands out the maximum page size.
const COMFORT_FRACTION: f64 = 0.8;

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Pagination calculator bound to one configuration.
#[derive(Debug, Clone)]
pub struct PaginationCalculator {
    config: PaginationConfig,
}

impl PaginationCalculator {
    /// Create a calculator for the given configuration.
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Tokens left in the budget after the current context.
    pub fn available_tokens(&self, current_context_tokens: usize) -> usize {
        self.config
            .max_context_tokens
            .saturating_sub(current_context_tokens)
    }

    /// Optimal page size for the remaining budget.
    ///
    /// Saturating piecewise mapping: with at least [`COMFORT_FRACTION`] of
    /// the ceiling available the maximum page size is used; below that the
    /// size shrinks proportionally down to the configured floor.
    pub fn optimal_page_size(&self, available_tokens: usize) -> usize {
        let comfort = (self.config.max_context_tokens as f64 * COMFORT_FRACTION).max(1.0);

        if available_tokens as f64 >= comfort {
            return self.config.max_page_size;
        }

        let scaled = (self.config.max_page_size as f64 * available_tokens as f64 / comfort) as usize;
        scaled.clamp(self.config.min_page_size, self.config.max_page_size)
    }

    /// Estimated tokens for rendering `page_size` points across
    /// `stream_type_count` types.
    pub fn estimate_tokens(&self, page_size: usize, stream_type_count: usize) -> usize {
        let chars = page_size as f64 * stream_type_count as f64 * self.config.chars_per_point;
        (chars * self.config.token_per_char_ratio).ceil() as usize
    }

    /// Total pages needed for `total_samples` at `page_size`.
    pub fn total_pages(&self, total_samples: usize, page_size: usize) -> usize {
        if total_samples == 0 || page_size == 0 {
            return 1;
        }
        total_samples.div_ceil(page_size)
    }

    /// Index bounds `[start, end)` for a 1-based page number.
    ///
    /// Page 1 starts at sample 0; the final page's end equals the total.
    pub fn page_bounds(
        &self,
        page_number: usize,
        page_size: usize,
        total_samples: usize,
    ) -> Result<(usize, usize)> {
        if page_number == 0 || page_size == 0 {
            return Err(StreamError::PaginationFailure {
                reason: format!("page {page_number} with page size {page_size} is not addressable"),
            });
        }

        let total_pages = self.total_pages(total_samples, page_size);
        if page_number > total_pages {
            return Err(StreamError::InvalidRequest {
                reason: format!("page {page_number} is out of range (1..={total_pages})"),
            });
        }

        let start = (page_number - 1) * page_size;
        let end = (start + page_size).min(total_samples);
        Ok((start, end))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> PaginationCalculator {
        PaginationCalculator::new(PaginationConfig::default())
    }

    #[test]
    fn plenty_of_context_gives_max_page_size() {
        let calc = calculator();
        // 80% of 15000 = 12000.
        assert_eq!(calc.optimal_page_size(12_000), 5_000);
        assert_eq!(calc.optimal_page_size(15_000), 5_000);
    }

    #[test]
    fn optimal_page_size_under_tight_context() {
        // max_context 15000, ratio 0.25, default 1000, max 5000, current 14900.
        let calc = calculator();
        let available = calc.available_tokens(14_900);
        assert_eq!(available, 100);

        let page_size = calc.optimal_page_size(available);
        assert!(
            (100..=200).contains(&page_size),
            "page size {page_size} outside [100, 200]"
        );
    }

    #[test]
    fn optimal_page_size_shrinks_monotonically() {
        let calc = calculator();
        let mut last = usize::MAX;
        for available in [12_000, 9_000, 6_000, 3_000, 500, 0] {
            let size = calc.optimal_page_size(available);
            assert!(size <= last);
            assert!(size >= 100);
            last = size;
        }
    }

    #[test]
    fn token_estimate_scales_with_inputs() {
        let calc = calculator();
        // 1000 points × 4 types × 8 chars × 0.25 tokens/char.
        assert_eq!(calc.estimate_tokens(1_000, 4), 8_000);
        assert_eq!(calc.estimate_tokens(500, 4), 4_000);
        assert_eq!(calc.estimate_tokens(0, 4), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let calc = calculator();
        assert_eq!(calc.total_pages(10_000, 1_000), 10);
        assert_eq!(calc.total_pages(10_001, 1_000), 11);
        assert_eq!(calc.total_pages(999, 1_000), 1);
        assert_eq!(calc.total_pages(0, 1_000), 1);
    }

    #[test]
    fn page_bounds_cover_whole_range() {
        let calc = calculator();
        let total = 2_500;
        let page_size = 1_000;

        assert_eq!(calc.page_bounds(1, page_size, total).unwrap(), (0, 1_000));
        assert_eq!(calc.page_bounds(2, page_size, total).unwrap(), (1_000, 2_000));
        // The last page ends exactly at the total.
        assert_eq!(calc.page_bounds(3, page_size, total).unwrap(), (2_000, 2_500));
    }

    #[test]
    fn out_of_range_page_rejected() {
        let calc = calculator();
        assert!(matches!(
            calc.page_bounds(4, 1_000, 2_500),
            Err(StreamError::InvalidRequest { .. })
        ));
        assert!(matches!(
            calc.page_bounds(0, 1_000, 2_500),
            Err(StreamError::PaginationFailure { .. })
        ));
    }

    #[test]
    fn full_size_page_equals_single_page() {
        let calc = calculator();
        let total = 1_234;
        assert_eq!(calc.total_pages(total, total), 1);
        assert_eq!(calc.page_bounds(1, total, total).unwrap(), (0, total));
    }
}
