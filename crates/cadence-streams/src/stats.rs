//! Per-metric descriptive statistics.
//!
//! Pure, deterministic functions from an array to a value; no I/O.  Numeric
//! metrics exclude zero samples when non-zero samples exist, so paused
//! segments do not dilute coaching metrics; an all-zero series is evaluated
//! as-is.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Numeric metrics
// ---------------------------------------------------------------------------

/// Descriptive statistics over one numeric metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Coefficient of variation: std-dev / |mean| when the mean is non-zero.
    pub variability: f64,
    pub range: f64,
    pub q25: f64,
    pub q75: f64,
    /// Number of samples the statistics were computed over.
    pub count: usize,
}

/// Compute [`MetricStats`] for a series, or `None` when it is empty.
pub fn metric_stats(values: &[f64]) -> Option<MetricStats> {
    if values.is_empty() {
        return None;
    }

    // Drop zeros when real samples exist; keep the series as-is otherwise.
    let nonzero: Vec<f64> = values.iter().copied().filter(|v| *v != 0.0).collect();
    let samples: &[f64] = if nonzero.is_empty() { values } else { &nonzero };

    let count = samples.len();
    let mean = samples.iter().sum::<f64>() / count as f64;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let std_dev = variance.sqrt();

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let min = sorted[0];
    let max = sorted[count - 1];

    Some(MetricStats {
        min,
        max,
        mean,
        median: percentile(&sorted, 50.0),
        std_dev,
        variability: if mean != 0.0 { std_dev / mean.abs() } else { 0.0 },
        range: max - min,
        q25: percentile(&sorted, 25.0),
        q75: percentile(&sorted, 75.0),
        count,
    })
}

/// Convert an integral series for statistics.
pub fn to_f64(values: &[i64]) -> Vec<f64> {
    values.iter().map(|v| *v as f64).collect()
}

/// Percentile with linear interpolation between neighboring sorted samples.
///
/// `sorted` must be sorted ascending; `p` is in `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

// ---------------------------------------------------------------------------
// Boolean metrics
// ---------------------------------------------------------------------------

/// Counts and percentages over a boolean series.
#[derive(Debug, Clone, Serialize)]
pub struct BoolStats {
    pub true_count: usize,
    pub false_count: usize,
    pub true_pct: f64,
    pub false_pct: f64,
}

/// Compute [`BoolStats`], or `None` for an empty series.
pub fn bool_stats(values: &[bool]) -> Option<BoolStats> {
    if values.is_empty() {
        return None;
    }
    let true_count = values.iter().filter(|v| **v).count();
    let false_count = values.len() - true_count;
    let total = values.len() as f64;
    Some(BoolStats {
        true_count,
        false_count,
        true_pct: true_count as f64 / total * 100.0,
        false_pct: false_count as f64 / total * 100.0,
    })
}

// ---------------------------------------------------------------------------
// Location metrics
// ---------------------------------------------------------------------------

/// Route summary over a coordinate series.
#[derive(Debug, Clone, Serialize)]
pub struct LocationStats {
    pub first: [f64; 2],
    pub last: [f64; 2],
    /// Bounding box: northernmost / southernmost latitude.
    pub north: f64,
    pub south: f64,
    /// Bounding box: easternmost / westernmost longitude.
    pub east: f64,
    pub west: f64,
    /// Samples with an actual GPS fix (not the (0, 0) placeholder).
    pub gps_points: usize,
}

/// Compute [`LocationStats`], or `None` when no coordinates are present.
pub fn location_stats(coords: &[[f64; 2]]) -> Option<LocationStats> {
    let first = *coords.first()?;
    let last = *coords.last()?;

    let mut stats = LocationStats {
        first,
        last,
        north: f64::NEG_INFINITY,
        south: f64::INFINITY,
        east: f64::NEG_INFINITY,
        west: f64::INFINITY,
        gps_points: 0,
    };

    for [lat, lng] in coords {
        if *lat == 0.0 && *lng == 0.0 {
            continue;
        }
        stats.gps_points += 1;
        stats.north = stats.north.max(*lat);
        stats.south = stats.south.min(*lat);
        stats.east = stats.east.max(*lng);
        stats.west = stats.west.min(*lng);
    }

    if stats.gps_points == 0 {
        stats.north = 0.0;
        stats.south = 0.0;
        stats.east = 0.0;
        stats.west = 0.0;
    }

    Some(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
