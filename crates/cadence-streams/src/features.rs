//! Feature extraction over time-series streams.
//!
//! Trends, spikes, inflection points, activity totals, and the assembled
//! [`DerivedFeatures`] report.  Everything here is pure computation; the
//! inflection pass fans out over rayon for large series.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use cadence_core::{Lap, StreamSet};

use crate::laps::{LapAnalysis, analyze_laps, segment_by_distance};
use crate::stats::{BoolStats, LocationStats, MetricStats, bool_stats, location_stats, metric_stats, to_f64};

/// Series length above which the inflection scan is chunked across rayon
/// workers.
const PARALLEL_THRESHOLD: usize = 2_048;

/// Chunk length for the parallel inflection scan.
const PARALLEL_CHUNK: usize = 1_024;

/// Rolling-window length for normalized power, at 1 Hz sampling.
const NORMALIZED_POWER_WINDOW: usize = 30;

// ---------------------------------------------------------------------------
// Inflection points
// ---------------------------------------------------------------------------

/// How the slope changed at an inflection point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InflectionKind {
    /// Rising slope turned falling.
    Peak,
    /// Falling slope turned rising.
    Valley,
    /// Slope steepened upward.
    Increase,
    /// Slope steepened downward.
    Decrease,
}

/// A point where the local slope changed by more than the threshold.
#[derive(Debug, Clone, Serialize)]
pub struct InflectionPoint {
    pub index: usize,
    pub value: f64,
    pub kind: InflectionKind,
    /// Absolute slope change at this point.
    pub magnitude: f64,
}

/// Windowed slope-change detection.
///
/// For each `i` in `[window, n - window)`, compares the slope over
/// `[i - window, i]` with the slope over `[i, i + window]`; a change larger
/// than `threshold` emits a point.  Series longer than the parallel
/// threshold are scanned chunkwise on rayon workers; results are re-sorted
/// by index so output order is stable either way.
pub fn detect_inflections(values: &[f64], window: usize, threshold: f64) -> Vec<InflectionPoint> {
    if window == 0 || values.len() < window * 2 + 1 {
        return Vec::new();
    }

    let scan_range = window..(values.len() - window);

    if values.len() <= PARALLEL_THRESHOLD {
        return scan_range
            .filter_map(|i| inflection_at(values, i, window, threshold))
            .collect();
    }

    let indices: Vec<usize> = scan_range.collect();
    let mut points: Vec<InflectionPoint> = indices
        .par_chunks(PARALLEL_CHUNK)
        .flat_map_iter(|chunk| {
            chunk
                .iter()
                .filter_map(|&i| inflection_at(values, i, window, threshold))
                .collect::<Vec<_>>()
        })
        .collect();

    points.sort_by_key(|p| p.index);
    points
}

fn inflection_at(
    values: &[f64],
    i: usize,
    window: usize,
    threshold: f64,
) -> Option<InflectionPoint> {
    let slope_before = (values[i] - values[i - window]) / window as f64;
    let slope_after = (values[i + window] - values[i]) / window as f64;
    let change = slope_after - slope_before;

    if change.abs() <= threshold {
        return None;
    }

    let kind = if slope_before > 0.0 && slope_after < 0.0 {
        InflectionKind::Peak
    } else if slope_before < 0.0 && slope_after > 0.0 {
        InflectionKind::Valley
    } else if change > 0.0 {
        InflectionKind::Increase
    } else {
        InflectionKind::Decrease
    };

    Some(InflectionPoint {
        index: i,
        value: values[i],
        kind,
        magnitude: change.abs(),
    })
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

/// Direction of a trend segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// A contiguous segment classified by its moving-average slope.
#[derive(Debug, Clone, Serialize)]
pub struct Trend {
    pub start_index: usize,
    pub end_index: usize,
    pub direction: TrendDirection,
    /// Smoothed per-sample slope across the segment.
    pub slope: f64,
    /// Fraction of consecutive samples agreeing with the direction.
    pub confidence: f64,
}

/// Number of segments the series is split into for trend classification.
const TREND_SEGMENTS: usize = 4;

/// Moving-average window for trend smoothing.
const TREND_WINDOW: usize = 5;

/// Classify the series into per-segment trends.
pub fn detect_trends(values: &[f64]) -> Vec<Trend> {
    if values.len() < TREND_WINDOW * 2 {
        return Vec::new();
    }

    let smoothed = moving_average(values, TREND_WINDOW);
    let segment_len = (smoothed.len() / TREND_SEGMENTS).max(TREND_WINDOW);

    // Slopes below this fraction of the mean magnitude count as stable.
    let mean_abs = smoothed.iter().map(|v| v.abs()).sum::<f64>() / smoothed.len() as f64;
    let stable_threshold = mean_abs * 0.001;

    let mut trends = Vec::new();
    let mut start = 0;
    while start < smoothed.len() {
        let end = (start + segment_len).min(smoothed.len());
        if end - start < 2 {
            break;
        }

        let segment = &smoothed[start..end];
        let slope = (segment[segment.len() - 1] - segment[0]) / (segment.len() - 1) as f64;

        let direction = if slope > stable_threshold {
            TrendDirection::Increasing
        } else if slope < -stable_threshold {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        let agreeing = segment
            .windows(2)
            .filter(|w| match direction {
                TrendDirection::Increasing => w[1] >= w[0],
                TrendDirection::Decreasing => w[1] <= w[0],
                TrendDirection::Stable => (w[1] - w[0]).abs() <= stable_threshold,
            })
            .count();
        let confidence = agreeing as f64 / (segment.len() - 1) as f64;

        trends.push(Trend {
            start_index: start,
            end_index: end - 1,
            direction,
            slope,
            confidence,
        });
        start = end;
    }

    trends
}

fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.len() < window {
        return values.to_vec();
    }
    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }
    out
}

// ---------------------------------------------------------------------------
// Spikes
// ---------------------------------------------------------------------------

/// A run of samples deviating from the mean by more than k·σ.
#[derive(Debug, Clone, Serialize)]
pub struct Spike {
    /// Index of the first sample in the run.
    pub index: usize,
    /// Value at the first sample.
    pub value: f64,
    /// Signed deviation from the mean at the first sample.
    pub deviation: f64,
    /// Deviation expressed in standard deviations.
    pub magnitude: f64,
    /// Number of consecutive flagged samples.
    pub duration: usize,
}

/// Flag samples deviating from the series mean by more than `k` standard
/// deviations; consecutive flagged samples merge into one spike.
pub fn detect_spikes(values: &[f64], k: f64) -> Vec<Spike> {
    if values.len() < 2 {
        return Vec::new();
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return Vec::new();
    }

    let mut spikes: Vec<Spike> = Vec::new();
    let mut current: Option<Spike> = None;

    for (i, &v) in values.iter().enumerate() {
        let deviation = v - mean;
        if deviation.abs() > k * std_dev {
            match &mut current {
                Some(spike) => spike.duration += 1,
                None => {
                    current = Some(Spike {
                        index: i,
                        value: v,
                        deviation,
                        magnitude: deviation.abs() / std_dev,
                        duration: 1,
                    });
                }
            }
        } else if let Some(spike) = current.take() {
            spikes.push(spike);
        }
    }
    if let Some(spike) = current {
        spikes.push(spike);
    }

    spikes
}

/// Default spike sensitivity.
pub const DEFAULT_SPIKE_SIGMA: f64 = 2.0;

// ---------------------------------------------------------------------------
// Activity totals
// ---------------------------------------------------------------------------

/// Normalized power: 30-sample rolling average, 4th powers, mean, 4th root.
pub fn normalized_power(watts: &[i64]) -> Option<f64> {
    if watts.len() < NORMALIZED_POWER_WINDOW {
        return None;
    }
    let values = to_f64(watts);
    let rolling = moving_average(&values, NORMALIZED_POWER_WINDOW);
    let mean_fourth = rolling.iter().map(|v| v.powi(4)).sum::<f64>() / rolling.len() as f64;
    Some(mean_fourth.powf(0.25))
}

/// Elevation gain and loss: sums of positive and negative altitude deltas.
pub fn elevation_gain_loss(altitude: &[f64]) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    for w in altitude.windows(2) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            gain += delta;
        } else {
            loss += -delta;
        }
    }
    (gain, loss)
}

/// Percentage of samples marked as moving, in `[0, 100]`.
pub fn moving_time_pct(moving: &[bool]) -> f64 {
    if moving.is_empty() {
        return 0.0;
    }
    moving.iter().filter(|m| **m).count() as f64 / moving.len() as f64 * 100.0
}

// ---------------------------------------------------------------------------
// Derived features
// ---------------------------------------------------------------------------

/// Headline totals for the analyzed slice.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    pub sample_count: usize,
    /// Elapsed seconds between the first and last time sample.
    pub duration_secs: i64,
    /// Final cumulative distance, meters.
    pub total_distance_m: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub moving_time_pct: f64,
    pub normalized_power: Option<f64>,
    /// Stream types present in the payload.
    pub stream_types: Vec<String>,
}

/// One representative sample row for the report.
#[derive(Debug, Clone, Serialize)]
pub struct SamplePoint {
    pub index: usize,
    pub time: Option<i64>,
    pub distance: Option<f64>,
    pub heartrate: Option<i64>,
    pub watts: Option<i64>,
    pub velocity: Option<f64>,
    pub altitude: Option<f64>,
}

/// The full derived-features report for one stream slice.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedFeatures {
    pub summary: StreamSummary,
    /// Per-metric statistics keyed by stream name.
    pub metrics: BTreeMap<String, MetricStats>,
    pub moving: Option<BoolStats>,
    pub location: Option<LocationStats>,
    pub trends: BTreeMap<String, Vec<Trend>>,
    pub spikes: BTreeMap<String, Vec<Spike>>,
    pub inflections: BTreeMap<String, Vec<InflectionPoint>>,
    pub laps: Option<LapAnalysis>,
    /// Up to ten evenly spaced representative samples.
    pub samples: Vec<SamplePoint>,
}

/// Inflection scan window, in samples.
const INFLECTION_WINDOW: usize = 10;

/// Maximum representative sample rows in the report.
const MAX_SAMPLES: usize = 10;

/// Assemble the full derived-features report.
///
/// When provider laps are given they drive the lap analysis; otherwise the
/// distance stream (when present) is segmented into 1 km splits.
pub fn extract_features(set: &StreamSet, provider_laps: Option<&[Lap]>) -> DerivedFeatures {
    let mut metrics = BTreeMap::new();
    let mut trends = BTreeMap::new();
    let mut spikes = BTreeMap::new();
    let mut inflections = BTreeMap::new();

    let numeric_series: Vec<(&str, Vec<f64>)> = [
        ("heartrate", set.heartrate.as_ref().map(|v| to_f64(v))),
        ("watts", set.watts.as_ref().map(|v| to_f64(v))),
        ("cadence", set.cadence.as_ref().map(|v| to_f64(v))),
        ("velocity_smooth", set.velocity_smooth.clone()),
        ("altitude", set.altitude.clone()),
        ("temp", set.temp.as_ref().map(|v| to_f64(v))),
        ("grade_smooth", set.grade_smooth.clone()),
    ]
    .into_iter()
    .filter_map(|(name, series)| series.map(|s| (name, s)))
    .collect();

    for (name, series) in &numeric_series {
        if let Some(stats) = metric_stats(series) {
            // Inflection sensitivity scales with the metric's spread.
            let threshold = (stats.std_dev / INFLECTION_WINDOW as f64).max(f64::EPSILON);
            metrics.insert((*name).to_owned(), stats);
            trends.insert((*name).to_owned(), detect_trends(series));
            spikes.insert(
                (*name).to_owned(),
                detect_spikes(series, DEFAULT_SPIKE_SIGMA),
            );
            inflections.insert(
                (*name).to_owned(),
                detect_inflections(series, INFLECTION_WINDOW, threshold),
            );
        }
    }

    let laps = match provider_laps {
        Some(laps) if !laps.is_empty() => analyze_laps(set, laps),
        _ => segment_by_distance(set, 1_000.0).and_then(|splits| analyze_laps(set, &splits)),
    };

    DerivedFeatures {
        summary: build_summary(set),
        metrics,
        moving: set.moving.as_deref().and_then(bool_stats),
        location: set.latlng.as_deref().and_then(location_stats),
        trends,
        spikes,
        inflections,
        laps,
        samples: sample_points(set),
    }
}

fn build_summary(set: &StreamSet) -> StreamSummary {
    let duration_secs = set.time_range().map(|(start, end)| end - start).unwrap_or(0);
    let total_distance_m = set
        .distance
        .as_ref()
        .and_then(|d| d.last().copied())
        .unwrap_or(0.0);
    let (elevation_gain_m, elevation_loss_m) = set
        .altitude
        .as_deref()
        .map(elevation_gain_loss)
        .unwrap_or((0.0, 0.0));

    StreamSummary {
        sample_count: set.len(),
        duration_secs,
        total_distance_m,
        elevation_gain_m,
        elevation_loss_m,
        moving_time_pct: set.moving.as_deref().map(moving_time_pct).unwrap_or(0.0),
        normalized_power: set.watts.as_deref().and_then(normalized_power),
        stream_types: set.present_types().iter().map(|t| t.to_string()).collect(),
    }
}

fn sample_points(set: &StreamSet) -> Vec<SamplePoint> {
    let total = set.len();
    if total == 0 {
        return Vec::new();
    }

    let step = (total / MAX_SAMPLES).max(1);
    (0..total)
        .step_by(step)
        .take(MAX_SAMPLES)
        .map(|i| SamplePoint {
            index: i,
            time: set.time.as_ref().map(|v| v[i]),
            distance: set.distance.as_ref().map(|v| v[i]),
            heartrate: set.heartrate.as_ref().map(|v| v[i]),
            watts: set.watts.as_ref().map(|v| v[i]),
            velocity: set.velocity_smooth.as_ref().map(|v| v[i]),
            altitude: set.altitude.as_ref().map(|v| v[i]),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
