//! Lap analysis.
//!
//! When the provider supplies lap boundaries they are used directly;
//! otherwise the cumulative distance stream is cut into equal splits via
//! binary search.  Per-lap metrics come from slicing the stream payload at
//! the lap boundaries.

use serde::Serialize;

use cadence_core::{Lap, StreamSet};

use crate::stats::{metric_stats, to_f64};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Stream-derived metrics for one lap.
#[derive(Debug, Clone, Serialize)]
pub struct LapSplit {
    /// 1-based lap number.
    pub number: i64,
    pub start_index: usize,
    pub end_index: usize,
    pub distance_m: f64,
    pub duration_secs: i64,
    pub average_speed_mps: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub average_watts: Option<f64>,
}

/// Cross-lap comparison report.
#[derive(Debug, Clone, Serialize)]
pub struct LapAnalysis {
    pub laps: Vec<LapSplit>,
    /// 1-based lap numbers of the extremes (by average speed).
    pub fastest_lap: Option<i64>,
    pub slowest_lap: Option<i64>,
    /// Extremes by average power and heart rate.
    pub highest_power_lap: Option<i64>,
    pub lowest_power_lap: Option<i64>,
    pub highest_heartrate_lap: Option<i64>,
    pub lowest_heartrate_lap: Option<i64>,
    /// Coefficients of variation across lap averages.
    pub speed_variation: f64,
    pub heartrate_variation: f64,
    pub power_variation: f64,
    /// `max(0, 1 - summed variations)`: 1.0 is perfectly even pacing.
    pub consistency_score: f64,
}

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

/// Cut the cumulative distance stream into equal `split_m` segments.
///
/// Boundaries are located with binary search in the cumulative array;
/// returns `None` when no distance stream is present or the activity is
/// shorter than one split.
pub fn segment_by_distance(set: &StreamSet, split_m: f64) -> Option<Vec<Lap>> {
    let distance = set.distance.as_ref()?;
    if distance.is_empty() || split_m <= 0.0 {
        return None;
    }

    let total = *distance.last()?;
    let full_splits = (total / split_m) as usize;
    if full_splits == 0 {
        return None;
    }

    let mut laps: Vec<Lap> = Vec::new();
    let mut start_index = 0usize;

    for lap in 1..=full_splits {
        let boundary = lap as f64 * split_m;
        let end_index = distance.partition_point(|d| *d < boundary).min(distance.len());
        if end_index > start_index {
            laps.push(make_lap(set, laps.len() as i64 + 1, start_index, end_index));
        }
        start_index = end_index;
    }

    // Leftover partial split becomes a final short lap.
    if start_index < distance.len() {
        laps.push(make_lap(set, laps.len() as i64 + 1, start_index, distance.len()));
    }

    Some(laps)
}

fn make_lap(set: &StreamSet, number: i64, start_index: usize, end_index: usize) -> Lap {
    let distance = set.distance.as_ref();
    let lap_distance = distance
        .map(|d| {
            let end = d[start_index..end_index].last().copied().unwrap_or(0.0);
            let start = if start_index == 0 { 0.0 } else { d[start_index - 1] };
            end - start
        })
        .unwrap_or(0.0);

    let moving_time = set
        .time
        .as_ref()
        .and_then(|t| {
            let slice = &t[start_index..end_index];
            Some(slice.last()? - slice.first()?)
        })
        .unwrap_or(0);

    Lap {
        lap_index: number,
        start_index,
        end_index,
        distance: lap_distance,
        moving_time,
        average_speed: None,
        average_heartrate: None,
        average_watts: None,
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Compute per-lap metrics and the cross-lap comparison.
///
/// Returns `None` when the boundaries do not map onto the payload (empty
/// laps, indices out of range).
pub fn analyze_laps(set: &StreamSet, laps: &[Lap]) -> Option<LapAnalysis> {
    if laps.is_empty() || set.is_empty() {
        return None;
    }
    let total = set.len();

    let splits: Vec<LapSplit> = laps
        .iter()
        .filter(|lap| lap.start_index < lap.end_index && lap.end_index <= total)
        .map(|lap| {
            let slice = set.slice(lap.start_index, lap.end_index);

            let duration_secs = slice
                .time_range()
                .map(|(start, end)| end - start)
                .unwrap_or(lap.moving_time);

            let average_speed_mps = lap.average_speed.or_else(|| {
                if duration_secs > 0 && lap.distance > 0.0 {
                    Some(lap.distance / duration_secs as f64)
                } else {
                    slice
                        .velocity_smooth
                        .as_deref()
                        .and_then(metric_stats)
                        .map(|s| s.mean)
                }
            });

            LapSplit {
                number: lap.lap_index.max(1),
                start_index: lap.start_index,
                end_index: lap.end_index,
                distance_m: lap.distance,
                duration_secs,
                average_speed_mps,
                average_heartrate: lap.average_heartrate.or_else(|| {
                    slice
                        .heartrate
                        .as_deref()
                        .and_then(|v| metric_stats(&to_f64(v)))
                        .map(|s| s.mean)
                }),
                average_watts: lap.average_watts.or_else(|| {
                    slice
                        .watts
                        .as_deref()
                        .and_then(|v| metric_stats(&to_f64(v)))
                        .map(|s| s.mean)
                }),
            }
        })
        .collect();

    if splits.is_empty() {
        return None;
    }

    let speed_variation = variation(&splits, |l| l.average_speed_mps);
    let heartrate_variation = variation(&splits, |l| l.average_heartrate);
    let power_variation = variation(&splits, |l| l.average_watts);
    let consistency_score =
        (1.0 - (speed_variation + heartrate_variation + power_variation)).max(0.0);

    Some(LapAnalysis {
        fastest_lap: extreme(&splits, |l| l.average_speed_mps, true),
        slowest_lap: extreme(&splits, |l| l.average_speed_mps, false),
        highest_power_lap: extreme(&splits, |l| l.average_watts, true),
        lowest_power_lap: extreme(&splits, |l| l.average_watts, false),
        highest_heartrate_lap: extreme(&splits, |l| l.average_heartrate, true),
        lowest_heartrate_lap: extreme(&splits, |l| l.average_heartrate, false),
        speed_variation,
        heartrate_variation,
        power_variation,
        consistency_score,
        laps: splits,
    })
}

/// Coefficient of variation across lap averages for one metric.
fn variation(splits: &[LapSplit], metric: impl Fn(&LapSplit) -> Option<f64>) -> f64 {
    let values: Vec<f64> = splits.iter().filter_map(metric).collect();
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean.abs()
}

/// Lap number holding the max (or min) of a metric.
fn extreme(
    splits: &[LapSplit],
    metric: impl Fn(&LapSplit) -> Option<f64>,
    max: bool,
) -> Option<i64> {
    let mut best: Option<(i64, f64)> = None;
    for split in splits {
        let Some(value) = metric(split) else { continue };
        best = match best {
            None => Some((split.number, value)),
            Some((_, current)) if (max && value > current) || (!max && value < current) => {
                Some((split.number, value))
            }
            keep => keep,
        };
    }
    best.map(|(number, _)| number)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
