//! Text rendering of typed results.
//!
//! Pure functions from domain structures to the display text the model (and
//! ultimately the athlete) sees.  No I/O, no state.

use cadence_core::{ActivityDetail, ActivitySummary, AthleteProfile, StreamSet, TrainingZones};

use crate::features::DerivedFeatures;
use crate::stats::{metric_stats, to_f64};

// ---------------------------------------------------------------------------
// Athlete & activities
// ---------------------------------------------------------------------------

/// Render the athlete profile with optional training zones.
pub fn render_profile(profile: &AthleteProfile, zones: Option<&TrainingZones>) -> String {
    let mut out = format!(
        "👤 Athlete Profile\n\nName: {} {}\n",
        profile.firstname, profile.lastname
    );
    if let Some(username) = &profile.username {
        out.push_str(&format!("Username: {username}\n"));
    }
    if let (Some(city), Some(country)) = (&profile.city, &profile.country) {
        out.push_str(&format!("Location: {city}, {country}\n"));
    }
    if let Some(weight) = profile.weight {
        out.push_str(&format!("Weight: {weight:.1} kg\n"));
    }
    if let Some(ftp) = profile.ftp {
        out.push_str(&format!("FTP: {ftp} W\n"));
    }

    if let Some(zones) = zones {
        if let Some(hr) = &zones.heart_rate {
            out.push_str("\nHeart-rate zones:\n");
            for (i, z) in hr.zones.iter().enumerate() {
                out.push_str(&format!("  Z{}: {}\n", i + 1, zone_range(z.min, z.max, "bpm")));
            }
        }
        if let Some(power) = &zones.power {
            out.push_str("\nPower zones:\n");
            for (i, z) in power.zones.iter().enumerate() {
                out.push_str(&format!("  Z{}: {}\n", i + 1, zone_range(z.min, z.max, "W")));
            }
        }
    }

    out
}

fn zone_range(min: i64, max: i64, unit: &str) -> String {
    if max < 0 {
        format!("{min}+ {unit}")
    } else {
        format!("{min}-{max} {unit}")
    }
}

/// Render a list of recent activities.
pub fn render_activities(activities: &[ActivitySummary]) -> String {
    if activities.is_empty() {
        return "No recent activities found.".to_owned();
    }

    let mut out = format!("🏃 Recent Activities ({})\n\n", activities.len());
    for a in activities {
        out.push_str(&format!(
            "- [{}] {} ({}): {:.1} km in {}, {:.0} m elevation\n",
            a.id,
            a.name,
            a.sport_type,
            a.distance / 1_000.0,
            format_duration(a.moving_time),
            a.total_elevation_gain,
        ));
    }
    out.push_str("\nUse get-activity-details with an activity id for the full picture.");
    out
}

/// Render full activity detail with optional training zones.
pub fn render_activity_details(detail: &ActivityDetail, zones: Option<&TrainingZones>) -> String {
    let s = &detail.summary;
    let mut out = format!(
        "📋 Activity Details: {}\n\nSport: {}\nDate: {}\nDistance: {:.1} km\n\
         Moving time: {}\nElapsed time: {}\nElevation gain: {:.0} m\n",
        s.name,
        s.sport_type,
        s.start_date.format("%Y-%m-%d %H:%M UTC"),
        s.distance / 1_000.0,
        format_duration(s.moving_time),
        format_duration(s.elapsed_time),
        s.total_elevation_gain,
    );

    if let Some(speed) = s.average_speed {
        out.push_str(&format!("Average speed: {:.1} km/h\n", speed * 3.6));
    }
    if let Some(hr) = s.average_heartrate {
        out.push_str(&format!("Average heart rate: {hr:.0} bpm\n"));
    }
    if let Some(max_hr) = detail.max_heartrate {
        out.push_str(&format!("Max heart rate: {max_hr:.0} bpm\n"));
    }
    if let Some(watts) = s.average_watts {
        out.push_str(&format!("Average power: {watts:.0} W\n"));
    }
    if let Some(calories) = detail.calories {
        out.push_str(&format!("Calories: {calories:.0}\n"));
    }
    if let Some(description) = &detail.description {
        if !description.is_empty() {
            out.push_str(&format!("\nNotes: {description}\n"));
        }
    }
    if !detail.laps.is_empty() {
        out.push_str(&format!("\nLaps: {}\n", detail.laps.len()));
    }
    if zones.is_some_and(|z| z.heart_rate.is_some() || z.power.is_some()) {
        out.push_str("Training zones are on file for this athlete.\n");
    }

    out
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Render a raw stream slice: counts, ranges, and averages per type.
pub fn render_stream_data(set: &StreamSet) -> String {
    let mut out = format!("📊 Stream Data ({} samples)\n\n", set.len());

    if let Some((start, end)) = set.time_range() {
        out.push_str(&format!(
            "Time range: {} - {} ({})\n",
            format_duration(start),
            format_duration(end),
            format_duration(end - start),
        ));
    }

    let numeric: [(&str, &str, Option<Vec<f64>>); 7] = [
        ("Heart rate", "bpm", set.heartrate.as_deref().map(to_f64)),
        ("Power", "W", set.watts.as_deref().map(to_f64)),
        ("Cadence", "rpm", set.cadence.as_deref().map(to_f64)),
        ("Speed", "m/s", set.velocity_smooth.clone()),
        ("Altitude", "m", set.altitude.clone()),
        ("Temperature", "°C", set.temp.as_deref().map(to_f64)),
        ("Grade", "", set.grade_smooth.clone()),
    ];

    for (label, unit, series) in numeric {
        let Some(series) = series else { continue };
        let Some(stats) = metric_stats(&series) else { continue };
        out.push_str(&format!(
            "{label}: {:.0}-{:.0} {unit} (avg {:.1})\n",
            stats.min, stats.max, stats.mean
        ));
    }

    if let Some(distance) = &set.distance {
        if let Some(last) = distance.last() {
            out.push_str(&format!("Distance covered: {:.2} km\n", last / 1_000.0));
        }
    }
    if let Some(moving) = &set.moving {
        let moving_count = moving.iter().filter(|m| **m).count();
        out.push_str(&format!("Moving samples: {moving_count}/{}\n", moving.len()));
    }

    out
}

/// Render the derived-features report.
pub fn render_derived_features(features: &DerivedFeatures) -> String {
    let s = &features.summary;
    let mut out = format!(
        "📈 Derived Features ({} samples, {})\n\n\
         Distance: {:.2} km | Elevation: +{:.0}/-{:.0} m | Moving: {:.0}%\n",
        s.sample_count,
        format_duration(s.duration_secs),
        s.total_distance_m / 1_000.0,
        s.elevation_gain_m,
        s.elevation_loss_m,
        s.moving_time_pct,
    );
    if let Some(np) = s.normalized_power {
        out.push_str(&format!("Normalized power: {np:.0} W\n"));
    }

    out.push_str("\nPer-metric statistics:\n");
    for (name, stats) in &features.metrics {
        out.push_str(&format!(
            "  {name}: min {:.1} / avg {:.1} / max {:.1} (σ {:.1}, CV {:.2}, \
             Q25 {:.1}, Q75 {:.1}, n={})\n",
            stats.min, stats.mean, stats.max, stats.std_dev, stats.variability,
            stats.q25, stats.q75, stats.count,
        ));
    }

    for (name, trends) in &features.trends {
        if trends.is_empty() {
            continue;
        }
        let described: Vec<String> = trends
            .iter()
            .map(|t| format!("{:?} ({:.0}%)", t.direction, t.confidence * 100.0))
            .collect();
        out.push_str(&format!("  {name} trend: {}\n", described.join(" → ")));
    }

    let spike_total: usize = features.spikes.values().map(|s| s.len()).sum();
    if spike_total > 0 {
        out.push_str(&format!("\nSpikes detected: {spike_total}\n"));
    }
    let inflection_total: usize = features.inflections.values().map(|i| i.len()).sum();
    if inflection_total > 0 {
        out.push_str(&format!("Inflection points: {inflection_total}\n"));
    }

    if let Some(laps) = &features.laps {
        out.push_str(&format!(
            "\nLap analysis ({} laps): consistency {:.2}\n",
            laps.laps.len(),
            laps.consistency_score,
        ));
        if let (Some(fastest), Some(slowest)) = (laps.fastest_lap, laps.slowest_lap) {
            out.push_str(&format!("  Fastest lap: {fastest}, slowest: {slowest}\n"));
        }
    }

    if let Some(location) = &features.location {
        out.push_str(&format!(
            "\nRoute: {} GPS points, bounds N{:.4} S{:.4} E{:.4} W{:.4}\n",
            location.gps_points, location.north, location.south, location.east, location.west,
        ));
    }

    out
}

/// Navigation help appended to every stream page.
pub fn navigation_instructions(page_number: i64, total_pages: i64, has_next: bool) -> String {
    let mut out = format!("Page {page_number} of {total_pages}.");
    if has_next {
        out.push_str(&format!(
            " Request page_number={} for the next page.",
            page_number + 1
        ));
    }
    if page_number > 1 {
        out.push_str(&format!(
            " Request page_number={} for the previous page.",
            page_number - 1
        ));
    }
    out.push_str(" Use page_size=-1 to process the full dataset at once.");
    out
}

fn format_duration(secs: i64) -> String {
    let h = secs / 3_600;
    let m = (secs % 3_600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::StreamSet;

    #[test]
    fn raw_block_includes_ranges() {
        let set = StreamSet {
            time: Some(vec![0, 60, 120]),
            heartrate: Some(vec![140, 160, 180]),
            watts: Some(vec![200, 250, 300]),
            ..Default::default()
        };

        let text = render_stream_data(&set);
        assert!(text.contains("3 samples"));
        assert!(text.contains("Heart rate: 140-180 bpm"));
        assert!(text.contains("Power: 200-300 W"));
    }

    #[test]
    fn navigation_mentions_neighbors_and_full_dataset() {
        let text = navigation_instructions(2, 5, true);
        assert!(text.contains("Page 2 of 5"));
        assert!(text.contains("page_number=3"));
        assert!(text.contains("page_number=1"));
        assert!(text.contains("page_size=-1"));

        let last = navigation_instructions(5, 5, false);
        assert!(!last.contains("page_number=6"));
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m05s");
        assert_eq!(format_duration(3_725), "1h02m05s");
    }

    #[test]
    fn activities_render_lists_every_entry() {
        use chrono::Utc;
        let activities = vec![ActivitySummary {
            id: 7,
            name: "Evening Run".into(),
            sport_type: "Run".into(),
            distance: 10_000.0,
            moving_time: 3_000,
            elapsed_time: 3_100,
            total_elevation_gain: 120.0,
            average_speed: None,
            average_heartrate: None,
            average_watts: None,
            start_date: Utc::now(),
        }];

        let text = render_activities(&activities);
        assert!(text.contains("Evening Run"));
        assert!(text.contains("[7]"));
        assert!(text.contains("10.0 km"));
    }
}
