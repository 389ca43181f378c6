//! Domain model shared across the Cadence crates.
//!
//! These types describe athletes, activities, and the time-series stream
//! payloads returned by the activity provider.  They are deliberately free of
//! transport concerns; the `cadence-strava` crate decodes the provider's wire
//! format into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Athlete & credentials
// ---------------------------------------------------------------------------

/// OAuth credential record for one athlete's provider account.
///
/// Mutated only by the token-refresh path; every other component treats it
/// as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaCredentials {
    /// Short-lived bearer token used on every API call.
    pub access_token: String,
    /// Long-lived token exchanged for a new access token on expiry.
    pub refresh_token: String,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl StravaCredentials {
    /// Whether the access token is already past its expiry timestamp.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// A coached athlete and their provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Application-level user id (opaque to the provider).
    pub id: String,
    /// Credentials for the athlete's provider account.
    pub credentials: StravaCredentials,
}

/// Shared, mutable handle to a user record.
///
/// The token-refresh path takes the write half; all request paths read.
pub type SharedUser = std::sync::Arc<tokio::sync::RwLock<User>>;

/// Wrap a user in a [`SharedUser`] handle.
pub fn shared_user(user: User) -> SharedUser {
    std::sync::Arc::new(tokio::sync::RwLock::new(user))
}

// ---------------------------------------------------------------------------
// Profile & zones
// ---------------------------------------------------------------------------

/// The athlete profile returned by `/athlete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthleteProfile {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// "M", "F", or unset.
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub ftp: Option<i64>,
}

/// A single zone boundary (e.g. heart-rate zone 2 = 120–140 bpm).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneRange {
    pub min: i64,
    /// `-1` means "no upper bound" in the provider's encoding.
    pub max: i64,
}

/// An ordered set of zone boundaries for one metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSet {
    pub zones: Vec<ZoneRange>,
}

/// Training zones returned by `/athlete/zones`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingZones {
    #[serde(default)]
    pub heart_rate: Option<ZoneSet>,
    #[serde(default)]
    pub power: Option<ZoneSet>,
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// One activity as listed by `/athlete/activities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Provider sport type, e.g. `"Ride"` or `"Run"`.
    #[serde(default)]
    pub sport_type: String,
    /// Total distance in meters.
    #[serde(default)]
    pub distance: f64,
    /// Moving time in seconds.
    #[serde(default)]
    pub moving_time: i64,
    /// Elapsed time in seconds.
    #[serde(default)]
    pub elapsed_time: i64,
    /// Total elevation gain in meters.
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
    pub start_date: DateTime<Utc>,
}

/// One lap within an activity, as reported by the provider.
///
/// `start_index`/`end_index` reference sample positions in the activity's
/// stream payload, which is what makes per-lap stream statistics possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lap {
    #[serde(default)]
    pub lap_index: i64,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: i64,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
}

/// Full activity detail returned by `/activities/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub summary: ActivitySummary,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub average_cadence: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub max_watts: Option<f64>,
    #[serde(default)]
    pub laps: Vec<Lap>,
}

// ---------------------------------------------------------------------------
// Stream payloads
// ---------------------------------------------------------------------------

/// The stream types the provider can record for an activity.
///
/// Serialized names match the provider's `keys` query values exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Time,
    Distance,
    Heartrate,
    Watts,
    Cadence,
    Altitude,
    VelocitySmooth,
    Temp,
    GradeSmooth,
    Moving,
    Latlng,
}

impl StreamType {
    /// All known stream types, in the provider's canonical order.
    pub const ALL: [StreamType; 11] = [
        StreamType::Time,
        StreamType::Distance,
        StreamType::Latlng,
        StreamType::Altitude,
        StreamType::VelocitySmooth,
        StreamType::Heartrate,
        StreamType::Cadence,
        StreamType::Watts,
        StreamType::Temp,
        StreamType::Moving,
        StreamType::GradeSmooth,
    ];

    /// The provider's wire key for this type.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Distance => "distance",
            Self::Heartrate => "heartrate",
            Self::Watts => "watts",
            Self::Cadence => "cadence",
            Self::Altitude => "altitude",
            Self::VelocitySmooth => "velocity_smooth",
            Self::Temp => "temp",
            Self::GradeSmooth => "grade_smooth",
            Self::Moving => "moving",
            Self::Latlng => "latlng",
        }
    }

    /// Parse a provider wire key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.key() == key)
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Sampling resolution for stream downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

/// An activity's time-series payload: optional parallel arrays keyed by type.
///
/// Invariant: every present array has the same length, equal to the number of
/// recorded samples.  Absence of a field means the metric was not recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartrate: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watts: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_smooth: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_smooth: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moving: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latlng: Option<Vec<[f64; 2]>>,
}

impl StreamSet {
    /// Number of samples in the payload (length of any present array).
    pub fn len(&self) -> usize {
        if let Some(v) = &self.time {
            return v.len();
        }
        if let Some(v) = &self.distance {
            return v.len();
        }
        if let Some(v) = &self.heartrate {
            return v.len();
        }
        if let Some(v) = &self.watts {
            return v.len();
        }
        if let Some(v) = &self.cadence {
            return v.len();
        }
        if let Some(v) = &self.altitude {
            return v.len();
        }
        if let Some(v) = &self.velocity_smooth {
            return v.len();
        }
        if let Some(v) = &self.temp {
            return v.len();
        }
        if let Some(v) = &self.grade_smooth {
            return v.len();
        }
        if let Some(v) = &self.moving {
            return v.len();
        }
        if let Some(v) = &self.latlng {
            return v.len();
        }
        0
    }

    /// Whether the payload contains no samples at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stream types present in this payload, in canonical order.
    pub fn present_types(&self) -> Vec<StreamType> {
        let mut types = Vec::new();
        for t in StreamType::ALL {
            let present = match t {
                StreamType::Time => self.time.is_some(),
                StreamType::Distance => self.distance.is_some(),
                StreamType::Heartrate => self.heartrate.is_some(),
                StreamType::Watts => self.watts.is_some(),
                StreamType::Cadence => self.cadence.is_some(),
                StreamType::Altitude => self.altitude.is_some(),
                StreamType::VelocitySmooth => self.velocity_smooth.is_some(),
                StreamType::Temp => self.temp.is_some(),
                StreamType::GradeSmooth => self.grade_smooth.is_some(),
                StreamType::Moving => self.moving.is_some(),
                StreamType::Latlng => self.latlng.is_some(),
            };
            if present {
                types.push(t);
            }
        }
        types
    }

    /// Extract the sample range `[start, end)` from every present array.
    ///
    /// Index correspondence is preserved: sample `i` of the slice is sample
    /// `start + i` of the original for every type.  Bounds are clamped to the
    /// payload length.
    pub fn slice(&self, start: usize, end: usize) -> StreamSet {
        let total = self.len();
        let start = start.min(total);
        let end = end.clamp(start, total);

        fn cut<T: Clone>(src: &Option<Vec<T>>, start: usize, end: usize) -> Option<Vec<T>> {
            src.as_ref().map(|v| v[start..end.min(v.len())].to_vec())
        }

        StreamSet {
            time: cut(&self.time, start, end),
            distance: cut(&self.distance, start, end),
            heartrate: cut(&self.heartrate, start, end),
            watts: cut(&self.watts, start, end),
            cadence: cut(&self.cadence, start, end),
            altitude: cut(&self.altitude, start, end),
            velocity_smooth: cut(&self.velocity_smooth, start, end),
            temp: cut(&self.temp, start, end),
            grade_smooth: cut(&self.grade_smooth, start, end),
            moving: cut(&self.moving, start, end),
            latlng: cut(&self.latlng, start, end),
        }
    }

    /// First and last values of the time array, when present.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        let time = self.time.as_ref()?;
        Some((*time.first()?, *time.last()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
