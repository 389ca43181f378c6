//! Wire-format decoding for the provider's streams endpoint.
//!
//! With `key_by_type=true` the endpoint returns a map
//! `{type → {data, series_type, ...}}` whose `data` arrays mix numbers,
//! booleans, coordinate pairs, and occasional nulls.  This module coerces
//! that shape into the typed [`StreamSet`] arrays.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use cadence_core::{StreamSet, StreamType};

use crate::error::{Result, StravaError};

/// One raw stream as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStream {
    /// Sample values; element type depends on the stream key.
    #[serde(default)]
    pub data: Vec<Value>,
    /// The axis this stream is sampled against (`"time"` or `"distance"`).
    #[serde(default)]
    pub series_type: String,
    /// Sample count before resolution downsampling.
    #[serde(default)]
    pub original_size: usize,
}

/// The full keyed-by-type streams response.
pub type RawStreamMap = HashMap<String, RawStream>;

/// Decode the provider's keyed-by-type payload into a [`StreamSet`].
///
/// Nulls inside integral series (time, heartrate, watts, cadence, temp)
/// decode to `0`; float series likewise fall back to `0.0`.  Unknown keys
/// are skipped.
pub fn decode_streams(raw: RawStreamMap) -> Result<StreamSet> {
    let mut set = StreamSet::default();

    for (key, stream) in raw {
        let Some(stream_type) = StreamType::from_key(&key) else {
            tracing::debug!(key = %key, "skipping unknown stream key");
            continue;
        };

        match stream_type {
            StreamType::Time => set.time = Some(int_series(&stream.data)),
            StreamType::Heartrate => set.heartrate = Some(int_series(&stream.data)),
            StreamType::Watts => set.watts = Some(int_series(&stream.data)),
            StreamType::Cadence => set.cadence = Some(int_series(&stream.data)),
            StreamType::Temp => set.temp = Some(int_series(&stream.data)),
            StreamType::Distance => set.distance = Some(float_series(&stream.data)),
            StreamType::Altitude => set.altitude = Some(float_series(&stream.data)),
            StreamType::VelocitySmooth => set.velocity_smooth = Some(float_series(&stream.data)),
            StreamType::GradeSmooth => set.grade_smooth = Some(float_series(&stream.data)),
            StreamType::Moving => set.moving = Some(bool_series(&stream.data)),
            StreamType::Latlng => set.latlng = Some(latlng_series(&stream.data)?),
        }
    }

    Ok(set)
}

fn int_series(data: &[Value]) -> Vec<i64> {
    data.iter()
        .map(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)).unwrap_or(0))
        .collect()
}

fn float_series(data: &[Value]) -> Vec<f64> {
    data.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect()
}

fn bool_series(data: &[Value]) -> Vec<bool> {
    data.iter().map(|v| v.as_bool().unwrap_or(false)).collect()
}

fn latlng_series(data: &[Value]) -> Result<Vec<[f64; 2]>> {
    data.iter()
        .map(|v| match v.as_array() {
            Some(pair) if pair.len() == 2 => Ok([
                pair[0].as_f64().unwrap_or(0.0),
                pair[1].as_f64().unwrap_or(0.0),
            ]),
            // Nulls appear where GPS lock was lost.
            None if v.is_null() => Ok([0.0, 0.0]),
            _ => Err(StravaError::Decode {
                reason: format!("latlng sample is not a 2-element array: {v}"),
            }),
        })
        .collect()
}

/// The provider's own error body shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// The OAuth token-exchange response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp of the new access token's expiry.
    pub expires_at: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(key: &str, data: Value) -> (String, RawStream) {
        (
            key.to_owned(),
            RawStream {
                data: data.as_array().unwrap().clone(),
                series_type: "distance".into(),
                original_size: 0,
            },
        )
    }

    #[test]
    fn decode_typed_arrays() {
        let map: RawStreamMap = [
            raw("time", json!([0, 1, 2])),
            raw("heartrate", json!([140, null, 150])),
            raw("distance", json!([0.0, 4.8, 9.9])),
            raw("moving", json!([true, true, false])),
        ]
        .into_iter()
        .collect();

        let set = decode_streams(map).unwrap();
        assert_eq!(set.time, Some(vec![0, 1, 2]));
        // Null bpm samples coerce to zero.
        assert_eq!(set.heartrate, Some(vec![140, 0, 150]));
        assert_eq!(set.distance, Some(vec![0.0, 4.8, 9.9]));
        assert_eq!(set.moving, Some(vec![true, true, false]));
    }

    #[test]
    fn decode_latlng_pairs() {
        let map: RawStreamMap =
            [raw("latlng", json!([[52.52, 13.40], null, [52.53, 13.41]]))].into_iter().collect();

        let set = decode_streams(map).unwrap();
        let latlng = set.latlng.unwrap();
        assert_eq!(latlng.len(), 3);
        assert_eq!(latlng[0], [52.52, 13.40]);
        assert_eq!(latlng[1], [0.0, 0.0]);
    }

    #[test]
    fn malformed_latlng_rejected() {
        let map: RawStreamMap = [raw("latlng", json!([[52.52]]))].into_iter().collect();
        assert!(matches!(
            decode_streams(map),
            Err(StravaError::Decode { .. })
        ));
    }

    #[test]
    fn unknown_keys_skipped() {
        let map: RawStreamMap = [raw("power_zone", json!([1, 2, 3]))].into_iter().collect();
        let set = decode_streams(map).unwrap();
        assert!(set.is_empty());
    }
}
