//! OpenSky state vector ingestion
//!
//! Converts a `states/all` response into [`PositionReport`]s, dropping rows
//! that cannot drive the tracker.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::report::{normalize_callsign, PositionReport};

/// Minimum number of fields a state vector must carry
pub const MIN_STATE_FIELDS: usize = 10;

// State vector field positions
const ICAO24: usize = 0;
const CALLSIGN: usize = 1;
const ORIGIN_COUNTRY: usize = 2;
const TIME_POSITION: usize = 3;
const LAST_CONTACT: usize = 4;
const LONGITUDE: usize = 5;
const LATITUDE: usize = 6;
const BARO_ALTITUDE: usize = 7;
const ON_GROUND: usize = 8;
const VELOCITY: usize = 9;
const TRUE_TRACK: usize = 10;
const VERTICAL_RATE: usize = 11;
const GEO_ALTITUDE: usize = 13;
const SQUAWK: usize = 14;
const POSITION_SOURCE: usize = 16;
const CATEGORY: usize = 17;

/// Why a state vector was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    MissingIcao,
    MissingPosition,
    MissingGroundFlag,
    BadTimestamp,
}

/// Counters for one ingestion pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub too_short: usize,
    pub missing_icao: usize,
    pub missing_position: usize,
    pub missing_ground_flag: usize,
    pub bad_timestamp: usize,
}

impl IngestStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::TooShort => self.too_short += 1,
            Rejection::MissingIcao => self.missing_icao += 1,
            Rejection::MissingPosition => self.missing_position += 1,
            Rejection::MissingGroundFlag => self.missing_ground_flag += 1,
            Rejection::BadTimestamp => self.bad_timestamp += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.too_short
            + self.missing_icao
            + self.missing_position
            + self.missing_ground_flag
            + self.bad_timestamp
    }
}

impl std::fmt::Display for IngestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} accepted, {} rejected (short={}, icao={}, position={}, ground={}, time={})",
            self.accepted,
            self.rejected(),
            self.too_short,
            self.missing_icao,
            self.missing_position,
            self.missing_ground_flag,
            self.bad_timestamp
        )
    }
}

/// Parse a full `states/all` response body
pub fn parse_states(body: &Value) -> (Vec<PositionReport>, IngestStats) {
    let response_time = body.get("time").and_then(Value::as_i64);
    let mut stats = IngestStats::default();
    let mut reports = Vec::new();

    let states = body
        .get("states")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for state in states {
        let Some(fields) = state.as_array() else {
            stats.record(Rejection::TooShort);
            continue;
        };
        match parse_state(fields, response_time) {
            Ok(report) => {
                stats.accepted += 1;
                reports.push(report);
            }
            Err(rejection) => {
                debug!("Dropping state vector {:?}: {:?}", fields.first(), rejection);
                stats.record(rejection);
            }
        }
    }

    (reports, stats)
}

/// Parse one state vector
pub fn parse_state(
    fields: &[Value],
    response_time: Option<i64>,
) -> Result<PositionReport, Rejection> {
    if fields.len() < MIN_STATE_FIELDS {
        return Err(Rejection::TooShort);
    }

    let icao24 = fields[ICAO24]
        .as_str()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or(Rejection::MissingIcao)?;

    let (Some(longitude), Some(latitude)) = (float(fields, LONGITUDE), float(fields, LATITUDE))
    else {
        return Err(Rejection::MissingPosition);
    };

    let on_ground = fields[ON_GROUND]
        .as_bool()
        .ok_or(Rejection::MissingGroundFlag)?;

    let timestamp = integer(fields, TIME_POSITION)
        .or_else(|| integer(fields, LAST_CONTACT))
        .or(response_time)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or(Rejection::BadTimestamp)?;

    Ok(PositionReport {
        icao24,
        callsign: fields[CALLSIGN].as_str().and_then(normalize_callsign),
        origin_country: fields[ORIGIN_COUNTRY]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        timestamp,
        latitude: Some(latitude),
        longitude: Some(longitude),
        baro_altitude: float(fields, BARO_ALTITUDE),
        velocity: float(fields, VELOCITY),
        true_track: float(fields, TRUE_TRACK),
        vertical_rate: float(fields, VERTICAL_RATE),
        on_ground,
        geo_altitude: float(fields, GEO_ALTITUDE),
        squawk: fields
            .get(SQUAWK)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        position_source: small_int(fields, POSITION_SOURCE),
        category: small_int(fields, CATEGORY),
    })
}

fn float(fields: &[Value], idx: usize) -> Option<f64> {
    fields.get(idx).and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn small_int(fields: &[Value], idx: usize) -> Option<i32> {
    fields
        .get(idx)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
}

fn integer(fields: &[Value], idx: usize) -> Option<i64> {
    let value = fields.get(idx)?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "time": 1717243200,
            "states": [
                ["3c6444", "DLH9LF  ", "Germany", 1717243195, 1717243199, 8.5622, 50.0379,
                 null, true, 4.2, 250.3, null, null, null, "1000", false, 0],
                ["a808c5", "", "United States", null, 1717243190, -73.7781, 40.6413,
                 10668.0, false, 245.1, 61.2, -0.3, null, 10972.8, null, false, 0],
                ["406b90", "EZY12AB", "United Kingdom", 1717243100, 1717243100, null, null,
                 3000.0, false, 180.0, 90.0, 5.0],
                ["400f01", "BAW1", "United Kingdom", 1717243100, 1717243100, -0.45, 51.47,
                 null, null, 0.0],
                ["4b1814", "SWR8", "Switzerland", 1717243100],
                "garbage"
            ]
        })
    }

    #[test]
    fn test_parse_states_filters_and_normalizes() {
        let (reports, stats) = parse_states(&body());

        assert_eq!(reports.len(), 2);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.missing_position, 1);
        assert_eq!(stats.missing_ground_flag, 1);
        assert_eq!(stats.too_short, 2);
        assert_eq!(stats.rejected(), 4);

        let dlh = &reports[0];
        assert_eq!(dlh.icao24, "3c6444");
        assert_eq!(dlh.callsign.as_deref(), Some("DLH9LF"));
        assert_eq!(dlh.origin_country.as_deref(), Some("Germany"));
        assert_eq!(dlh.timestamp.timestamp(), 1717243195);
        assert!(dlh.on_ground);
        assert_eq!(dlh.baro_altitude, None);
        assert_eq!(dlh.true_track, Some(250.3));
        assert_eq!(dlh.squawk.as_deref(), Some("1000"));
        assert_eq!(dlh.position_source, Some(0));
        assert_eq!(dlh.geo_altitude, None);
        assert_eq!(dlh.category, None);

        // Blank callsign kept as None, timestamp from last_contact
        let aal = &reports[1];
        assert_eq!(aal.callsign, None);
        assert_eq!(aal.timestamp.timestamp(), 1717243190);
        assert_eq!(aal.vertical_rate, Some(-0.3));
        assert_eq!(aal.geo_altitude, Some(10972.8));
        assert_eq!(aal.squawk, None);
    }

    #[test]
    fn test_timestamp_falls_back_to_response_time() {
        let fields = json!(["ABC123", "TEST", "X", null, null, 1.0, 2.0, null, false, null]);
        let report = parse_state(fields.as_array().unwrap(), Some(1700000000)).unwrap();
        assert_eq!(report.icao24, "abc123");
        assert_eq!(report.timestamp.timestamp(), 1700000000);

        assert_eq!(
            parse_state(fields.as_array().unwrap(), None),
            Err(Rejection::BadTimestamp)
        );
    }

    #[test]
    fn test_out_of_range_timestamp_rejected() {
        let fields = json!(["abc123", "TEST", "X", i64::MAX, null, 1.0, 2.0, null, false, null]);
        assert_eq!(
            parse_state(fields.as_array().unwrap(), None),
            Err(Rejection::BadTimestamp)
        );
    }

    #[test]
    fn test_empty_response() {
        let (reports, stats) = parse_states(&json!({"time": 1, "states": null}));
        assert!(reports.is_empty());
        assert_eq!(stats, IngestStats::default());
    }
}
