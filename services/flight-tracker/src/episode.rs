//! Reconstructed flight episode records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::report::PositionReport;

/// Ground/airborne state at either end of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Ground,
    Airborne,
}

impl EndpointStatus {
    pub fn of(report: &PositionReport) -> Self {
        if report.on_ground {
            Self::Ground
        } else {
            Self::Airborne
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Airborne => "airborne",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ground" => Some(Self::Ground),
            "airborne" => Some(Self::Airborne),
            _ => None,
        }
    }
}

/// Whether an episode covers a whole trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightStatus {
    Complete,
    Partial,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(Self::Complete),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

/// Compact per-report trace entry; absent values are omitted when serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_rate: Option<f64>,
    pub on_ground: bool,
}

impl From<&PositionReport> for TracePoint {
    fn from(report: &PositionReport) -> Self {
        Self {
            timestamp: report.timestamp,
            longitude: report.longitude,
            latitude: report.latitude,
            altitude: report.baro_altitude,
            velocity: report.velocity,
            track: report.true_track,
            vertical_rate: report.vertical_rate,
            on_ground: report.on_ground,
        }
    }
}

/// One reconstructed trip for a single aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightEpisode {
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    /// UTC date of departure
    pub flight_date: NaiveDate,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub start_status: EndpointStatus,
    pub end_status: EndpointStatus,
    pub flight_status: FlightStatus,
    pub max_altitude: Option<f64>,
    pub max_velocity: Option<f64>,
    /// `None` when no movement could be measured
    pub distance_km: Option<f64>,
    pub position_count: usize,
    pub positions: Vec<TracePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trace_point_omits_missing_fields() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let report = PositionReport::new("a0b1c2", t, false)
            .with_position(40.0, -73.0)
            .with_altitude(3000.0);

        let json = serde_json::to_value(TracePoint::from(&report)).unwrap();
        let obj = json.as_object().unwrap();

        assert!(obj.contains_key("latitude"));
        assert!(obj.contains_key("altitude"));
        assert!(obj.contains_key("on_ground"));
        assert!(!obj.contains_key("velocity"));
        assert!(!obj.contains_key("track"));
        assert!(!obj.contains_key("vertical_rate"));
    }

    #[test]
    fn test_status_serialized_lowercase() {
        assert_eq!(
            serde_json::to_string(&EndpointStatus::Airborne).unwrap(),
            "\"airborne\""
        );
        assert_eq!(serde_json::to_string(&FlightStatus::Partial).unwrap(), "\"partial\"");
    }
}
