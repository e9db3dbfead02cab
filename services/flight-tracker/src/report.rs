//! Normalized aircraft position report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// One observation of one aircraft at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// ICAO 24-bit address, lower-case hex
    pub icao24: String,
    /// Flight callsign, `None` when blank
    pub callsign: Option<String>,
    /// Country of registration as reported by the feed
    pub origin_country: Option<String>,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
    /// Barometric altitude in metres
    pub baro_altitude: Option<f64>,
    /// Ground speed in m/s
    pub velocity: Option<f64>,
    /// True track in degrees clockwise from north
    pub true_track: Option<f64>,
    /// Vertical rate in m/s
    pub vertical_rate: Option<f64>,
    /// Surface position flag
    pub on_ground: bool,
    /// Geometric altitude in metres
    #[serde(default)]
    pub geo_altitude: Option<f64>,
    /// Transponder code
    #[serde(default)]
    pub squawk: Option<String>,
    /// Origin of the position (0 ADS-B, 1 ASTERIX, 2 MLAT, 3 FLARM)
    #[serde(default)]
    pub position_source: Option<i32>,
    /// Aircraft category as reported by the feed
    #[serde(default)]
    pub category: Option<i32>,
}

impl PositionReport {
    pub fn new(icao24: impl Into<String>, timestamp: DateTime<Utc>, on_ground: bool) -> Self {
        Self {
            icao24: icao24.into(),
            callsign: None,
            origin_country: None,
            timestamp,
            latitude: None,
            longitude: None,
            baro_altitude: None,
            velocity: None,
            true_track: None,
            vertical_rate: None,
            on_ground,
            geo_altitude: None,
            squawk: None,
            position_source: None,
            category: None,
        }
    }

    /// Set the callsign, normalizing blank values to `None`
    pub fn with_callsign(mut self, callsign: &str) -> Self {
        self.callsign = normalize_callsign(callsign);
        self
    }

    pub fn with_origin_country(mut self, country: impl Into<String>) -> Self {
        self.origin_country = Some(country.into());
        self
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.baro_altitude = Some(altitude);
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    /// Both coordinates, if present
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    pub fn has_position(&self) -> bool {
        self.coordinate().is_some()
    }

    /// Callsign if present and non-empty
    pub fn callsign(&self) -> Option<&str> {
        self.callsign.as_deref().filter(|cs| !cs.trim().is_empty())
    }
}

/// Trim a raw callsign; blank becomes `None`
pub fn normalize_callsign(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_blank_callsign_normalized() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let report = PositionReport::new("3c6444", t, true).with_callsign("   ");
        assert_eq!(report.callsign, None);
        assert_eq!(report.callsign(), None);

        let report = report.with_callsign(" DLH4AB ");
        assert_eq!(report.callsign(), Some("DLH4AB"));
    }

    #[test]
    fn test_coordinate_requires_both_fields() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut report = PositionReport::new("3c6444", t, false);
        report.latitude = Some(50.0);
        assert!(!report.has_position());

        report.longitude = Some(8.5);
        assert_eq!(report.coordinate(), Some(Coordinate::new(50.0, 8.5)));
    }

    #[test]
    fn test_decodes_records_without_extended_fields() {
        let json = serde_json::json!({
            "icao24": "3c6444",
            "callsign": "DLH4AB",
            "origin_country": "Germany",
            "timestamp": "2024-05-01T12:00:00Z",
            "latitude": 50.0,
            "longitude": 8.5,
            "baro_altitude": null,
            "velocity": null,
            "true_track": null,
            "vertical_rate": null,
            "on_ground": true
        });

        let report: PositionReport = serde_json::from_value(json).unwrap();
        assert_eq!(report.geo_altitude, None);
        assert_eq!(report.squawk, None);
        assert_eq!(report.position_source, None);
        assert_eq!(report.category, None);
    }
}
