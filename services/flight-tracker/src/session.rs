//! Live per-aircraft tracking session and its state machine
//!
//! A session moves `ground -> takeoff -> airborne -> landed`. While idle on the
//! ground only the latest report is kept; once the aircraft departs, every
//! report is appended until it lands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::report::PositionReport;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightPhase {
    Ground,
    Takeoff,
    Airborne,
    Landed,
}

impl FlightPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Takeoff => "takeoff",
            Self::Airborne => "airborne",
            Self::Landed => "landed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ground" => Some(Self::Ground),
            "takeoff" => Some(Self::Takeoff),
            "airborne" => Some(Self::Airborne),
            "landed" => Some(Self::Landed),
            _ => None,
        }
    }

    /// Whether the aircraft has left the ground in this session
    pub fn is_departed(&self) -> bool {
        matches!(self, Self::Takeoff | Self::Airborne)
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory state for one aircraft currently being observed
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSession {
    pub icao24: String,
    pub callsign: String,
    pub origin_country: Option<String>,
    pub session_start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub status: FlightPhase,
    pub takeoff_time: Option<DateTime<Utc>>,
    pub positions: Vec<PositionReport>,
}

impl TrackingSession {
    /// Open a session for an aircraft seen on the ground with a callsign and position
    pub fn start(report: PositionReport, now: DateTime<Utc>) -> Option<Self> {
        if !report.on_ground || !report.has_position() {
            return None;
        }
        let callsign = report.callsign()?.to_string();

        Some(Self {
            icao24: report.icao24.clone(),
            callsign,
            origin_country: report.origin_country.clone(),
            session_start_time: now,
            last_update_time: now,
            status: FlightPhase::Ground,
            takeoff_time: None,
            positions: vec![report],
        })
    }

    /// Apply the latest report and return the new status
    ///
    /// A landed session is terminal and ignores further reports.
    pub fn advance(&mut self, report: PositionReport, now: DateTime<Utc>) -> FlightPhase {
        if self.status == FlightPhase::Landed {
            return self.status;
        }

        if now > self.last_update_time {
            self.last_update_time = now;
        }
        if self.origin_country.is_none() {
            self.origin_country = report.origin_country.clone();
        }

        self.status = match (self.status, report.on_ground) {
            (FlightPhase::Ground, false) => {
                // Keep only the last ground fix as the departure point
                let departure = self.positions.pop();
                self.positions.clear();
                self.positions.extend(departure);
                self.takeoff_time = Some(report.timestamp);
                self.positions.push(report);
                FlightPhase::Takeoff
            }
            (FlightPhase::Ground, true) => {
                if let Some(cs) = report.callsign() {
                    self.callsign = cs.to_string();
                }
                self.positions.clear();
                self.positions.push(report);
                FlightPhase::Ground
            }
            (FlightPhase::Takeoff | FlightPhase::Airborne, false) => {
                self.positions.push(report);
                FlightPhase::Airborne
            }
            (FlightPhase::Takeoff | FlightPhase::Airborne, true) => {
                self.positions.push(report);
                FlightPhase::Landed
            }
            (FlightPhase::Landed, _) => FlightPhase::Landed,
        };

        self.status
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_update_time
    }
}

/// Durable layout of a tracking session, one record per `icao24`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub icao24: String,
    pub callsign: String,
    pub origin_country: Option<String>,
    pub session_start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub status: String,
    pub takeoff_time: Option<DateTime<Utc>>,
    /// Serialized ordered position buffer
    pub positions: serde_json::Value,
}

impl PersistedSession {
    pub fn from_session(session: &TrackingSession) -> Result<Self, StoreError> {
        Ok(Self {
            icao24: session.icao24.clone(),
            callsign: session.callsign.clone(),
            origin_country: session.origin_country.clone(),
            session_start_time: session.session_start_time,
            last_update_time: session.last_update_time,
            status: session.status.as_str().to_string(),
            takeoff_time: session.takeoff_time,
            positions: serde_json::to_value(&session.positions)?,
        })
    }

    pub fn into_session(self) -> Result<TrackingSession, StoreError> {
        let status = FlightPhase::parse(&self.status).ok_or_else(|| StoreError::CorruptSession {
            icao24: self.icao24.clone(),
            reason: format!("unknown status '{}'", self.status),
        })?;
        let positions: Vec<PositionReport> =
            serde_json::from_value(self.positions).map_err(|e| StoreError::CorruptSession {
                icao24: self.icao24.clone(),
                reason: e.to_string(),
            })?;

        Ok(TrackingSession {
            icao24: self.icao24,
            callsign: self.callsign,
            origin_country: self.origin_country,
            session_start_time: self.session_start_time,
            last_update_time: self.last_update_time,
            status,
            takeoff_time: self.takeoff_time,
            positions,
        })
    }
}
