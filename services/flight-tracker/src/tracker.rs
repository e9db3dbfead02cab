//! Live aircraft tracking across polling ticks
//!
//! Holds one [`TrackingSession`] per observed aircraft, advances each from the
//! latest snapshot every tick, flushes landed sessions into episodes and drops
//! sessions that stopped reporting.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::episode::FlightEpisode;
use crate::report::PositionReport;
use crate::session::{FlightPhase, TrackingSession};
use crate::summary::{CompletenessRule, EpisodeLabel, EpisodeSummarizer};

/// Everything one tick changed, in the form the persistence layer needs
#[derive(Debug, Default, Clone)]
pub struct TickOutcome {
    /// Sessions created or advanced this tick
    pub upserts: Vec<TrackingSession>,
    /// Sessions that landed and were flushed
    pub landed: Vec<String>,
    /// Sessions abandoned for staleness
    pub reaped: Vec<String>,
    /// Episodes produced by landed sessions
    pub episodes: Vec<FlightEpisode>,
    /// Newly opened sessions
    pub started: usize,
    /// Reports ignored (no position, or no session and not eligible to start one)
    pub ignored: usize,
}

impl TickOutcome {
    /// `icao24`s whose durable session must be deleted
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.landed.iter().chain(self.reaped.iter()).map(String::as_str)
    }
}

/// Aircraft tracker - owns the live session set
pub struct StateTracker {
    sessions: HashMap<String, TrackingSession>,
    clock: Arc<dyn Clock>,
    summarizer: EpisodeSummarizer,
    staleness_window: Duration,
}

impl StateTracker {
    pub fn new(config: &TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: HashMap::new(),
            clock,
            summarizer: EpisodeSummarizer::new(config.earth_radius_km),
            staleness_window: config.staleness_window,
        }
    }

    /// Repopulate the live set from persisted sessions
    pub fn restore(&mut self, sessions: impl IntoIterator<Item = TrackingSession>) {
        for session in sessions {
            match self.sessions.get(&session.icao24) {
                Some(existing) if existing.last_update_time >= session.last_update_time => {}
                _ => {
                    self.sessions.insert(session.icao24.clone(), session);
                }
            }
        }
        info!("Restored {} tracking sessions", self.sessions.len());
    }

    /// Apply one polling batch, then reap stale sessions
    pub fn tick(&mut self, batch: Vec<PositionReport>) -> TickOutcome {
        let now = self.clock.now();
        let mut outcome = TickOutcome::default();

        for report in latest_per_aircraft(batch, &mut outcome.ignored) {
            self.apply(report, now, &mut outcome);
        }

        outcome.reaped = self.reap_at(now);
        outcome
    }

    fn apply(&mut self, report: PositionReport, now: DateTime<Utc>, outcome: &mut TickOutcome) {
        if !self.sessions.contains_key(&report.icao24) {
            match TrackingSession::start(report, now) {
                Some(session) => {
                    debug!("New session {} ({})", session.icao24, session.callsign);
                    outcome.started += 1;
                    outcome.upserts.push(session.clone());
                    self.sessions.insert(session.icao24.clone(), session);
                }
                None => outcome.ignored += 1,
            }
            return;
        }
        let Some(session) = self.sessions.get_mut(&report.icao24) else {
            return;
        };

        let previous = session.status;
        let status = session.advance(report, now);
        if status != previous {
            debug!("Session {} {} -> {}", session.icao24, previous, status);
        }

        if status != FlightPhase::Landed {
            outcome.upserts.push(session.clone());
            return;
        }

        let icao24 = session.icao24.clone();
        let Some(session) = self.sessions.remove(&icao24) else {
            return;
        };
        match self.flush(&session) {
            Some(episode) => {
                info!(
                    "Flight {} {} landed: {} min, {} positions",
                    episode.icao24,
                    episode.callsign.as_deref().unwrap_or("-"),
                    episode.duration_minutes,
                    episode.position_count
                );
                outcome.episodes.push(episode);
            }
            None => debug!("Session {} landed with too few positions", session.icao24),
        }
        outcome.landed.push(session.icao24);
    }

    /// Turn a landed session into an episode
    fn flush(&self, session: &TrackingSession) -> Option<FlightEpisode> {
        let label = EpisodeLabel {
            icao24: session.icao24.clone(),
            callsign: Some(session.callsign.clone()),
            origin_country: session.origin_country.clone(),
        };
        self.summarizer
            .summarize_labeled(&label, &session.positions, CompletenessRule::BothGrounded)
    }

    /// Drop sessions not updated within the staleness window
    pub fn reap_stale(&mut self) -> Vec<String> {
        let now = self.clock.now();
        self.reap_at(now)
    }

    fn reap_at(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let window = self.staleness_window;
        let mut reaped = Vec::new();

        self.sessions.retain(|icao24, session| {
            if session.age(now) > window {
                debug!(
                    "Abandoning stale session {} ({}) in state {}",
                    icao24, session.callsign, session.status
                );
                reaped.push(icao24.clone());
                false
            } else {
                true
            }
        });

        if !reaped.is_empty() {
            debug!(
                "Reaped {} stale sessions, {} remaining",
                reaped.len(),
                self.sessions.len()
            );
        }
        reaped.sort();
        reaped
    }

    /// Get a session by ICAO address
    pub fn get(&self, icao24: &str) -> Option<&TrackingSession> {
        self.sessions.get(icao24)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &TrackingSession> {
        self.sessions.values()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Get summary statistics
    pub fn stats_summary(&self) -> TrackerStats {
        let mut stats = TrackerStats {
            total: self.sessions.len(),
            ..TrackerStats::default()
        };
        for session in self.sessions.values() {
            match session.status {
                FlightPhase::Ground => stats.ground += 1,
                FlightPhase::Takeoff => stats.takeoff += 1,
                FlightPhase::Airborne => stats.airborne += 1,
                FlightPhase::Landed => {}
            }
        }
        stats
    }
}

/// Keep the newest report per aircraft; later entries win ties
fn latest_per_aircraft(batch: Vec<PositionReport>, ignored: &mut usize) -> Vec<PositionReport> {
    let mut latest: BTreeMap<String, PositionReport> = BTreeMap::new();

    for report in batch {
        if !report.has_position() {
            *ignored += 1;
            continue;
        }
        match latest.get(&report.icao24) {
            Some(existing) if existing.timestamp > report.timestamp => *ignored += 1,
            Some(_) => {
                *ignored += 1;
                latest.insert(report.icao24.clone(), report);
            }
            None => {
                latest.insert(report.icao24.clone(), report);
            }
        }
    }

    latest.into_values().collect()
}

/// Tracker statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub total: usize,
    pub ground: usize,
    pub takeoff: usize,
    pub airborne: usize,
}

impl std::fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sessions: {} total, {} ground, {} takeoff, {} airborne",
            self.total, self.ground, self.takeoff, self.airborne
        )
    }
}
