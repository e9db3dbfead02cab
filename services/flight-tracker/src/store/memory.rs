//! In-process store, used when no database is reachable and in tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BufferStats, FlightStore, IcaoCount, ReportBuffer};
use crate::episode::FlightEpisode;
use crate::error::StoreError;
use crate::report::PositionReport;
use crate::segment::SegmentKey;
use crate::session::PersistedSession;

#[derive(Debug, Default)]
struct Inner {
    episodes: Vec<FlightEpisode>,
    sessions: HashMap<String, PersistedSession>,
    buffered: BTreeMap<SegmentKey, Vec<PositionReport>>,
}

/// Memory-backed [`FlightStore`] and [`ReportBuffer`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store set to fail".to_string()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn episodes(&self) -> Vec<FlightEpisode> {
        self.lock().episodes.clone()
    }

    pub fn session(&self, icao24: &str) -> Option<PersistedSession> {
        self.lock().sessions.get(icao24).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }
}

#[async_trait]
impl FlightStore for MemoryStore {
    async fn append_episode(&self, episode: &FlightEpisode) -> Result<(), StoreError> {
        self.check()?;
        self.lock().episodes.push(episode.clone());
        Ok(())
    }

    async fn upsert_session(&self, session: &PersistedSession) -> Result<(), StoreError> {
        self.check()?;
        self.lock()
            .sessions
            .insert(session.icao24.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, icao24: &str) -> Result<(), StoreError> {
        self.check()?;
        self.lock().sessions.remove(icao24);
        Ok(())
    }

    async fn load_sessions(&self) -> Result<Vec<PersistedSession>, StoreError> {
        let mut sessions: Vec<PersistedSession> = self.lock().sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.icao24.cmp(&b.icao24));
        Ok(sessions)
    }
}

#[async_trait]
impl ReportBuffer for MemoryStore {
    async fn buffer_reports(&self, reports: &[PositionReport]) -> Result<u64, StoreError> {
        self.check()?;
        let mut inner = self.lock();
        let mut stored = 0;
        for report in reports.iter().filter(|r| r.has_position()) {
            if let Some(key) = SegmentKey::of(report) {
                inner.buffered.entry(key).or_default().push(report.clone());
                stored += 1;
            }
        }
        Ok(stored)
    }

    async fn buffered_keys(&self) -> Result<Vec<SegmentKey>, StoreError> {
        Ok(self.lock().buffered.keys().cloned().collect())
    }

    async fn buffered_reports(&self, key: &SegmentKey) -> Result<Vec<PositionReport>, StoreError> {
        Ok(self.lock().buffered.get(key).cloned().unwrap_or_default())
    }

    async fn discard_buffered(&self, key: &SegmentKey) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self
            .lock()
            .buffered
            .remove(key)
            .map(|reports| reports.len() as u64)
            .unwrap_or(0))
    }

    async fn buffer_stats(&self) -> Result<BufferStats, StoreError> {
        let inner = self.lock();
        let mut per_aircraft: BTreeMap<&str, u64> = BTreeMap::new();
        for (key, reports) in &inner.buffered {
            *per_aircraft.entry(key.icao24.as_str()).or_default() += reports.len() as u64;
        }

        // Iteration is ordered by icao24, so the first maximum wins ties
        let mut most_frequent: Option<IcaoCount> = None;
        for (icao24, count) in &per_aircraft {
            if most_frequent.as_ref().map_or(true, |top| *count > top.count) {
                most_frequent = Some(IcaoCount {
                    icao24: icao24.to_string(),
                    count: *count,
                });
            }
        }

        Ok(BufferStats {
            total_reports: per_aircraft.values().sum(),
            distinct_icao24: per_aircraft.len() as u64,
            most_frequent,
        })
    }
}
