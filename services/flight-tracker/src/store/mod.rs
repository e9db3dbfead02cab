//! Durable storage for episodes, live sessions and buffered reports

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{EpisodeFilter, PgStore};

use async_trait::async_trait;
use serde::Serialize;

use crate::episode::FlightEpisode;
use crate::error::StoreError;
use crate::report::PositionReport;
use crate::segment::SegmentKey;
use crate::session::{PersistedSession, TrackingSession};

/// Episode output and live-session checkpoints
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Durably append a finished episode
    async fn append_episode(&self, episode: &FlightEpisode) -> Result<(), StoreError>;

    /// Insert or replace the persisted copy of a session
    async fn upsert_session(&self, session: &PersistedSession) -> Result<(), StoreError>;

    /// Remove the persisted copy of a session, if any
    async fn delete_session(&self, icao24: &str) -> Result<(), StoreError>;

    /// Every persisted session, for restart recovery
    async fn load_sessions(&self) -> Result<Vec<PersistedSession>, StoreError>;

    /// Load and decode sessions, skipping corrupt records
    async fn restore_sessions(&self) -> Result<Vec<TrackingSession>, StoreError> {
        let mut sessions = Vec::new();
        for persisted in self.load_sessions().await? {
            match persisted.into_session() {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!("Skipping persisted session: {}", e),
            }
        }
        Ok(sessions)
    }
}

/// Aircraft with the most buffered reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IcaoCount {
    pub icao24: String,
    pub count: u64,
}

/// Occupancy of the raw report archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    pub total_reports: u64,
    pub distinct_icao24: u64,
    /// Ties go to the lowest `icao24`
    pub most_frequent: Option<IcaoCount>,
}

impl std::fmt::Display for BufferStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} reports from {} aircraft",
            self.total_reports, self.distinct_icao24
        )?;
        if let Some(top) = &self.most_frequent {
            write!(f, ", most frequent {} with {} reports", top.icao24, top.count)?;
        }
        Ok(())
    }
}

/// Raw report archive consumed by batch segmentation
#[async_trait]
pub trait ReportBuffer: Send + Sync {
    /// Archive reports that carry a callsign; returns how many were stored
    async fn buffer_reports(&self, reports: &[PositionReport]) -> Result<u64, StoreError>;

    /// Distinct buffered keys, ordered
    async fn buffered_keys(&self) -> Result<Vec<SegmentKey>, StoreError>;

    /// All reports buffered under a key
    async fn buffered_reports(&self, key: &SegmentKey) -> Result<Vec<PositionReport>, StoreError>;

    /// Delete reports buffered under a key; returns how many were removed
    async fn discard_buffered(&self, key: &SegmentKey) -> Result<u64, StoreError>;

    /// Report totals per aircraft across the whole archive
    async fn buffer_stats(&self) -> Result<BufferStats, StoreError>;
}
