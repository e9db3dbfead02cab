//! Tick loop: fetch, track, checkpoint
//!
//! The loop is the only writer of its tracker. Each tick's outcome is queued in
//! [`PendingWrites`] and flushed to the store before waiting for the next
//! interval; writes that fail stay queued and are retried at the next
//! checkpoint.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::episode::FlightEpisode;
use crate::error::StoreError;
use crate::feed::SnapshotSource;
use crate::report::PositionReport;
use crate::session::{PersistedSession, TrackingSession};
use crate::store::{FlightStore, ReportBuffer};
use crate::tracker::{StateTracker, TickOutcome};

/// Store writes not yet applied
#[derive(Debug, Default)]
pub struct PendingWrites {
    episodes: VecDeque<FlightEpisode>,
    deletes: BTreeSet<String>,
    upserts: BTreeMap<String, TrackingSession>,
}

impl PendingWrites {
    /// Queue a tick's outcome; newer state for an aircraft replaces older
    pub fn absorb(&mut self, outcome: &TickOutcome) {
        self.episodes.extend(outcome.episodes.iter().cloned());

        for session in &outcome.upserts {
            // A full upsert supersedes a delete queued by an earlier tick
            self.deletes.remove(&session.icao24);
            self.upserts.insert(session.icao24.clone(), session.clone());
        }
        // Removals happen after this tick's updates, so they win
        for icao24 in outcome.removed() {
            self.upserts.remove(icao24);
            self.deletes.insert(icao24.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.episodes.len() + self.deletes.len() + self.upserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply queued writes in order: episodes, deletes, upserts
    ///
    /// Stops at the first failure; everything not yet applied stays queued.
    pub async fn flush(&mut self, store: &dyn FlightStore) -> Result<(), StoreError> {
        while let Some(episode) = self.episodes.front() {
            store.append_episode(episode).await?;
            self.episodes.pop_front();
        }

        while let Some(icao24) = self.deletes.first().cloned() {
            store.delete_session(&icao24).await?;
            self.deletes.remove(&icao24);
        }

        while let Some(icao24) = self.upserts.keys().next().cloned() {
            if let Some(session) = self.upserts.get(&icao24) {
                match PersistedSession::from_session(session) {
                    Ok(persisted) => store.upsert_session(&persisted).await?,
                    Err(e) => warn!("Dropping unserializable session {}: {}", icao24, e),
                }
            }
            self.upserts.remove(&icao24);
        }

        Ok(())
    }
}

/// Per-tick counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    pub reports: usize,
    pub started: usize,
    pub landed: usize,
    pub reaped: usize,
    pub episodes: usize,
    pub ignored: usize,
    pub sessions: usize,
    pub buffered: u64,
}

impl std::fmt::Display for TickStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} reports, {} started, {} landed, {} reaped, {} episodes, {} ignored, {} sessions",
            self.reports,
            self.started,
            self.landed,
            self.reaped,
            self.episodes,
            self.ignored,
            self.sessions
        )
    }
}

/// Drives a [`StateTracker`] from a snapshot source and checkpoints it
pub struct TrackingLoop {
    tracker: StateTracker,
    store: Arc<dyn FlightStore>,
    buffer: Option<Arc<dyn ReportBuffer>>,
    pending: PendingWrites,
}

impl TrackingLoop {
    pub fn new(tracker: StateTracker, store: Arc<dyn FlightStore>) -> Self {
        Self {
            tracker,
            store,
            buffer: None,
            pending: PendingWrites::default(),
        }
    }

    /// Also archive every batch for later backfill
    pub fn with_buffer(mut self, buffer: Arc<dyn ReportBuffer>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    /// Reload persisted sessions into the tracker
    pub async fn restore(&mut self) -> Result<usize, StoreError> {
        let sessions = self.store.restore_sessions().await?;
        let count = sessions.len();
        self.tracker.restore(sessions);
        Ok(count)
    }

    /// Apply one batch and checkpoint the result
    ///
    /// The tracker is updated even when the store fails; the error is
    /// returned and the unapplied writes are kept for the next checkpoint.
    pub async fn run_tick(
        &mut self,
        batch: Vec<PositionReport>,
    ) -> Result<TickStats, StoreError> {
        let mut result = Ok(());

        let mut buffered = 0;
        if let Some(buffer) = &self.buffer {
            match buffer.buffer_reports(&batch).await {
                Ok(n) => buffered = n,
                Err(e) => result = Err(e),
            }
        }

        let reports = batch.len();
        let outcome = self.tracker.tick(batch);
        self.pending.absorb(&outcome);

        if let Err(e) = self.pending.flush(self.store.as_ref()).await {
            result = Err(e);
        }

        let stats = TickStats {
            reports,
            started: outcome.started,
            landed: outcome.landed.len(),
            reaped: outcome.reaped.len(),
            episodes: outcome.episodes.len(),
            ignored: outcome.ignored,
            sessions: self.tracker.count(),
            buffered,
        };
        result.map(|_| stats)
    }

    /// Poll on a fixed interval until Ctrl-C
    pub async fn run(&mut self, source: &dyn SnapshotSource, every: std::time::Duration) {
        self.run_until(source, every, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll on a fixed interval until `shutdown` resolves
    ///
    /// Shutdown is only observed between ticks.
    pub async fn run_until<F>(
        &mut self,
        source: &dyn SnapshotSource,
        every: std::time::Duration,
        shutdown: F,
    ) where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = interval.tick() => {}
            }

            let batch = match source.fetch().await {
                Ok(snapshot) => {
                    debug!("Snapshot: {}", snapshot.stats);
                    snapshot.reports
                }
                Err(e) => {
                    // Sessions stay untouched; the reaper still runs
                    warn!("Snapshot fetch failed: {}", e);
                    Vec::new()
                }
            };

            match self.run_tick(batch).await {
                Ok(stats) => info!("[Tick] {}", stats),
                Err(e) => error!(
                    "Checkpoint failed: {} ({} writes pending)",
                    e,
                    self.pending.len()
                ),
            }
        }

        if !self.pending.is_empty() {
            if let Err(e) = self.pending.flush(self.store.as_ref()).await {
                error!(
                    "Final checkpoint failed: {} ({} writes lost)",
                    e,
                    self.pending.len()
                );
            }
        }
        info!("[Tracker] {}", self.tracker.stats_summary());
    }
}
