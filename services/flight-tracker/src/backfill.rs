//! Batch reconstruction from buffered reports

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::segment::SegmentEngine;
use crate::store::{FlightStore, ReportBuffer};

/// Totals for one backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub keys: usize,
    pub reports: usize,
    pub episodes: usize,
}

impl std::fmt::Display for BackfillSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} keys, {} reports, {} episodes",
            self.keys, self.reports, self.episodes
        )
    }
}

/// Segment every buffered key whose day is before `before`
///
/// A key's reports are discarded only after all of its episodes were stored.
pub async fn run_backfill(
    buffer: &dyn ReportBuffer,
    store: &dyn FlightStore,
    engine: &SegmentEngine,
    before: NaiveDate,
) -> Result<BackfillSummary, StoreError> {
    let mut summary = BackfillSummary::default();

    for key in buffer.buffered_keys().await? {
        if key.day >= before {
            continue;
        }

        let reports = buffer.buffered_reports(&key).await?;
        let count = reports.len();
        let episodes = engine.segment(reports);
        debug!("Key {}: {} reports -> {} episodes", key, count, episodes.len());

        for episode in &episodes {
            store.append_episode(episode).await?;
        }
        buffer.discard_buffered(&key).await?;

        summary.keys += 1;
        summary.reports += count;
        summary.episodes += episodes.len();
    }

    info!("Backfill complete: {}", summary);
    Ok(summary)
}
