//! Gap-based segmentation of buffered reports into episodes
//!
//! Buffered reports for one aircraft, callsign and day can cover several
//! unrelated trips. Runs are split wherever consecutive reports are further
//! apart than the gap threshold, independent of sampling density.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::episode::FlightEpisode;
use crate::report::PositionReport;
use crate::summary::{CompletenessRule, EpisodeSummarizer};

/// Selects one buffer of reports
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub icao24: String,
    pub callsign: String,
    /// UTC calendar day
    pub day: NaiveDate,
}

impl SegmentKey {
    /// Key of a report, if it carries a callsign
    pub fn of(report: &PositionReport) -> Option<Self> {
        Some(Self {
            icao24: report.icao24.clone(),
            callsign: report.callsign()?.to_string(),
            day: report.timestamp.date_naive(),
        })
    }
}

impl std::fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.icao24, self.callsign, self.day)
    }
}

/// Splits report buffers into runs and summarizes each
#[derive(Debug, Clone, Copy)]
pub struct SegmentEngine {
    gap_threshold: Duration,
    summarizer: EpisodeSummarizer,
}

impl SegmentEngine {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            gap_threshold: config.gap_threshold,
            summarizer: EpisodeSummarizer::new(config.earth_radius_km),
        }
    }

    /// Split reports into maximal runs with no gap above the threshold
    ///
    /// Reports without coordinates are dropped; runs of fewer than two reports
    /// are discarded.
    pub fn runs(&self, mut reports: Vec<PositionReport>) -> Vec<Vec<PositionReport>> {
        reports.retain(PositionReport::has_position);
        // Stable: equal timestamps keep arrival order
        reports.sort_by_key(|r| r.timestamp);

        let mut runs = Vec::new();
        let mut current: Vec<PositionReport> = Vec::new();

        for report in reports {
            if let Some(prev) = current.last() {
                if report.timestamp - prev.timestamp > self.gap_threshold {
                    runs.push(std::mem::take(&mut current));
                }
            }
            current.push(report);
        }
        runs.push(current);

        runs.retain(|run| run.len() >= 2);
        runs
    }

    /// Segment one buffer into zero or more episodes
    pub fn segment(&self, reports: Vec<PositionReport>) -> Vec<FlightEpisode> {
        self.runs(reports)
            .iter()
            .filter_map(|run| self.summarizer.summarize(run, CompletenessRule::EitherGrounded))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{EndpointStatus, FlightStatus};
    use chrono::{DateTime, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 20, 0, 30, 0).unwrap()
    }

    fn report(min: i64, on_ground: bool) -> PositionReport {
        PositionReport::new("ab12cd", t0() + Duration::minutes(min), on_ground)
            .with_callsign("UAL901")
            .with_position(37.6 + min as f64 * 0.001, -122.4)
    }

    fn engine() -> SegmentEngine {
        SegmentEngine::new(&TrackerConfig::default())
    }

    #[test]
    fn test_gap_splits_and_singleton_dropped() {
        let reports = vec![report(300, false), report(2, false), report(0, true), report(1, false)];

        let runs = engine().runs(reports.clone());
        assert_eq!(runs.len(), 1);
        let minutes: Vec<i64> = runs[0]
            .iter()
            .map(|r| (r.timestamp - t0()).num_minutes())
            .collect();
        assert_eq!(minutes, vec![0, 1, 2]);

        let episodes = engine().segment(reports);
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].position_count, 3);
        assert_eq!(episodes[0].duration_minutes, 2);
    }

    #[test]
    fn test_gap_equal_to_threshold_does_not_split() {
        let reports = vec![
            report(0, true),
            report(240, true),
            report(481, true),
            report(482, true),
        ];

        let runs = engine().runs(reports);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[1].len(), 2);
    }

    #[test]
    fn test_output_is_time_ordered() {
        let reports: Vec<PositionReport> = [17, 3, 250, 9, 1, 260, 255, 5]
            .iter()
            .map(|m| report(*m, false))
            .collect();

        for episode in engine().segment(reports) {
            assert!(episode
                .positions
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp));
        }
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let a = report(0, true).with_altitude(1.0);
        let b = report(0, false).with_altitude(2.0);
        let c = report(1, false).with_altitude(3.0);

        let runs = engine().runs(vec![c, a, b]);
        let altitudes: Vec<f64> = runs[0].iter().filter_map(|r| r.baro_altitude).collect();
        assert_eq!(altitudes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_status_derivation() {
        let episodes = engine().segment(vec![
            // ground to airborne: complete
            report(0, true),
            report(10, false),
            // airborne to airborne: partial
            report(400, false),
            report(420, false),
            // airborne to ground: complete
            report(800, false),
            report(830, true),
        ]);

        assert_eq!(episodes.len(), 3);
        assert_eq!(episodes[0].start_status, EndpointStatus::Ground);
        assert_eq!(episodes[0].end_status, EndpointStatus::Airborne);
        assert_eq!(episodes[0].flight_status, FlightStatus::Complete);
        assert_eq!(episodes[1].flight_status, FlightStatus::Partial);
        assert_eq!(episodes[2].flight_status, FlightStatus::Complete);
    }

    #[test]
    fn test_reports_without_position_are_dropped() {
        let mut blind = report(1, false);
        blind.latitude = None;

        let episodes = engine().segment(vec![report(0, true), blind]);
        assert!(episodes.is_empty());
        assert!(engine().segment(Vec::new()).is_empty());
    }

    #[test]
    fn test_custom_threshold() {
        let config = TrackerConfig {
            gap_threshold: Duration::minutes(5),
            ..TrackerConfig::default()
        };
        let engine = SegmentEngine::new(&config);

        let runs = engine.runs(vec![
            report(0, true),
            report(4, false),
            report(10, false),
            report(12, true),
        ]);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_segment_key() {
        let key = SegmentKey::of(&report(0, true)).unwrap();
        assert_eq!(key.day, NaiveDate::from_ymd_opt(2024, 9, 20).unwrap());
        assert_eq!(key.to_string(), "ab12cd/UAL901/2024-09-20");

        assert!(SegmentKey::of(&report(0, true).with_callsign("")).is_none());
    }
}
