//! Episode summarization and distance accumulation
//!
//! Both the live tracker and the batch segmenter hand an ordered run of
//! reports to [`EpisodeSummarizer`], which derives the episode fields.

use crate::episode::{EndpointStatus, FlightEpisode, FlightStatus, TracePoint};
use crate::geo::{haversine_km, DEFAULT_EARTH_RADIUS_KM};
use crate::report::PositionReport;

/// How `flight_status` is derived from the episode endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletenessRule {
    /// Complete only when the run starts and ends on the ground (live tracking)
    BothGrounded,
    /// Partial only when the run starts and ends airborne (batch segmentation)
    EitherGrounded,
}

impl CompletenessRule {
    fn apply(&self, start: EndpointStatus, end: EndpointStatus) -> FlightStatus {
        let complete = match self {
            Self::BothGrounded => {
                start == EndpointStatus::Ground && end == EndpointStatus::Ground
            }
            Self::EitherGrounded => {
                !(start == EndpointStatus::Airborne && end == EndpointStatus::Airborne)
            }
        };
        if complete {
            FlightStatus::Complete
        } else {
            FlightStatus::Partial
        }
    }
}

/// Identity fields copied onto an episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeLabel {
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
}

impl EpisodeLabel {
    /// Take the identity from the reports themselves
    pub fn from_reports(reports: &[PositionReport]) -> Option<Self> {
        let first = reports.first()?;
        Some(Self {
            icao24: first.icao24.clone(),
            callsign: reports
                .iter()
                .find_map(|r| r.callsign())
                .map(str::to_string),
            origin_country: reports.iter().find_map(|r| r.origin_country.clone()),
        })
    }
}

/// Sum of great-circle distances between consecutive reports
///
/// Pairs where either side lacks coordinates contribute nothing.
pub fn accumulate_distance_km(reports: &[PositionReport], radius_km: f64) -> f64 {
    reports
        .windows(2)
        .filter_map(|pair| match (pair[0].coordinate(), pair[1].coordinate()) {
            (Some(from), Some(to)) => Some(haversine_km(from, to, radius_km)),
            _ => None,
        })
        .sum()
}

fn max_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| match acc {
        Some(m) if m >= v => Some(m),
        _ => Some(v),
    })
}

/// Builds [`FlightEpisode`] records from ordered report runs
#[derive(Debug, Clone, Copy)]
pub struct EpisodeSummarizer {
    earth_radius_km: f64,
}

impl Default for EpisodeSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_EARTH_RADIUS_KM)
    }
}

impl EpisodeSummarizer {
    pub fn new(earth_radius_km: f64) -> Self {
        Self { earth_radius_km }
    }

    /// Summarize a run, labelling it from its own reports
    pub fn summarize(
        &self,
        reports: &[PositionReport],
        rule: CompletenessRule,
    ) -> Option<FlightEpisode> {
        let label = EpisodeLabel::from_reports(reports)?;
        self.summarize_labeled(&label, reports, rule)
    }

    /// Summarize an ordered run; `None` if it holds fewer than two reports
    pub fn summarize_labeled(
        &self,
        label: &EpisodeLabel,
        reports: &[PositionReport],
        rule: CompletenessRule,
    ) -> Option<FlightEpisode> {
        if reports.len() < 2 {
            return None;
        }
        let first = reports.first()?;
        let last = reports.last()?;

        let duration_minutes = (last.timestamp - first.timestamp).num_minutes().max(0);

        // Zero accumulated distance means there was no usable movement data
        let distance = accumulate_distance_km(reports, self.earth_radius_km);
        let distance_km = if distance == 0.0 { None } else { Some(distance) };

        let start_status = EndpointStatus::of(first);
        let end_status = EndpointStatus::of(last);

        let positions: Vec<TracePoint> = reports.iter().map(TracePoint::from).collect();

        Some(FlightEpisode {
            icao24: label.icao24.clone(),
            callsign: label.callsign.clone(),
            origin_country: label.origin_country.clone(),
            flight_date: first.timestamp.date_naive(),
            departure_time: first.timestamp,
            arrival_time: last.timestamp,
            duration_minutes,
            start_status,
            end_status,
            flight_status: rule.apply(start_status, end_status),
            max_altitude: max_present(reports.iter().map(|r| r.baro_altitude)),
            max_velocity: max_present(reports.iter().map(|r| r.velocity)),
            distance_km,
            position_count: positions.len(),
            positions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 14, 9, 0, 0).unwrap()
    }

    fn report(min: i64, on_ground: bool, lat: f64, lon: f64) -> PositionReport {
        PositionReport::new("4ca7b5", base() + Duration::minutes(min), on_ground)
            .with_callsign("RYR12AB")
            .with_position(lat, lon)
    }

    #[test]
    fn test_identical_coordinates_give_no_distance() {
        let reports = vec![report(0, true, 53.42, -6.27), report(5, true, 53.42, -6.27)];

        assert_eq!(accumulate_distance_km(&reports, DEFAULT_EARTH_RADIUS_KM), 0.0);

        let episode = EpisodeSummarizer::default()
            .summarize(&reports, CompletenessRule::BothGrounded)
            .unwrap();
        assert_eq!(episode.distance_km, None);
    }

    #[test]
    fn test_pairs_missing_coordinates_are_skipped() {
        let mut gap = PositionReport::new("4ca7b5", base() + Duration::minutes(1), false);
        gap.baro_altitude = Some(1000.0);
        let reports = vec![report(0, true, 53.42, -6.27), gap, report(2, false, 53.50, -6.10)];

        // Both pairs touch the coordinate-less report
        assert_eq!(accumulate_distance_km(&reports, DEFAULT_EARTH_RADIUS_KM), 0.0);

        let moving = vec![
            report(0, true, 53.42, -6.27),
            report(1, false, 53.50, -6.10),
            report(2, false, 53.60, -5.90),
        ];
        let total = accumulate_distance_km(&moving, DEFAULT_EARTH_RADIUS_KM);
        let first_leg = accumulate_distance_km(&moving[..2], DEFAULT_EARTH_RADIUS_KM);
        assert!(total > first_leg && first_leg > 0.0);
    }

    #[test]
    fn test_summary_fields() {
        let mut reports = vec![
            report(0, true, 53.42, -6.27),
            report(10, false, 53.60, -5.50),
            report(70, false, 52.00, -2.00),
            report(95, true, 51.47, -0.45),
        ];
        reports[1].baro_altitude = Some(3000.0);
        reports[2].baro_altitude = Some(11000.0);
        reports[2].velocity = Some(230.0);
        reports[1].velocity = Some(120.0);
        reports[3].timestamp += Duration::seconds(59);

        let episode = EpisodeSummarizer::default()
            .summarize(&reports, CompletenessRule::BothGrounded)
            .unwrap();

        assert_eq!(episode.icao24, "4ca7b5");
        assert_eq!(episode.callsign.as_deref(), Some("RYR12AB"));
        assert_eq!(episode.duration_minutes, 95);
        assert_eq!(episode.max_altitude, Some(11000.0));
        assert_eq!(episode.max_velocity, Some(230.0));
        assert_eq!(episode.start_status, EndpointStatus::Ground);
        assert_eq!(episode.end_status, EndpointStatus::Ground);
        assert_eq!(episode.flight_status, FlightStatus::Complete);
        assert_eq!(episode.position_count, 4);
        assert_eq!(episode.flight_date, base().date_naive());
        assert!(episode.distance_km.unwrap() > 400.0);
    }

    #[test]
    fn test_missing_scalars_stay_none() {
        let reports = vec![report(0, false, 40.0, 10.0), report(1, false, 40.1, 10.1)];
        let episode = EpisodeSummarizer::default()
            .summarize(&reports, CompletenessRule::BothGrounded)
            .unwrap();

        assert_eq!(episode.max_altitude, None);
        assert_eq!(episode.max_velocity, None);
        assert_eq!(episode.flight_status, FlightStatus::Partial);
    }

    #[test]
    fn test_completeness_rules() {
        use EndpointStatus::*;

        let live = CompletenessRule::BothGrounded;
        assert_eq!(live.apply(Ground, Ground), FlightStatus::Complete);
        assert_eq!(live.apply(Ground, Airborne), FlightStatus::Partial);
        assert_eq!(live.apply(Airborne, Ground), FlightStatus::Partial);

        let batch = CompletenessRule::EitherGrounded;
        assert_eq!(batch.apply(Ground, Airborne), FlightStatus::Complete);
        assert_eq!(batch.apply(Airborne, Ground), FlightStatus::Complete);
        assert_eq!(batch.apply(Airborne, Airborne), FlightStatus::Partial);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let mut reports = vec![
            report(0, true, 48.35, 11.78),
            report(3, false, 48.40, 11.90),
            report(40, false, 50.03, 8.57),
            report(52, true, 50.04, 8.56),
        ];
        reports[2].baro_altitude = Some(9500.0);
        let summarizer = EpisodeSummarizer::default();

        let first = summarizer.summarize(&reports, CompletenessRule::BothGrounded);
        let second = summarizer.summarize(&reports, CompletenessRule::BothGrounded);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_report_yields_nothing() {
        let reports = vec![report(0, true, 48.35, 11.78)];
        assert!(EpisodeSummarizer::default()
            .summarize(&reports, CompletenessRule::BothGrounded)
            .is_none());
        assert!(EpisodeSummarizer::default()
            .summarize(&[], CompletenessRule::EitherGrounded)
            .is_none());
    }
}
