//! Configuration loaded from environment variables

use chrono::{Duration, TimeDelta};
use tracing::warn;

use crate::geo::DEFAULT_EARTH_RADIUS_KM;

/// Default gap between reports that splits buffered reports into separate trips
pub const DEFAULT_GAP_THRESHOLD_SECS: i64 = 4 * 60 * 60;

/// Default age after which a live session is abandoned
pub const DEFAULT_STALENESS_WINDOW_SECS: i64 = 2 * 60 * 60;

/// Default OpenSky endpoint returning all current state vectors
pub const DEFAULT_FEED_URL: &str = "https://opensky-network.org/api/states/all";

/// Tunables for the tracking core
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Elapsed time above which consecutive buffered reports start a new trip
    pub gap_threshold: Duration,
    /// Time since last update after which a live session is dropped
    pub staleness_window: Duration,
    /// Sphere radius for distance calculations
    pub earth_radius_km: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gap_threshold: Duration::seconds(DEFAULT_GAP_THRESHOLD_SECS),
            staleness_window: Duration::seconds(DEFAULT_STALENESS_WINDOW_SECS),
            earth_radius_km: DEFAULT_EARTH_RADIUS_KM,
        }
    }
}

/// What the binary does once started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Poll the feed and run the live state machine
    Track,
    /// Segment buffered reports into episodes once, then exit
    Backfill,
    /// Print report archive statistics, then exit
    Stats,
}

impl Mode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Some(Self::Track),
            "backfill" => Some(Self::Backfill),
            "stats" => Some(Self::Stats),
            _ => None,
        }
    }
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("DB_NAME").unwrap_or_else(|_| "flights".to_string()),
            user: std::env::var("DB_USER").unwrap_or_else(|_| "flights".to_string()),
            password: std::env::var("DB_PASSWORD").unwrap_or_else(|_| "flights".to_string()),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,

    /// Snapshot endpoint
    pub feed_url: String,

    /// Seconds between polling ticks
    pub poll_interval_secs: u64,

    /// Archive every ingested report for later backfill
    pub buffer_raw_reports: bool,

    pub tracker: TrackerConfig,

    pub db: DbConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = TrackerConfig::default();

        Self {
            mode: std::env::var("MODE")
                .ok()
                .and_then(|s| Mode::parse(&s))
                .unwrap_or(Mode::Track),

            feed_url: std::env::var("FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string()),

            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(60),

            buffer_raw_reports: std::env::var("BUFFER_RAW_REPORTS")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(false),

            tracker: TrackerConfig {
                gap_threshold: duration_from_env("GAP_THRESHOLD_SECS", defaults.gap_threshold),

                staleness_window: duration_from_env(
                    "STALENESS_WINDOW_SECS",
                    defaults.staleness_window,
                ),

                earth_radius_km: std::env::var("EARTH_RADIUS_KM")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|r: &f64| r.is_finite() && *r > 0.0)
                    .unwrap_or(defaults.earth_radius_km),
            },

            db: DbConfig::from_env(),
        }
    }
}

/// Read a positive whole number of seconds, falling back to `default`
fn duration_from_env(var: &str, default: Duration) -> Duration {
    let Ok(raw) = std::env::var(var) else {
        return default;
    };
    match parse_positive_secs(&raw) {
        Some(duration) => duration,
        None => {
            warn!(
                "Ignoring {}={:?}: expected positive seconds, using {}s",
                var,
                raw,
                default.num_seconds()
            );
            default
        }
    }
}

/// Positive seconds that fit in a `TimeDelta`
fn parse_positive_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .and_then(TimeDelta::try_seconds)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
