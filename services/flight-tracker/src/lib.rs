//! Flight Tracker - reconstructs flight episodes from aircraft state snapshots
//!
//! Live mode keeps a per-aircraft state machine across polling ticks and emits
//! an episode when a tracked aircraft lands. Backfill mode segments buffered
//! reports by time gaps instead.

pub mod backfill;
pub mod clock;
pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod geo;
pub mod ingest;
pub mod recorder;
pub mod report;
pub mod segment;
pub mod session;
pub mod store;
pub mod summary;
pub mod tracker;

pub use episode::{EndpointStatus, FlightEpisode, FlightStatus};
pub use error::{FeedError, StoreError};
pub use report::PositionReport;
pub use segment::SegmentEngine;
pub use session::{FlightPhase, PersistedSession, TrackingSession};
pub use summary::{CompletenessRule, EpisodeSummarizer};
pub use tracker::StateTracker;
