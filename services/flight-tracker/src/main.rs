//! Flight Tracker - polls a snapshot feed and records flight episodes

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flight_tracker::backfill::run_backfill;
use flight_tracker::clock::SystemClock;
use flight_tracker::config::{Config, Mode};
use flight_tracker::feed::OpenSkyClient;
use flight_tracker::recorder::TrackingLoop;
use flight_tracker::store::{FlightStore, MemoryStore, PgStore, ReportBuffer};
use flight_tracker::{SegmentEngine, StateTracker};

/// Both store roles backed by one connection
struct Stores {
    flights: Arc<dyn FlightStore>,
    buffer: Arc<dyn ReportBuffer>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flight_tracker=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("===========================================");
    info!("   Flight Tracker - episode reconstruction");
    info!("===========================================");

    let config = Config::from_env();

    info!("Configuration:");
    info!("  Mode: {:?}", config.mode);
    info!("  Feed URL: {}", config.feed_url);
    info!("  Poll interval: {}s", config.poll_interval_secs);
    info!("  Gap threshold: {}s", config.tracker.gap_threshold.num_seconds());
    info!("  Staleness window: {}s", config.tracker.staleness_window.num_seconds());
    info!("  Buffer raw reports: {}", config.buffer_raw_reports);
    info!(
        "  Database: {}@{}:{}/{}",
        config.db.user, config.db.host, config.db.port, config.db.dbname
    );

    let stores = connect(&config).await;

    match config.mode {
        Mode::Track => track(&config, stores).await,
        Mode::Backfill => backfill(&config, stores).await,
        Mode::Stats => stats(stores).await,
    }
}

async fn connect(config: &Config) -> Stores {
    let pg = match PgStore::connect(&config.db).await {
        Ok(store) => match store.ensure_schema().await {
            Ok(()) => Some(Arc::new(store)),
            Err(e) => {
                error!("Failed to prepare schema: {}", e);
                None
            }
        },
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            None
        }
    };

    match pg {
        Some(store) => {
            info!("Connected to database");
            Stores {
                flights: store.clone(),
                buffer: store,
            }
        }
        None => {
            error!("Continuing with in-memory store; nothing will survive a restart.");
            let store = Arc::new(MemoryStore::new());
            Stores {
                flights: store.clone(),
                buffer: store,
            }
        }
    }
}

async fn track(config: &Config, stores: Stores) -> Result<()> {
    let source = OpenSkyClient::new(&config.feed_url).context("failed to build feed client")?;
    let tracker = StateTracker::new(&config.tracker, Arc::new(SystemClock));

    let mut tracking = TrackingLoop::new(tracker, stores.flights);
    if config.buffer_raw_reports {
        tracking = tracking.with_buffer(stores.buffer);
    }

    match tracking.restore().await {
        Ok(count) => info!("Resumed {} sessions", count),
        Err(e) => error!("Failed to restore sessions: {}. Starting empty.", e),
    }

    info!("Polling every {}s", config.poll_interval_secs);
    tracking
        .run(&source, Duration::from_secs(config.poll_interval_secs))
        .await;

    info!("Tracker stopped");
    Ok(())
}

async fn backfill(config: &Config, stores: Stores) -> Result<()> {
    let engine = SegmentEngine::new(&config.tracker);
    let today = chrono::Utc::now().date_naive();

    let summary = run_backfill(stores.buffer.as_ref(), stores.flights.as_ref(), &engine, today)
        .await
        .context("backfill failed")?;

    info!("Backfilled before {}: {}", today, summary);
    Ok(())
}

async fn stats(stores: Stores) -> Result<()> {
    let stats = stores
        .buffer
        .buffer_stats()
        .await
        .context("failed to read buffer statistics")?;

    match &stats.most_frequent {
        Some(top) => info!("Most common ICAO24: {} with {} reports", top.icao24, top.count),
        None => info!("No buffered reports"),
    }
    info!("Total buffered reports: {}", stats.total_reports);
    info!("Distinct ICAO24 identifiers: {}", stats.distinct_icao24);
    Ok(())
}
