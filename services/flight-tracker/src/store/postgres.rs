//! PostgreSQL store with connection pooling

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use serde_json::Value as JsonValue;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

use super::{BufferStats, FlightStore, IcaoCount, ReportBuffer};
use crate::config::DbConfig;
use crate::episode::{EndpointStatus, FlightEpisode, FlightStatus, TracePoint};
use crate::error::StoreError;
use crate::report::PositionReport;
use crate::segment::SegmentKey;
use crate::session::PersistedSession;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Query parameters for episode listings
#[derive(Debug, Clone, Default)]
pub struct EpisodeFilter {
    pub icao24: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: i64,
}

/// Database store backed by a deadpool connection pool
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Create the pool and test the connection
    pub async fn connect(db: &DbConfig) -> Result<Self, StoreError> {
        let mut config = Config::new();
        config.host = Some(db.host.clone());
        config.port = Some(db.port);
        config.dbname = Some(db.dbname.clone());
        config.user = Some(db.user.clone());
        config.password = Some(db.password.clone());

        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        // Test connection
        let client = pool.get().await?;
        client.execute("SELECT 1", &[]).await?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        info!("Database schema ready");
        Ok(())
    }

    /// Most recent episodes, newest departure first
    pub async fn recent_episodes(
        &self,
        filter: &EpisodeFilter,
    ) -> Result<Vec<FlightEpisode>, StoreError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT
                    icao24, callsign, origin_country, flight_date,
                    departure_time, arrival_time, duration_minutes,
                    start_status, end_status, flight_status,
                    max_altitude, max_velocity, distance_km,
                    position_count, positions
                FROM flight_episodes
                WHERE ($1::text IS NULL OR icao24 = $1)
                  AND ($2::date IS NULL OR flight_date = $2)
                ORDER BY departure_time DESC
                LIMIT $3",
                &[&filter.icao24, &filter.date, &filter.limit],
            )
            .await?;

        rows.iter().map(episode_from_row).collect()
    }
}

fn episode_from_row(row: &Row) -> Result<FlightEpisode, StoreError> {
    let start: String = row.try_get("start_status")?;
    let end: String = row.try_get("end_status")?;
    let status: String = row.try_get("flight_status")?;
    let positions: JsonValue = row.try_get("positions")?;
    let positions: Vec<TracePoint> = serde_json::from_value(positions)?;
    let position_count: i32 = row.try_get("position_count")?;

    let corrupt = |field: &str, value: &str| {
        StoreError::CorruptRecord(format!("episode {} '{}'", field, value))
    };

    Ok(FlightEpisode {
        icao24: row.try_get("icao24")?,
        callsign: row.try_get("callsign")?,
        origin_country: row.try_get("origin_country")?,
        flight_date: row.try_get("flight_date")?,
        departure_time: row.try_get("departure_time")?,
        arrival_time: row.try_get("arrival_time")?,
        duration_minutes: row.try_get("duration_minutes")?,
        start_status: EndpointStatus::parse(&start).ok_or_else(|| corrupt("start_status", &start))?,
        end_status: EndpointStatus::parse(&end).ok_or_else(|| corrupt("end_status", &end))?,
        flight_status: FlightStatus::parse(&status)
            .ok_or_else(|| corrupt("flight_status", &status))?,
        max_altitude: row.try_get("max_altitude")?,
        max_velocity: row.try_get("max_velocity")?,
        distance_km: row.try_get("distance_km")?,
        position_count: usize::try_from(position_count).unwrap_or(0),
        positions,
    })
}

fn report_from_row(row: &Row) -> Result<PositionReport, StoreError> {
    let latitude: f64 = row.try_get("latitude")?;
    let longitude: f64 = row.try_get("longitude")?;
    let callsign: String = row.try_get("callsign")?;
    let timestamp: DateTime<Utc> = row.try_get("observed_at")?;

    let mut report = PositionReport::new(
        row.try_get::<_, String>("icao24")?,
        timestamp,
        row.try_get("on_ground")?,
    )
    .with_callsign(&callsign)
    .with_position(latitude, longitude);

    report.origin_country = row.try_get("origin_country")?;
    report.baro_altitude = row.try_get("baro_altitude")?;
    report.velocity = row.try_get("velocity")?;
    report.true_track = row.try_get("true_track")?;
    report.vertical_rate = row.try_get("vertical_rate")?;
    report.geo_altitude = row.try_get("geo_altitude")?;
    report.squawk = row.try_get("squawk")?;
    report.position_source = row.try_get("position_source")?;
    report.category = row.try_get("category")?;
    Ok(report)
}

#[async_trait]
impl FlightStore for PgStore {
    async fn append_episode(&self, episode: &FlightEpisode) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let positions = serde_json::to_value(&episode.positions)?;
        let position_count = i32::try_from(episode.position_count).unwrap_or(i32::MAX);

        client
            .execute(
                "INSERT INTO flight_episodes (
                    icao24, callsign, origin_country, flight_date,
                    departure_time, arrival_time, duration_minutes,
                    start_status, end_status, flight_status,
                    max_altitude, max_velocity, distance_km,
                    position_count, positions
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
                )",
                &[
                    &episode.icao24,
                    &episode.callsign,
                    &episode.origin_country,
                    &episode.flight_date,
                    &episode.departure_time,
                    &episode.arrival_time,
                    &episode.duration_minutes,
                    &episode.start_status.as_str(),
                    &episode.end_status.as_str(),
                    &episode.flight_status.as_str(),
                    &episode.max_altitude,
                    &episode.max_velocity,
                    &episode.distance_km,
                    &position_count,
                    &positions,
                ],
            )
            .await?;

        debug!("Stored episode for {}", episode.icao24);
        Ok(())
    }

    async fn upsert_session(&self, session: &PersistedSession) -> Result<(), StoreError> {
        let client = self.pool.get().await?;

        client
            .execute(
                "INSERT INTO tracking_sessions (
                    icao24, callsign, origin_country, session_start_time,
                    last_update_time, status, takeoff_time, positions
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (icao24) DO UPDATE SET
                    callsign = EXCLUDED.callsign,
                    origin_country = EXCLUDED.origin_country,
                    session_start_time = EXCLUDED.session_start_time,
                    last_update_time = EXCLUDED.last_update_time,
                    status = EXCLUDED.status,
                    takeoff_time = EXCLUDED.takeoff_time,
                    positions = EXCLUDED.positions",
                &[
                    &session.icao24,
                    &session.callsign,
                    &session.origin_country,
                    &session.session_start_time,
                    &session.last_update_time,
                    &session.status,
                    &session.takeoff_time,
                    &session.positions,
                ],
            )
            .await?;

        Ok(())
    }

    async fn delete_session(&self, icao24: &str) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM tracking_sessions WHERE icao24 = $1", &[&icao24])
            .await?;
        Ok(())
    }

    async fn load_sessions(&self) -> Result<Vec<PersistedSession>, StoreError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT
                    icao24, callsign, origin_country, session_start_time,
                    last_update_time, status, takeoff_time, positions
                FROM tracking_sessions
                ORDER BY icao24",
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<PersistedSession, StoreError> {
                Ok(PersistedSession {
                    icao24: row.try_get("icao24")?,
                    callsign: row.try_get("callsign")?,
                    origin_country: row.try_get("origin_country")?,
                    session_start_time: row.try_get("session_start_time")?,
                    last_update_time: row.try_get("last_update_time")?,
                    status: row.try_get("status")?,
                    takeoff_time: row.try_get("takeoff_time")?,
                    positions: row.try_get("positions")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ReportBuffer for PgStore {
    async fn buffer_reports(&self, reports: &[PositionReport]) -> Result<u64, StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let stmt = tx
            .prepare(
                "INSERT INTO position_reports (
                    icao24, callsign, origin_country, observed_at,
                    latitude, longitude, baro_altitude, velocity,
                    true_track, vertical_rate, on_ground,
                    geo_altitude, squawk, position_source, category
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
                )",
            )
            .await?;

        let mut stored = 0;
        for report in reports {
            let (Some(callsign), Some(coord)) = (report.callsign(), report.coordinate()) else {
                continue;
            };
            stored += tx
                .execute(
                    &stmt,
                    &[
                        &report.icao24,
                        &callsign,
                        &report.origin_country,
                        &report.timestamp,
                        &coord.latitude,
                        &coord.longitude,
                        &report.baro_altitude,
                        &report.velocity,
                        &report.true_track,
                        &report.vertical_rate,
                        &report.on_ground,
                        &report.geo_altitude,
                        &report.squawk,
                        &report.position_source,
                        &report.category,
                    ],
                )
                .await?;
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn buffered_keys(&self) -> Result<Vec<SegmentKey>, StoreError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT DISTINCT
                    icao24,
                    callsign,
                    (observed_at AT TIME ZONE 'UTC')::date AS day
                FROM position_reports
                ORDER BY icao24, callsign, day",
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<SegmentKey, StoreError> {
                Ok(SegmentKey {
                    icao24: row.try_get("icao24")?,
                    callsign: row.try_get("callsign")?,
                    day: row.try_get("day")?,
                })
            })
            .collect()
    }

    async fn buffered_reports(&self, key: &SegmentKey) -> Result<Vec<PositionReport>, StoreError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT
                    icao24, callsign, origin_country, observed_at,
                    latitude, longitude, baro_altitude, velocity,
                    true_track, vertical_rate, on_ground,
                    geo_altitude, squawk, position_source, category
                FROM position_reports
                WHERE icao24 = $1
                  AND callsign = $2
                  AND (observed_at AT TIME ZONE 'UTC')::date = $3
                ORDER BY id",
                &[&key.icao24, &key.callsign, &key.day],
            )
            .await?;

        rows.iter().map(report_from_row).collect()
    }

    async fn discard_buffered(&self, key: &SegmentKey) -> Result<u64, StoreError> {
        let client = self.pool.get().await?;

        let removed = client
            .execute(
                "DELETE FROM position_reports
                WHERE icao24 = $1
                  AND callsign = $2
                  AND (observed_at AT TIME ZONE 'UTC')::date = $3",
                &[&key.icao24, &key.callsign, &key.day],
            )
            .await?;

        Ok(removed)
    }

    async fn buffer_stats(&self) -> Result<BufferStats, StoreError> {
        let client = self.pool.get().await?;

        let totals = client
            .query_one(
                "SELECT COUNT(*) AS total, COUNT(DISTINCT icao24) AS distinct_icao24
                FROM position_reports",
                &[],
            )
            .await?;
        let total: i64 = totals.try_get("total")?;
        let distinct: i64 = totals.try_get("distinct_icao24")?;

        let top = client
            .query_opt(
                "SELECT icao24, COUNT(*) AS count
                FROM position_reports
                GROUP BY icao24
                ORDER BY count DESC, icao24
                LIMIT 1",
                &[],
            )
            .await?;
        let most_frequent = match top {
            Some(row) => {
                let count: i64 = row.try_get("count")?;
                Some(IcaoCount {
                    icao24: row.try_get("icao24")?,
                    count: u64::try_from(count).unwrap_or(0),
                })
            }
            None => None,
        };

        Ok(BufferStats {
            total_reports: u64::try_from(total).unwrap_or(0),
            distinct_icao24: u64::try_from(distinct).unwrap_or(0),
            most_frequent,
        })
    }
}
