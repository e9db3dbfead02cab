//! Flight API - serves recorded episodes and live sessions over HTTP

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flight_tracker::config::DbConfig;
use flight_tracker::store::{EpisodeFilter, FlightStore, PgStore, ReportBuffer};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;

/// Shared application state
pub struct AppState {
    /// `None` when the database was unreachable at startup
    pub store: Option<PgStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flight_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("===========================================");
    info!("   Flight API - recorded flight episodes");
    info!("===========================================");

    let http_port: u16 = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8888);
    let db = DbConfig::from_env();

    info!("Configuration:");
    info!("  HTTP port: {}", http_port);
    info!("  Database: {}@{}:{}/{}", db.user, db.host, db.port, db.dbname);

    let store = match PgStore::connect(&db).await {
        Ok(store) => {
            info!("Connected to database");
            Some(store)
        }
        Err(e) => {
            error!("Failed to connect to database: {}. Continuing without DB.", e);
            None
        }
    };

    let app_state = Arc::new(AppState { store });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/episodes", get(get_episodes))
        .route("/api/sessions", get(get_sessions))
        .route("/api/stats", get(get_stats))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(app_state);

    let http_addr = format!("0.0.0.0:{}", http_port);
    info!("Starting HTTP server on {}", http_addr);

    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Query parameters for the episode listing
#[derive(serde::Deserialize)]
struct EpisodeParams {
    icao24: Option<String>,
    date: Option<NaiveDate>,
    limit: Option<i64>,
}

impl EpisodeParams {
    fn into_filter(self) -> EpisodeFilter {
        EpisodeFilter {
            icao24: self
                .icao24
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
            date: self.date,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn unavailable() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "database unavailable".to_string(),
    )
}

/// Recorded episodes, newest departure first
async fn get_episodes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EpisodeParams>,
) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return unavailable();
    };

    let filter = params.into_filter();
    match store.recent_episodes(&filter).await {
        Ok(episodes) => Json(episodes).into_response(),
        Err(e) => {
            error!("Failed to get episodes: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Sessions checkpointed by the tracker
async fn get_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return unavailable();
    };

    match store.load_sessions().await {
        Ok(sessions) => Json(sessions).into_response(),
        Err(e) => {
            error!("Failed to get sessions: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Report archive totals and the most frequently seen aircraft
async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return unavailable();
    };

    match store.buffer_stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Failed to get buffer stats: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_params_defaults_and_normalization() {
        let filter = EpisodeParams {
            icao24: Some(" 3C6444 ".to_string()),
            date: None,
            limit: None,
        }
        .into_filter();
        assert_eq!(filter.icao24.as_deref(), Some("3c6444"));
        assert_eq!(filter.limit, DEFAULT_LIMIT);

        let filter = EpisodeParams {
            icao24: Some("  ".to_string()),
            date: None,
            limit: Some(0),
        }
        .into_filter();
        assert_eq!(filter.icao24, None);
        assert_eq!(filter.limit, 1);
    }
}
