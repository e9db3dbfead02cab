//! Snapshot feed client

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::FeedError;
use crate::ingest::{parse_states, IngestStats};
use crate::report::PositionReport;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One polling cycle's worth of reports
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub reports: Vec<PositionReport>,
    pub stats: IngestStats,
}

/// Anything that can produce the current snapshot batch
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, FeedError>;
}

/// OpenSky Network `states/all` client
pub struct OpenSkyClient {
    client: reqwest::Client,
    url: String,
}

impl OpenSkyClient {
    pub fn new(url: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SnapshotSource for OpenSkyClient {
    async fn fetch(&self) -> Result<Snapshot, FeedError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let body: serde_json::Value = response.json().await?;
        let (reports, stats) = parse_states(&body);
        debug!("Fetched snapshot: {}", stats);

        Ok(Snapshot { reports, stats })
    }
}
