//! Record source abstraction for telemetry ingestion.
//!
//! A source yields one batch of raw API records per inference run: either
//! live from the charge-management API or replayed from memory.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::acquisition::{client, FetchError, TelemetryClient};
use crate::config::{ConfigError, Credentials, ModelConfig};

/// Trait abstracting where raw telemetry records come from.
///
/// The pipeline wraps [`fetch`](RecordSource::fetch) in its own deadline, so
/// implementations need not enforce one.
#[async_trait]
pub trait RecordSource: Send {
    /// Fetch the current batch of raw records.
    async fn fetch(&mut self) -> Result<Vec<Value>, FetchError>;

    /// Human-readable name for logging (e.g. "http", "static").
    fn source_name(&self) -> &str;

    /// Label reports from this source are filed under.
    fn device_label(&self, device_id: &str) -> String {
        device_id.to_string()
    }
}

// ============================================================================
// HTTP Source
// ============================================================================

/// Fetches the latest records for one device endpoint.
pub struct HttpRecordSource {
    client: TelemetryClient,
    endpoint: String,
    credentials: Option<Credentials>,
}

impl HttpRecordSource {
    pub fn new(client: TelemetryClient, endpoint: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
        }
    }

    /// Source for a device listed in the model configuration bundle.
    pub fn for_device(
        client: TelemetryClient,
        config: &ModelConfig,
        device_id: &str,
        credentials: Option<Credentials>,
    ) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint_for(device_id)?;
        Ok(Self::new(client, endpoint, credentials))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch(&mut self) -> Result<Vec<Value>, FetchError> {
        self.client
            .fetch(&self.endpoint, self.credentials.as_ref())
            .await
    }

    fn source_name(&self) -> &str {
        "http"
    }

    fn device_label(&self, device_id: &str) -> String {
        client::device_label(device_id, &self.endpoint)
    }
}

// ============================================================================
// Static Source (replay / tests)
// ============================================================================

/// Serves a fixed batch of records, optionally after a delay.
pub struct StaticRecordSource {
    records: Vec<Value>,
    delay: Duration,
}

impl StaticRecordSource {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            delay: Duration::ZERO,
        }
    }

    /// Delay every fetch, e.g. to exercise the fetch deadline.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl RecordSource for StaticRecordSource {
    async fn fetch(&mut self) -> Result<Vec<Value>, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.records.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}
