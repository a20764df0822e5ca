//! API Odds Source - HTTP Polling Adapter
//!
//! Polls a JSON endpoint for an array of price ticks. Each poll is a
//! single GET; the pipeline wraps the call in its own timeout, and a
//! client-level timeout bounds the request as defense in depth.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::odds::OddsFormat;
use crate::ports::odds_source::{OddsSource, OddsUpdate, SourceDescriptor, SourceError};

/// Wire shape of one tick as served by upstream odds APIs.
#[derive(Debug, Deserialize)]
struct ApiTick {
    event_id: String,
    market_id: String,
    selection_id: String,
    format: OddsFormat,
    value: String,
    /// Tick timestamp; defaults to receive time when omitted.
    observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// HTTP polling source for api-kind descriptors.
pub struct ApiOddsSource {
    descriptor: SourceDescriptor,
    endpoint: String,
    client: reqwest::Client,
}

impl ApiOddsSource {
    /// Build a source from its descriptor.
    ///
    /// Fails when the descriptor carries no endpoint or the HTTP client
    /// cannot be constructed.
    pub fn new(descriptor: SourceDescriptor, request_timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = descriptor
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("api source {} has no endpoint", descriptor.source_id)
            })?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            descriptor,
            endpoint,
            client,
        })
    }
}

#[async_trait]
impl OddsSource for ApiOddsSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    #[instrument(skip(self), fields(source_id = %self.descriptor.source_id))]
    async fn poll(&self) -> Result<Vec<OddsUpdate>, SourceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let ticks: Vec<ApiTick> = response
            .json()
            .await
            .map_err(|e| SourceError::Payload(e.to_string()))?;

        debug!(ticks = ticks.len(), "Fetched tick batch");

        Ok(ticks
            .into_iter()
            .map(|t| OddsUpdate {
                event_id: t.event_id,
                market_id: t.market_id,
                selection_id: t.selection_id,
                format: t.format,
                value: t.value,
                observed_at: t.observed_at.unwrap_or_else(Utc::now),
                metadata: t.metadata,
            })
            .collect())
    }
}
