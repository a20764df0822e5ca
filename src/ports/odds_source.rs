//! Odds Source Port - Pollable Origin Interface
//!
//! Every origin kind (HTTP API, pushed feed, manual batch) sits behind
//! the single `poll()` capability; the pipeline holds a collection of
//! `Arc<dyn OddsSource>` and never switches on a kind tag.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::movement::MarketKey;
use crate::domain::odds::OddsFormat;

/// Kind of a registered data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// HTTP endpoint polled for a JSON tick array.
    Api,
    /// Pushed feed buffered in-process and drained on each poll.
    Feed,
    /// Operator-supplied batches, typically for backfill.
    Manual,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Feed => write!(f, "feed"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Registration descriptor for a pollable origin.
///
/// Created and updated by operator action (config file or direct call);
/// polling starts and stops as `active` toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique source identifier; recorded on every movement it produces.
    pub source_id: String,
    /// Origin kind.
    pub kind: SourceKind,
    /// HTTP endpoint for api-kind sources.
    pub endpoint: Option<String>,
    /// Poll cadence in milliseconds.
    pub poll_interval_ms: u64,
    /// Whether the source should currently be polled.
    pub active: bool,
}

/// One normalized price tick from a source, before dedup.
///
/// The raw value is carried as a string covering all three notations
/// ("2.50", "-150", "5/2"); parsing and validation happen in the
/// pipeline so a malformed tick becomes a per-item ingestion error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsUpdate {
    pub event_id: String,
    pub market_id: String,
    pub selection_id: String,
    pub format: OddsFormat,
    pub value: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl OddsUpdate {
    pub fn key(&self) -> MarketKey {
        MarketKey::new(
            self.event_id.clone(),
            self.market_id.clone(),
            self.selection_id.clone(),
        )
    }
}

/// Poll failures. Isolated per source: a failing poll is logged and
/// retried on the next interval, never crashing the pipeline.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Payload(String),
    #[error("source is closed")]
    Closed,
}

/// Trait for pollable odds origins.
#[async_trait]
pub trait OddsSource: Send + Sync + 'static {
    /// Registration descriptor for this source.
    fn descriptor(&self) -> SourceDescriptor;

    /// Fetch whatever ticks the origin currently has. An empty batch is
    /// a normal outcome, not an error.
    async fn poll(&self) -> Result<Vec<OddsUpdate>, SourceError>;
}
