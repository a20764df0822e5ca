//! Movement Store Port - Price History Persistence Interface
//!
//! Abstracts over whatever durable store holds the movement records.
//! The usecases layer only ever talks to this trait; adapters provide
//! in-memory and JSONL-journal implementations.
//!
//! Concurrency contract: implementations must support concurrent reads.
//! The fetch-latest/compare/insert sequence used for ingestion dedup is
//! serialized per market key by the pipeline, not by the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::movement::{MarketKey, MovementRecord};

/// Movement count for one market over a period, used for top-N rollups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketActivity {
    pub event_id: String,
    pub market_id: String,
    pub movements: usize,
}

/// Trait for movement-record persistence providers.
#[async_trait]
pub trait MovementStore: Send + Sync + 'static {
    /// Persist one immutable movement record.
    async fn insert(&self, record: MovementRecord) -> anyhow::Result<()>;

    /// Most recent record for a market key, if any.
    async fn latest_for_key(&self, key: &MarketKey) -> anyhow::Result<Option<MovementRecord>>;

    /// Records for one key observed strictly before `cutoff`, newest first.
    async fn movements_before(
        &self,
        key: &MarketKey,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MovementRecord>>;

    /// Records for one market (all selections) within `[start, end]`,
    /// oldest first.
    async fn movements_in_range(
        &self,
        event_id: &str,
        market_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MovementRecord>>;

    /// All records observed within `[start, end]`, oldest first.
    async fn movements_in_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MovementRecord>>;

    /// Records in a market window meeting the significance threshold.
    async fn significant_in_range(
        &self,
        event_id: &str,
        market_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        threshold_pct: f64,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        let all = self
            .movements_in_range(event_id, market_id, start, end)
            .await?;
        Ok(all
            .into_iter()
            .filter(|m| m.is_significant(threshold_pct))
            .collect())
    }

    /// Per-market movement counts for a period, most active first.
    async fn count_by_market(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<MarketActivity>>;

    /// Check if the store is usable (disk space, permissions).
    async fn is_healthy(&self) -> bool;
}
