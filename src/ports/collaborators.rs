//! Collaborator Ports - External Subsystem Interfaces
//!
//! Interfaces to data owned by the excluded reporting/ledger services:
//! event metadata for timing categorization and the wager dataset for
//! market-impact aggregation. This core only reads through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lookup of event scheduling data.
#[async_trait]
pub trait EventMetadata: Send + Sync + 'static {
    /// Scheduled start time of an event, or `None` when the event is
    /// unknown to the metadata service.
    async fn event_start_time(&self, event_id: &str)
    -> anyhow::Result<Option<DateTime<Utc>>>;
}

/// One settled wager as supplied by the betting subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    /// Stake amount.
    pub amount: Decimal,
    /// Odds the bet was accepted at, in decimal format.
    pub accepted_odds: f64,
    /// Placement timestamp.
    pub placed_at: DateTime<Utc>,
}

/// Wager volume totals for one market and window, bucketed by timing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WagerVolume {
    pub total_volume: Decimal,
    pub bet_count: u64,
    pub early_volume: Decimal,
    pub mid_volume: Decimal,
    pub late_volume: Decimal,
    pub peak_volume: Decimal,
    /// Realized revenue for the window, as booked by the ledger.
    pub actual_revenue: Decimal,
}

impl WagerVolume {
    /// Fraction of total volume placed early, if there was any volume.
    pub fn early_fraction(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        if self.total_volume.is_zero() {
            return None;
        }
        (self.early_volume / self.total_volume).to_f64()
    }
}

/// Aggregate wager data source for a market and time window.
#[async_trait]
pub trait WagerData: Send + Sync + 'static {
    /// Volume totals and per-timing-bucket breakdown.
    async fn volume_for_market(
        &self,
        event_id: &str,
        market_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<WagerVolume>;

    /// Individual bets placed on the market within the window.
    async fn bets_for_market(
        &self,
        event_id: &str,
        market_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BetRecord>>;
}
