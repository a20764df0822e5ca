//! Bet-Timing Analyzer - Hindsight Scoring of Wager Placement
//!
//! For one wager, reconstructs the price history that was visible
//! before placement and scores how favorably the bet was timed:
//! timing bucket relative to event start, odds position against the
//! last observed price, forgone profit versus the best available
//! price, and an additive risk level.
//!
//! Missing data degrades to documented defaults rather than failing:
//! no prior movements → neutral position and zero savings; unknown
//! event start → mid timing, so absent metadata never inflates risk.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::movement::{MarketKey, MovementRecord};
use crate::domain::timing::{self, OddsPosition, RiskLevel, TimingCategory};
use crate::ports::collaborators::EventMetadata;
use crate::ports::events::{DomainEvent, EventPublisher};
use crate::ports::movement_store::MovementStore;

/// One wager to be assessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub id: String,
    pub customer_id: String,
    pub event_id: String,
    pub market_id: String,
    pub selection_id: String,
    /// Stake amount.
    pub amount: Decimal,
    /// Odds the bet was accepted at, in decimal format.
    pub accepted_odds: f64,
    pub placed_at: DateTime<Utc>,
}

impl BetRequest {
    pub fn key(&self) -> MarketKey {
        MarketKey::new(
            self.event_id.clone(),
            self.market_id.clone(),
            self.selection_id.clone(),
        )
    }
}

/// Timing assessment for one wager. Recomputed on demand, never stored
/// by this core; the caller owns the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetTimingAssessment {
    pub bet_id: String,
    pub key: MarketKey,
    /// Stake amount, carried for volume-weighted report rollups.
    pub amount: Decimal,
    pub timing: TimingCategory,
    /// Hours between placement and event start; `None` when the
    /// metadata service does not know the event.
    pub hours_before_start: Option<f64>,
    pub odds_position: OddsPosition,
    /// Forgone profit from not betting at the best later-observed price.
    pub potential_savings: Decimal,
    pub risk_score: u32,
    pub risk: RiskLevel,
    /// Movements visible before placement, newest first.
    pub movements_before: Vec<MovementRecord>,
}

/// Analyzer over the movement store and the event metadata collaborator.
pub struct BetTimingAnalyzer {
    store: Arc<dyn MovementStore>,
    metadata: Arc<dyn EventMetadata>,
    publisher: Arc<dyn EventPublisher>,
}

impl BetTimingAnalyzer {
    pub fn new(
        store: Arc<dyn MovementStore>,
        metadata: Arc<dyn EventMetadata>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            metadata,
            publisher,
        }
    }

    /// Assess one wager against the price history before its placement.
    #[instrument(skip(self, bet), fields(bet_id = %bet.id))]
    pub async fn analyze(&self, bet: &BetRequest) -> Result<BetTimingAssessment> {
        let key = bet.key();

        let movements = self
            .store
            .movements_before(&key, bet.placed_at)
            .await
            .context("failed to load movement history")?;

        let start_time = self
            .metadata
            .event_start_time(&bet.event_id)
            .await
            .context("failed to look up event start time")?;

        let hours_before_start = start_time.map(|start| {
            (start - bet.placed_at).num_milliseconds() as f64 / 3_600_000.0
        });
        let timing = match hours_before_start {
            Some(hours) => TimingCategory::from_hours_before_start(hours),
            None => {
                debug!(event_id = %bet.event_id, "No event start time, defaulting to mid timing");
                TimingCategory::Mid
            }
        };

        let odds_position = match movements.first() {
            Some(latest) => timing::odds_position(bet.accepted_odds, latest.current_decimal()),
            None => OddsPosition::Neutral,
        };

        let potential_savings = Self::potential_savings(bet, &movements);

        let risk_score = timing::risk_score(timing, odds_position, movements.len());
        let risk = RiskLevel::from_score(risk_score);

        let assessment = BetTimingAssessment {
            bet_id: bet.id.clone(),
            key: key.clone(),
            amount: bet.amount,
            timing,
            hours_before_start,
            odds_position,
            potential_savings,
            risk_score,
            risk,
            movements_before: movements,
        };

        self.publisher.publish(DomainEvent::TimingAnalyzed {
            bet_id: assessment.bet_id.clone(),
            key,
            timing: assessment.timing,
            odds_position: assessment.odds_position,
            potential_savings: assessment.potential_savings,
            risk: assessment.risk,
        });

        Ok(assessment)
    }

    /// Forgone profit versus the best decimal price observed before the
    /// bet: `amount*(best-1) - amount*(accepted-1)`, floored at zero.
    fn potential_savings(bet: &BetRequest, movements: &[MovementRecord]) -> Decimal {
        let best = movements
            .iter()
            .map(MovementRecord::current_decimal)
            .fold(f64::MIN, f64::max);

        if movements.is_empty() || best <= bet.accepted_odds {
            return Decimal::ZERO;
        }

        let best = Decimal::from_f64(best).unwrap_or_default();
        let accepted = Decimal::from_f64(bet.accepted_odds).unwrap_or_default();
        bet.amount * (best - Decimal::ONE) - bet.amount * (accepted - Decimal::ONE)
    }
}
