//! Market-Impact Analyzer - Windowed Efficiency Assessment
//!
//! Aggregates movement history and wager volume for one market over a
//! time window into financial-impact figures and a 0-100 efficiency
//! score. The opportunity-cost figure is a documented estimate built on
//! a fixed improvement-rate assumption, not a measured value.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::AnalysisConfig;
use crate::domain::movement::MovementRecord;
use crate::domain::timing::{self, OddsPosition};
use crate::ports::collaborators::{BetRecord, WagerData, WagerVolume};
use crate::ports::events::{DomainEvent, EventPublisher};
use crate::ports::movement_store::MovementStore;

/// Window validation failures.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid period: start {start} is not before end {end}")]
    InvalidPeriod {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Estimated financial impact of mistimed wagers on one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialImpact {
    /// Revenue booked by the ledger for the window.
    pub actual_revenue: Decimal,
    /// Estimated forgone revenue from unfavorably timed bets.
    pub opportunity_cost: Decimal,
    /// Actual revenue plus the opportunity-cost estimate.
    pub potential_revenue: Decimal,
    /// Actual revenue after the configured risk haircut.
    pub risk_adjusted_revenue: Decimal,
    /// Bets whose accepted odds sat below the last observed price.
    pub unfavorable_bet_count: usize,
}

/// Efficiency assessment for one market and window. Recomputed on
/// demand; the caller owns the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketImpactAssessment {
    pub event_id: String,
    pub market_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub movements: Vec<MovementRecord>,
    pub total_movements: usize,
    pub significant_movements: usize,
    pub volume: WagerVolume,
    pub financial: FinancialImpact,
    /// Heuristic 0-100 stability/accuracy measure for the window.
    pub efficiency_score: f64,
}

/// Analyzer over the movement store and the wager-data collaborator.
pub struct MarketImpactAnalyzer {
    store: Arc<dyn MovementStore>,
    wagers: Arc<dyn WagerData>,
    publisher: Arc<dyn EventPublisher>,
    config: AnalysisConfig,
}

impl MarketImpactAnalyzer {
    pub fn new(
        store: Arc<dyn MovementStore>,
        wagers: Arc<dyn WagerData>,
        publisher: Arc<dyn EventPublisher>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            store,
            wagers,
            publisher,
            config,
        }
    }

    /// Assess one market over `[start, end]`.
    #[instrument(skip(self))]
    pub async fn analyze(
        &self,
        event_id: &str,
        market_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MarketImpactAssessment> {
        if start >= end {
            return Err(AnalysisError::InvalidPeriod { start, end }.into());
        }

        let movements = self
            .store
            .movements_in_range(event_id, market_id, start, end)
            .await
            .context("failed to load movement window")?;

        let volume = self
            .wagers
            .volume_for_market(event_id, market_id, start, end)
            .await
            .context("failed to load wager volume")?;

        let bets = self
            .wagers
            .bets_for_market(event_id, market_id, start, end)
            .await
            .context("failed to load bet records")?;

        let total_movements = movements.len();
        let significant_movements = movements
            .iter()
            .filter(|m| m.is_significant(self.config.significance_threshold_pct))
            .count();

        let financial = self.financial_impact(&bets, &movements, &volume);
        let efficiency_score = efficiency_score(
            total_movements,
            significant_movements,
            volume.early_fraction(),
        );

        let assessment = MarketImpactAssessment {
            event_id: event_id.to_string(),
            market_id: market_id.to_string(),
            window_start: start,
            window_end: end,
            movements,
            total_movements,
            significant_movements,
            volume,
            financial,
            efficiency_score,
        };

        self.publisher.publish(DomainEvent::MarketImpactAnalyzed {
            event_id: assessment.event_id.clone(),
            market_id: assessment.market_id.clone(),
            window_start: start,
            window_end: end,
            efficiency_score: assessment.efficiency_score,
            opportunity_cost: assessment.financial.opportunity_cost,
        });

        Ok(assessment)
    }

    /// Opportunity cost: unfavorable bets times the average stake times
    /// the configured improvement-rate assumption (stock 5%).
    fn financial_impact(
        &self,
        bets: &[BetRecord],
        movements: &[MovementRecord],
        volume: &WagerVolume,
    ) -> FinancialImpact {
        let unfavorable_bet_count = bets
            .iter()
            .filter(|bet| {
                latest_before(movements, bet.placed_at).is_some_and(|m| {
                    timing::odds_position(bet.accepted_odds, m.current_decimal())
                        == OddsPosition::Unfavorable
                })
            })
            .count();

        let avg_amount = if bets.is_empty() {
            Decimal::ZERO
        } else {
            bets.iter().map(|b| b.amount).sum::<Decimal>()
                / Decimal::from(bets.len() as u64)
        };

        let rate = Decimal::from_f64(self.config.opportunity_cost_rate).unwrap_or_default();
        let haircut =
            Decimal::from_f64(self.config.risk_adjustment_factor).unwrap_or(Decimal::ONE);

        let opportunity_cost = Decimal::from(unfavorable_bet_count as u64) * avg_amount * rate;

        FinancialImpact {
            actual_revenue: volume.actual_revenue,
            opportunity_cost,
            potential_revenue: volume.actual_revenue + opportunity_cost,
            risk_adjusted_revenue: volume.actual_revenue * haircut,
            unfavorable_bet_count,
        }
    }
}

/// Last movement observed strictly before `at`, if any.
fn latest_before(movements: &[MovementRecord], at: DateTime<Utc>) -> Option<&MovementRecord> {
    movements
        .iter()
        .filter(|m| m.observed_at < at)
        .max_by_key(|m| m.observed_at)
}

/// Heuristic efficiency score on [0, 100].
///
/// Starts at 100: volatility penalties of -20 above 50 movements or
/// -10 above 20; -15 when under 30% of volume arrived early (skipped
/// with no volume at all); +10 stability bonus when under 20% of
/// movements were significant. Total for zero movements: the fractions
/// degrade to 0 instead of dividing by zero.
pub fn efficiency_score(
    total_movements: usize,
    significant_movements: usize,
    early_volume_fraction: Option<f64>,
) -> f64 {
    let mut score: f64 = 100.0;

    if total_movements > 50 {
        score -= 20.0;
    } else if total_movements > 20 {
        score -= 10.0;
    }

    if let Some(early) = early_volume_fraction {
        if early < 0.30 {
            score -= 15.0;
        }
    }

    let significant_fraction = if total_movements == 0 {
        0.0
    } else {
        significant_movements as f64 / total_movements as f64
    };
    if significant_fraction < 0.20 {
        score += 10.0;
    }

    score.clamp(0.0, 100.0)
}
