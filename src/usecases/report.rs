//! Report Builder - Periodic Movement and Timing Rollups
//!
//! Rolls the movement history and the analyzer outputs for a period
//! into one summary document with rule-based recommendations. The
//! recommendations are advisory strings for the reporting layer, never
//! actions taken by this core.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::domain::odds::{Magnitude, MovementKind};
use crate::domain::timing::TimingCategory;
use crate::ports::events::{DomainEvent, EventPublisher};
use crate::ports::movement_store::{MarketActivity, MovementStore};
use crate::usecases::bet_timing::BetTimingAssessment;
use crate::usecases::market_impact::{AnalysisError, MarketImpactAssessment};

/// Opportunity cost above which the report recommends timing-based
/// pricing.
const OPPORTUNITY_COST_ALERT: Decimal = dec!(10000);

/// Movement counts split by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub increase: usize,
    pub decrease: usize,
    pub unchanged: usize,
}

/// Movement counts split by magnitude bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnitudeCounts {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
    pub extreme: usize,
}

/// Bet counts split by timing category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingBetCounts {
    pub early: usize,
    pub mid: usize,
    pub late: usize,
    pub peak: usize,
}

/// Summary document for one reporting period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_movements: usize,
    pub significant_movements: usize,
    pub by_kind: KindCounts,
    pub by_magnitude: MagnitudeCounts,
    /// Most active markets, capped at the configured top-N.
    pub top_markets: Vec<MarketActivity>,
    pub timing_bet_counts: TimingBetCounts,
    /// Stake-weighted mean of the timing weights (early 4 .. peak 1).
    /// Zero when the period had no analyzed stake.
    pub average_timing_score: f64,
    /// Sum of the market-impact opportunity-cost estimates.
    pub total_opportunity_cost: Decimal,
    /// Advisory strings, never empty.
    pub recommendations: Vec<String>,
}

/// Builder over the movement store; analyzer outputs are handed in by
/// the caller, which decides which bets and markets belong to a report.
pub struct ReportBuilder {
    store: Arc<dyn MovementStore>,
    publisher: Arc<dyn EventPublisher>,
    config: AnalysisConfig,
}

impl ReportBuilder {
    pub fn new(
        store: Arc<dyn MovementStore>,
        publisher: Arc<dyn EventPublisher>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Build the summary for `[start, end]`.
    #[instrument(skip(self, timings, impacts))]
    pub async fn build(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timings: &[BetTimingAssessment],
        impacts: &[MarketImpactAssessment],
    ) -> Result<MovementReport> {
        if start >= end {
            return Err(AnalysisError::InvalidPeriod { start, end }.into());
        }

        let movements = self
            .store
            .movements_in_period(start, end)
            .await
            .context("failed to load period movements")?;

        let mut by_kind = KindCounts::default();
        let mut by_magnitude = MagnitudeCounts::default();
        let mut significant_movements = 0;
        for movement in &movements {
            match movement.movement_kind {
                MovementKind::Increase => by_kind.increase += 1,
                MovementKind::Decrease => by_kind.decrease += 1,
                MovementKind::Unchanged => by_kind.unchanged += 1,
            }
            match movement.magnitude() {
                Magnitude::Small => by_magnitude.small += 1,
                Magnitude::Medium => by_magnitude.medium += 1,
                Magnitude::Large => by_magnitude.large += 1,
                Magnitude::Extreme => by_magnitude.extreme += 1,
            }
            if movement.is_significant(self.config.significance_threshold_pct) {
                significant_movements += 1;
            }
        }

        let mut top_markets = self
            .store
            .count_by_market(start, end)
            .await
            .context("failed to load market activity")?;
        top_markets.truncate(self.config.top_markets);

        let mut timing_bet_counts = TimingBetCounts::default();
        for timing in timings {
            match timing.timing {
                TimingCategory::Early => timing_bet_counts.early += 1,
                TimingCategory::Mid => timing_bet_counts.mid += 1,
                TimingCategory::Late => timing_bet_counts.late += 1,
                TimingCategory::Peak => timing_bet_counts.peak += 1,
            }
        }

        let total_opportunity_cost = impacts
            .iter()
            .map(|i| i.financial.opportunity_cost)
            .sum::<Decimal>();

        let report = MovementReport {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            period_start: start,
            period_end: end,
            total_movements: movements.len(),
            significant_movements,
            by_kind,
            by_magnitude,
            top_markets,
            timing_bet_counts,
            average_timing_score: average_timing_score(timings),
            total_opportunity_cost,
            recommendations: recommendations(
                movements.len(),
                significant_movements,
                &timing_bet_counts,
                timings.len(),
                total_opportunity_cost,
            ),
        };

        info!(
            report_id = %report.id,
            total = report.total_movements,
            significant = report.significant_movements,
            recommendations = report.recommendations.len(),
            "report built"
        );
        self.publisher.publish(DomainEvent::ReportGenerated {
            report_id: report.id,
            period_start: start,
            period_end: end,
            total_movements: report.total_movements,
            recommendations: report.recommendations.len(),
        });

        Ok(report)
    }
}

/// Stake-weighted mean of the timing weights. Bets with a zero stake
/// contribute nothing; no stake at all yields zero.
fn average_timing_score(timings: &[BetTimingAssessment]) -> f64 {
    let total_stake: Decimal = timings.iter().map(|t| t.amount).sum();
    if total_stake.is_zero() {
        return 0.0;
    }
    let weighted: Decimal = timings
        .iter()
        .map(|t| t.amount * Decimal::from(t.timing.weight()))
        .sum();
    (weighted / total_stake).to_f64().unwrap_or(0.0)
}

/// Rule-based advisory list. Falls back to the monitoring default so a
/// report is never empty, even over sparse data.
fn recommendations(
    total_movements: usize,
    significant_movements: usize,
    timing_bet_counts: &TimingBetCounts,
    analyzed_bets: usize,
    total_opportunity_cost: Decimal,
) -> Vec<String> {
    let mut out = Vec::new();

    if total_movements > 0 {
        let significant_fraction = significant_movements as f64 / total_movements as f64;
        if significant_fraction > 0.30 {
            out.push(
                "High volatility: over 30% of movements were significant; \
                 review odds stabilization measures"
                    .to_string(),
            );
        }
    }

    if analyzed_bets > 0 {
        let early_fraction = timing_bet_counts.early as f64 / analyzed_bets as f64;
        if early_fraction < 0.20 {
            out.push(
                "Under 20% of bets were placed early; consider early-betting \
                 incentives"
                    .to_string(),
            );
        }
    }

    if total_opportunity_cost > OPPORTUNITY_COST_ALERT {
        out.push(format!(
            "Estimated opportunity cost {total_opportunity_cost} exceeds \
             $10,000; consider timing-based pricing"
        ));
    }

    if out.is_empty() {
        out.push("Monitor for emerging opportunities".to_string());
    }

    out
}
