//! Bet-timing classification primitives.
//!
//! Pure scoring rules used by the bet-timing and market-impact analyzers:
//! timing buckets relative to event start, hindsight odds position, and
//! the additive risk score.

use serde::{Deserialize, Serialize};

/// How close to the scheduled event start a bet was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingCategory {
    /// More than 24 hours before start.
    Early,
    /// More than 2 hours before start.
    Mid,
    /// Up to 2 hours before start.
    Late,
    /// At or after the scheduled start.
    Peak,
}

impl TimingCategory {
    /// Bucket by hours between placement and event start.
    ///
    /// Boundaries are exclusive on the high side: a bet exactly 24h out
    /// is `Mid`, exactly 2h out is `Late`, exactly at start is `Peak`.
    pub fn from_hours_before_start(hours: f64) -> Self {
        if hours > 24.0 {
            Self::Early
        } else if hours > 2.0 {
            Self::Mid
        } else if hours > 0.0 {
            Self::Late
        } else {
            Self::Peak
        }
    }

    /// Report weighting: earlier placement scores higher.
    pub fn weight(self) -> u32 {
        match self {
            Self::Early => 4,
            Self::Mid => 3,
            Self::Late => 2,
            Self::Peak => 1,
        }
    }
}

impl std::fmt::Display for TimingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Early => write!(f, "early"),
            Self::Mid => write!(f, "mid"),
            Self::Late => write!(f, "late"),
            Self::Peak => write!(f, "peak"),
        }
    }
}

/// Hindsight verdict on the price a bet was accepted at, relative to the
/// last market price observed before placement.
///
/// This measures timing quality with hindsight, not correctness of the
/// bet itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsPosition {
    Favorable,
    Neutral,
    Unfavorable,
}

/// Band (in decimal-odds units) inside which accepted odds count as
/// matching the market price.
pub const NEUTRAL_BAND: f64 = 0.1;

/// Compare accepted decimal odds against the last observed decimal price.
///
/// Within `NEUTRAL_BAND` of the market → neutral; above it the bettor
/// locked a better payout than the market showed (favorable), below it a
/// worse one (unfavorable).
pub fn odds_position(accepted_decimal: f64, latest_decimal: f64) -> OddsPosition {
    let diff = accepted_decimal - latest_decimal;
    if diff.abs() <= NEUTRAL_BAND {
        OddsPosition::Neutral
    } else if diff > 0.0 {
        OddsPosition::Favorable
    } else {
        OddsPosition::Unfavorable
    }
}

/// Overall risk level derived from the additive risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score >= 4 {
            Self::High
        } else if score >= 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Additive risk score for one bet.
///
/// +2 for peak timing, +2 for an unfavorable position, +1 when more than
/// five movements preceded the bet (a volatile market).
pub fn risk_score(timing: TimingCategory, position: OddsPosition, prior_movements: usize) -> u32 {
    let mut score = 0;
    if timing == TimingCategory::Peak {
        score += 2;
    }
    if position == OddsPosition::Unfavorable {
        score += 2;
    }
    if prior_movements > 5 {
        score += 1;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_boundaries_are_exclusive() {
        assert_eq!(
            TimingCategory::from_hours_before_start(24.001),
            TimingCategory::Early
        );
        assert_eq!(
            TimingCategory::from_hours_before_start(24.0),
            TimingCategory::Mid
        );
        assert_eq!(
            TimingCategory::from_hours_before_start(2.0),
            TimingCategory::Late
        );
        assert_eq!(
            TimingCategory::from_hours_before_start(0.0),
            TimingCategory::Peak
        );
        assert_eq!(
            TimingCategory::from_hours_before_start(-3.0),
            TimingCategory::Peak
        );
    }

    #[test]
    fn neutral_band_gates_position() {
        assert_eq!(odds_position(2.0, 2.0), OddsPosition::Neutral);
        assert_eq!(odds_position(2.05, 2.0), OddsPosition::Neutral);
        assert_eq!(odds_position(2.11, 2.0), OddsPosition::Favorable);
        assert_eq!(odds_position(1.89, 2.0), OddsPosition::Unfavorable);
    }

    #[test]
    fn risk_score_maxes_at_high() {
        let score = risk_score(TimingCategory::Peak, OddsPosition::Unfavorable, 6);
        assert_eq!(score, 5);
        assert_eq!(RiskLevel::from_score(score), RiskLevel::High);
    }

    #[test]
    fn risk_score_floor_is_low() {
        let score = risk_score(TimingCategory::Early, OddsPosition::Favorable, 0);
        assert_eq!(score, 0);
        assert_eq!(RiskLevel::from_score(score), RiskLevel::Low);
    }

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(2), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4), RiskLevel::High);
    }

    #[test]
    fn timing_weights() {
        assert_eq!(TimingCategory::Early.weight(), 4);
        assert_eq!(TimingCategory::Peak.weight(), 1);
    }
}
