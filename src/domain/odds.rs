//! Odds conversion and movement classification.
//!
//! All comparison logic runs on the decimal-equivalent of an odds value,
//! never on the raw figure: American and fractional odds are not linearly
//! comparable, so a raw delta between them is meaningless.
//!
//! Conversion formulas:
//! - decimal: identity
//! - american: positive `a` → `a/100 + 1`; negative `a` → `100/|a| + 1`
//! - fractional: `num/den + 1` (raw figure carried as the `num/den` ratio)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notation an odds value was expressed in by its origin feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsFormat {
    /// European decimal odds (payout multiplier, e.g. 2.50).
    Decimal,
    /// American moneyline odds (e.g. +150 / -150).
    American,
    /// UK fractional odds, received as a `"num/den"` string (e.g. "5/2").
    Fractional,
}

impl std::fmt::Display for OddsFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decimal => write!(f, "decimal"),
            Self::American => write!(f, "american"),
            Self::Fractional => write!(f, "fractional"),
        }
    }
}

/// Validation failures for raw odds values.
///
/// Raised at the ingestion boundary; a tick that fails validation is
/// rejected before any `MovementRecord` is constructed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OddsError {
    /// Odds must be strictly positive (nonzero for American moneylines).
    #[error("odds value {value} is not valid for {format} format")]
    InvalidValue { format: OddsFormat, value: f64 },
    /// Fractional odds that do not parse as `num/den` with positive parts.
    #[error("malformed fractional odds: {0:?}")]
    MalformedFraction(String),
    /// Raw value that does not parse as a number at all.
    #[error("unparseable odds value: {0:?}")]
    MalformedNumber(String),
}

/// Direction of a recorded price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Increase,
    Decrease,
    Unchanged,
}

/// Size bucket for the absolute movement percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    /// |pct| < 2%
    Small,
    /// |pct| < 5%
    Medium,
    /// |pct| < 10%
    Large,
    /// |pct| >= 10%
    Extreme,
}

impl Magnitude {
    /// Bucket a movement percentage by its absolute value.
    pub fn from_percentage(pct: f64) -> Self {
        let abs = pct.abs();
        if abs < 2.0 {
            Self::Small
        } else if abs < 5.0 {
            Self::Medium
        } else if abs < 10.0 {
            Self::Large
        } else {
            Self::Extreme
        }
    }
}

/// Parse a raw odds string into its numeric figure for the given format.
///
/// Decimal and American odds are plain numbers; fractional odds are a
/// `"num/den"` string whose numeric figure is the `num/den` ratio.
/// The returned figure is what `MovementRecord` stores as the raw value
/// and what the ingestion dedup compares with its epsilon tolerance.
pub fn parse_value(format: OddsFormat, raw: &str) -> Result<f64, OddsError> {
    match format {
        OddsFormat::Decimal | OddsFormat::American => {
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|_| OddsError::MalformedNumber(raw.to_string()))?;
            validate(format, value)?;
            Ok(value)
        }
        OddsFormat::Fractional => {
            let (num, den) = raw
                .trim()
                .split_once('/')
                .ok_or_else(|| OddsError::MalformedFraction(raw.to_string()))?;
            let num: f64 = num
                .trim()
                .parse()
                .map_err(|_| OddsError::MalformedFraction(raw.to_string()))?;
            let den: f64 = den
                .trim()
                .parse()
                .map_err(|_| OddsError::MalformedFraction(raw.to_string()))?;
            if num <= 0.0 || den <= 0.0 {
                return Err(OddsError::MalformedFraction(raw.to_string()));
            }
            Ok(num / den)
        }
    }
}

/// Validate a numeric odds figure for its format.
///
/// Decimal and fractional figures must be strictly positive; American
/// moneylines must be nonzero (negative moneylines are valid prices).
pub fn validate(format: OddsFormat, value: f64) -> Result<(), OddsError> {
    let valid = match format {
        OddsFormat::Decimal | OddsFormat::Fractional => value > 0.0 && value.is_finite(),
        OddsFormat::American => value != 0.0 && value.is_finite(),
    };
    if valid {
        Ok(())
    } else {
        Err(OddsError::InvalidValue { format, value })
    }
}

/// Convert a numeric odds figure to its decimal-equivalent baseline.
pub fn to_decimal(format: OddsFormat, value: f64) -> Result<f64, OddsError> {
    validate(format, value)?;
    let decimal = match format {
        OddsFormat::Decimal => value,
        OddsFormat::American => {
            if value > 0.0 {
                value / 100.0 + 1.0
            } else {
                100.0 / value.abs() + 1.0
            }
        }
        OddsFormat::Fractional => value + 1.0,
    };
    Ok(decimal)
}

/// Classify a price change between two decimal-equivalent odds.
///
/// Returns the direction and the signed percentage change. A zero
/// previous value yields 0% (cannot occur for validated inputs, but the
/// guard keeps the math total).
pub fn classify(prev_decimal: f64, cur_decimal: f64) -> (MovementKind, f64) {
    let kind = if cur_decimal > prev_decimal {
        MovementKind::Increase
    } else if cur_decimal < prev_decimal {
        MovementKind::Decrease
    } else {
        MovementKind::Unchanged
    };
    let pct = if prev_decimal == 0.0 {
        0.0
    } else {
        (cur_decimal - prev_decimal) / prev_decimal * 100.0
    };
    (kind, pct)
}
