//! Movement records — the immutable system of record for price history.
//!
//! A `MovementRecord` is created exactly once by the ingestion pipeline
//! when a genuine price change is detected, and is never updated or
//! soft-deleted afterwards. All derived fields (direction, percentage)
//! are computed at construction on decimal-equivalent values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::odds::{self, Magnitude, MovementKind, OddsError, OddsFormat};

/// Identity of a bettable selection: event + market + selection.
///
/// All three components are opaque strings assigned by upstream feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub event_id: String,
    pub market_id: String,
    pub selection_id: String,
}

impl MarketKey {
    pub fn new(
        event_id: impl Into<String>,
        market_id: impl Into<String>,
        selection_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            market_id: market_id.into(),
            selection_id: selection_id.into(),
        }
    }
}

impl std::fmt::Display for MarketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.event_id, self.market_id, self.selection_id
        )
    }
}

/// One recorded odds change for a market selection.
///
/// Raw values are kept in the format the feed expressed them in
/// (fractional odds as the `num/den` ratio); `movement_percentage` is
/// always computed on the decimal equivalents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// Market identity this change belongs to.
    pub key: MarketKey,
    /// Format the raw values were expressed in.
    pub odds_format: OddsFormat,
    /// Raw odds figure before the change.
    pub previous_value: f64,
    /// Raw odds figure after the change.
    pub current_value: f64,
    /// Direction of the change.
    pub movement_kind: MovementKind,
    /// Signed percentage change on the decimal equivalents.
    pub movement_percentage: f64,
    /// When the tick was observed.
    pub observed_at: DateTime<Utc>,
    /// Identifier of the origin feed. Loose coupling: this is the
    /// descriptor's source_id string, not a foreign key.
    pub source: String,
    /// Opaque key/value bag passed through from ingestion.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl MovementRecord {
    /// Build a record from validated raw values.
    ///
    /// Rejects non-positive or malformed inputs; the caller must drop
    /// the tick rather than persist a partially valid record.
    pub fn new(
        key: MarketKey,
        odds_format: OddsFormat,
        previous_value: f64,
        current_value: f64,
        observed_at: DateTime<Utc>,
        source: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self, OddsError> {
        let prev_decimal = odds::to_decimal(odds_format, previous_value)?;
        let cur_decimal = odds::to_decimal(odds_format, current_value)?;
        let (movement_kind, movement_percentage) = odds::classify(prev_decimal, cur_decimal);

        Ok(Self {
            id: Uuid::new_v4(),
            key,
            odds_format,
            previous_value,
            current_value,
            movement_kind,
            movement_percentage,
            observed_at,
            source: source.into(),
            metadata,
        })
    }

    /// Decimal equivalent of the current raw value.
    ///
    /// Infallible after construction: the value was validated in `new`.
    pub fn current_decimal(&self) -> f64 {
        odds::to_decimal(self.odds_format, self.current_value).unwrap_or(0.0)
    }

    /// Decimal equivalent of the previous raw value.
    pub fn previous_decimal(&self) -> f64 {
        odds::to_decimal(self.odds_format, self.previous_value).unwrap_or(0.0)
    }

    /// Whether the absolute percentage meets the significance threshold.
    pub fn is_significant(&self, threshold_pct: f64) -> bool {
        self.movement_percentage.abs() >= threshold_pct
    }

    /// Size bucket of this movement.
    pub fn magnitude(&self) -> Magnitude {
        Magnitude::from_percentage(self.movement_percentage)
    }
}
