//! Domain layer - Core business logic and models.
//!
//! Pure odds/movement/timing logic for the analytics core.
//! No I/O and no external service dependencies here (hexagonal
//! architecture inner ring). All types are serializable and testable
//! in isolation.

pub mod movement;
pub mod odds;
pub mod timing;

// Re-export core types for convenience
pub use movement::{MarketKey, MovementRecord};
pub use odds::{Magnitude, MovementKind, OddsError, OddsFormat};
pub use timing::{OddsPosition, RiskLevel, TimingCategory};
