//! Odds source adapters, one per origin kind.
//!
//! - `api`: HTTP endpoint polled via reqwest
//! - `feed`: pushed ticks buffered and drained per poll
//! - `manual`: operator batch queue for backfill

pub mod api;
pub mod feed;
pub mod manual;

pub use api::ApiOddsSource;
pub use feed::FeedOddsSource;
pub use manual::ManualOddsSource;
