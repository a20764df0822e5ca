//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MovementStore`: Price-history persistence
//! - `OddsSource`: Pollable tick origins (api/feed/manual)
//! - `EventMetadata` / `WagerData`: External collaborator lookups
//! - `EventPublisher`: Domain event fan-out
//! - `PipelineMetrics`: Ingestion observability hooks

pub mod collaborators;
pub mod events;
pub mod metrics;
pub mod movement_store;
pub mod odds_source;
