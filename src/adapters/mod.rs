//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, file I/O, channels, Prometheus).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `sources`: Pollable odds origins (HTTP API, pushed feed, manual)
//! - `persistence`: In-memory and JSONL movement stores
//! - `events`: Broadcast-channel domain event publisher
//! - `metrics`: Prometheus export plus health probes

pub mod events;
pub mod metrics;
pub mod persistence;
pub mod sources;
