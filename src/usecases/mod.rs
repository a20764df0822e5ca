//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the analytics core's workflows. Each use case is a self-contained
//! operation.
//!
//! Use cases:
//! - `IngestionPipeline`: Source registry, polling, dedup, persistence
//! - `BetTimingAnalyzer`: Per-wager timing quality assessment
//! - `MarketImpactAnalyzer`: Windowed market efficiency assessment
//! - `ReportBuilder`: Periodic rollups and recommendations

pub mod bet_timing;
pub mod ingestion;
pub mod market_impact;
pub mod report;
