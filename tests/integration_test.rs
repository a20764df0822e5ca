//! Integration Tests - End-to-end Pipeline and Analyzer Testing
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use mockall::mock;
use rust_decimal_macros::dec;

use oddsflow::adapters::persistence::MemoryMovementStore;
use oddsflow::adapters::sources::ManualOddsSource;
use oddsflow::config::{AnalysisConfig, IngestionConfig};
use oddsflow::domain::movement::{MarketKey, MovementRecord};
use oddsflow::domain::odds::{MovementKind, OddsFormat};
use oddsflow::domain::timing::{OddsPosition, RiskLevel, TimingCategory};
use oddsflow::ports::collaborators::{BetRecord, WagerVolume};
use oddsflow::ports::events::NullPublisher;
use oddsflow::ports::metrics::NoopMetrics;
use oddsflow::ports::movement_store::MovementStore;
use oddsflow::ports::odds_source::{OddsUpdate, SourceDescriptor, SourceKind};
use oddsflow::usecases::bet_timing::{BetRequest, BetTimingAnalyzer};
use oddsflow::usecases::ingestion::IngestionPipeline;
use oddsflow::usecases::market_impact::MarketImpactAnalyzer;
use oddsflow::usecases::report::ReportBuilder;

// ---- Mock Definitions ----

mock! {
    pub Metadata {}

    #[async_trait::async_trait]
    impl oddsflow::ports::collaborators::EventMetadata for Metadata {
        async fn event_start_time(
            &self,
            event_id: &str,
        ) -> anyhow::Result<Option<DateTime<Utc>>>;
    }
}

mock! {
    pub Wagers {}

    #[async_trait::async_trait]
    impl oddsflow::ports::collaborators::WagerData for Wagers {
        async fn volume_for_market(
            &self,
            event_id: &str,
            market_id: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> anyhow::Result<WagerVolume>;

        async fn bets_for_market(
            &self,
            event_id: &str,
            market_id: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> anyhow::Result<Vec<BetRecord>>;
    }
}

// ---- Helpers ----

fn pipeline_with(
    store: Arc<MemoryMovementStore>,
    epsilon: f64,
) -> Arc<IngestionPipeline> {
    let config = IngestionConfig {
        dedup_epsilon: epsilon,
        ..IngestionConfig::default()
    };
    IngestionPipeline::new(
        store,
        Arc::new(NullPublisher),
        Arc::new(NoopMetrics),
        &config,
    )
}

fn decimal_update(selection: &str, value: &str, observed_at: DateTime<Utc>) -> OddsUpdate {
    OddsUpdate {
        event_id: "evt-1".to_string(),
        market_id: "match-winner".to_string(),
        selection_id: selection.to_string(),
        format: OddsFormat::Decimal,
        value: value.to_string(),
        observed_at,
        metadata: BTreeMap::new(),
    }
}

// ---- Ingestion End-to-end ----

#[tokio::test]
async fn dedup_lifecycle_tracks_only_genuine_changes() {
    let store = Arc::new(MemoryMovementStore::new());
    let pipeline = pipeline_with(Arc::clone(&store), 0.05);
    let key = MarketKey::new("evt-1", "match-winner", "home");
    let t0 = Utc::now();

    // First observation creates the baseline record.
    let r = pipeline
        .process_updates(vec![decimal_update("home", "2.0", t0)], "book-a")
        .await;
    assert!(r.success);
    assert_eq!(r.movements_created, 1);

    // Identical retransmission is a no-op.
    let r = pipeline
        .process_updates(
            vec![decimal_update("home", "2.0", t0 + ChronoDuration::seconds(1))],
            "book-a",
        )
        .await;
    assert!(r.success);
    assert_eq!(r.movements_created, 0);

    // Genuine change records a movement.
    let r = pipeline
        .process_updates(
            vec![decimal_update("home", "2.3", t0 + ChronoDuration::seconds(2))],
            "book-a",
        )
        .await;
    assert_eq!(r.movements_created, 1);

    // Wiggle inside the tolerance is absorbed.
    let r = pipeline
        .process_updates(
            vec![decimal_update("home", "2.29", t0 + ChronoDuration::seconds(3))],
            "book-a",
        )
        .await;
    assert_eq!(r.movements_created, 0);

    let latest = store.latest_for_key(&key).await.unwrap().unwrap();
    assert_eq!(latest.current_value, 2.3);
    assert_eq!(latest.previous_value, 2.0);
    assert_eq!(latest.movement_kind, MovementKind::Increase);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn malformed_update_fails_item_not_batch() {
    let store = Arc::new(MemoryMovementStore::new());
    let pipeline = pipeline_with(Arc::clone(&store), 0.001);
    let t0 = Utc::now();

    let mut bad = decimal_update("draw", "not-a-price", t0);
    bad.format = OddsFormat::Fractional;

    let result = pipeline
        .process_updates(
            vec![
                decimal_update("home", "2.0", t0),
                bad,
                decimal_update("away", "3.4", t0),
            ],
            "book-a",
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.movements_created, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("draw"));
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn polling_stops_cleanly_after_stop_polling_returns() {
    let store = Arc::new(MemoryMovementStore::new());
    let pipeline = pipeline_with(Arc::clone(&store), 0.001);

    let source = Arc::new(ManualOddsSource::new(SourceDescriptor {
        source_id: "manual-1".to_string(),
        kind: SourceKind::Manual,
        endpoint: None,
        poll_interval_ms: 50,
        active: true,
    }));
    source
        .submit_batch(vec![decimal_update("home", "1.8", Utc::now())])
        .await;

    pipeline
        .register_source(Arc::clone(&source) as _)
        .await
        .unwrap();

    // The first poll fires one interval after registration.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.len().await, 1);

    pipeline.stop_polling("manual-1").await.unwrap();

    // Batches submitted after stop are never drained.
    source
        .submit_batch(vec![decimal_update("home", "2.8", Utc::now())])
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.len().await, 1);
    assert_eq!(source.pending().await, 1);
}

#[tokio::test]
async fn descriptor_update_toggles_polling_without_reregistration() {
    let store = Arc::new(MemoryMovementStore::new());
    let pipeline = pipeline_with(Arc::clone(&store), 0.001);

    let descriptor = SourceDescriptor {
        source_id: "manual-1".to_string(),
        kind: SourceKind::Manual,
        endpoint: None,
        poll_interval_ms: 50,
        active: true,
    };
    let source = Arc::new(ManualOddsSource::new(descriptor.clone()));
    pipeline
        .register_source(Arc::clone(&source) as _)
        .await
        .unwrap();

    // Deactivate via descriptor update, as a config reload would.
    let deactivated = SourceDescriptor {
        active: false,
        ..descriptor.clone()
    };
    assert!(pipeline.apply_descriptor(deactivated.clone()).await.unwrap());

    source
        .submit_batch(vec![decimal_update("home", "1.8", Utc::now())])
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.len().await, 0, "inactive source is not polled");
    assert_eq!(source.pending().await, 1);

    // Resubmitting the same descriptor is a no-op.
    assert!(pipeline.apply_descriptor(deactivated).await.unwrap());

    // Reactivate; the pending batch drains on the next interval.
    let reactivated = SourceDescriptor {
        active: true,
        ..descriptor
    };
    assert!(pipeline.apply_descriptor(reactivated).await.unwrap());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.len().await, 1);

    // Ids never registered are left to the caller.
    let unknown = SourceDescriptor {
        source_id: "manual-2".to_string(),
        kind: SourceKind::Manual,
        endpoint: None,
        poll_interval_ms: 50,
        active: true,
    };
    assert!(!pipeline.apply_descriptor(unknown).await.unwrap());

    pipeline.stop_all().await.unwrap();
}

// ---- Bet-Timing Analyzer ----

async fn seed_movement(
    store: &MemoryMovementStore,
    prev: f64,
    cur: f64,
    at: DateTime<Utc>,
) {
    store
        .insert(
            MovementRecord::new(
                MarketKey::new("evt-1", "match-winner", "home"),
                OddsFormat::Decimal,
                prev,
                cur,
                at,
                "book-a",
                BTreeMap::new(),
            )
            .unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn timing_analysis_scores_late_unfavorable_bet() {
    let store = Arc::new(MemoryMovementStore::new());
    let start = Utc::now() + ChronoDuration::hours(1);

    // Price drifted up before the bet; bettor took the stale low price.
    seed_movement(&store, 2.0, 2.2, start - ChronoDuration::hours(6)).await;
    seed_movement(&store, 2.2, 2.5, start - ChronoDuration::hours(3)).await;

    let mut metadata = MockMetadata::new();
    metadata
        .expect_event_start_time()
        .returning(move |_| Ok(Some(start)));

    let analyzer = BetTimingAnalyzer::new(
        Arc::clone(&store) as Arc<dyn MovementStore>,
        Arc::new(metadata),
        Arc::new(NullPublisher),
    );

    let assessment = analyzer
        .analyze(&BetRequest {
            id: "bet-1".to_string(),
            customer_id: "cust-1".to_string(),
            event_id: "evt-1".to_string(),
            market_id: "match-winner".to_string(),
            selection_id: "home".to_string(),
            amount: dec!(100),
            accepted_odds: 2.0,
            placed_at: start - ChronoDuration::hours(1),
        })
        .await
        .unwrap();

    assert_eq!(assessment.timing, TimingCategory::Late);
    assert_eq!(assessment.odds_position, OddsPosition::Unfavorable);
    // Best observed 2.5 vs accepted 2.0 on a 100 stake.
    assert_eq!(assessment.potential_savings, dec!(50.0));
    assert_eq!(assessment.risk, RiskLevel::Medium);
    assert_eq!(assessment.movements_before.len(), 2);
}

#[tokio::test]
async fn unknown_event_defaults_to_mid_timing() {
    let store = Arc::new(MemoryMovementStore::new());

    let mut metadata = MockMetadata::new();
    metadata.expect_event_start_time().returning(|_| Ok(None));

    let analyzer = BetTimingAnalyzer::new(
        Arc::clone(&store) as Arc<dyn MovementStore>,
        Arc::new(metadata),
        Arc::new(NullPublisher),
    );

    let assessment = analyzer
        .analyze(&BetRequest {
            id: "bet-2".to_string(),
            customer_id: "cust-1".to_string(),
            event_id: "evt-unknown".to_string(),
            market_id: "match-winner".to_string(),
            selection_id: "home".to_string(),
            amount: dec!(50),
            accepted_odds: 1.9,
            placed_at: Utc::now(),
        })
        .await
        .unwrap();

    assert_eq!(assessment.timing, TimingCategory::Mid);
    assert_eq!(assessment.hours_before_start, None);
    assert_eq!(assessment.odds_position, OddsPosition::Neutral);
    assert_eq!(assessment.potential_savings, dec!(0));
    assert_eq!(assessment.risk, RiskLevel::Low);
}

// ---- Market-Impact Analyzer ----

#[tokio::test]
async fn market_impact_over_mocked_wager_data() {
    let store = Arc::new(MemoryMovementStore::new());
    let now = Utc::now();
    seed_movement(&store, 2.0, 2.5, now - ChronoDuration::hours(2)).await;

    let mut wagers = MockWagers::new();
    wagers.expect_volume_for_market().returning(|_, _, _, _| {
        Ok(WagerVolume {
            total_volume: dec!(1000),
            bet_count: 2,
            early_volume: dec!(800),
            actual_revenue: dec!(500),
            ..WagerVolume::default()
        })
    });
    wagers.expect_bets_for_market().returning(move |_, _, _, _| {
        Ok(vec![
            BetRecord {
                amount: dec!(400),
                accepted_odds: 2.0,
                placed_at: now - ChronoDuration::hours(1),
            },
            BetRecord {
                amount: dec!(600),
                accepted_odds: 2.5,
                placed_at: now - ChronoDuration::hours(1),
            },
        ])
    });

    let analyzer = MarketImpactAnalyzer::new(
        Arc::clone(&store) as Arc<dyn MovementStore>,
        Arc::new(wagers),
        Arc::new(NullPublisher),
        AnalysisConfig::default(),
    );

    let assessment = analyzer
        .analyze(
            "evt-1",
            "match-winner",
            now - ChronoDuration::hours(3),
            now,
        )
        .await
        .unwrap();

    assert_eq!(assessment.total_movements, 1);
    assert_eq!(assessment.significant_movements, 1);
    assert_eq!(assessment.financial.unfavorable_bet_count, 1);
    // 1 unfavorable * avg(500) * 0.05.
    assert_eq!(assessment.financial.opportunity_cost, dec!(25.00));
    assert_eq!(assessment.financial.potential_revenue, dec!(525.00));
    // Single movement, 80% early money, all movements significant.
    assert_eq!(assessment.efficiency_score, 100.0);
}

// ---- Full Flow: Ingest, Analyze, Report ----

#[tokio::test]
async fn sample_data_flows_through_to_a_report() {
    let store = Arc::new(MemoryMovementStore::new());
    let pipeline = pipeline_with(Arc::clone(&store), 0.001);

    let updates = IngestionPipeline::generate_sample_updates(2, 3);
    let result = pipeline.process_updates(updates, "sample").await;
    assert!(result.success);
    assert!(result.movements_created > 0);

    let builder = ReportBuilder::new(
        Arc::clone(&store) as Arc<dyn MovementStore>,
        Arc::new(NullPublisher),
        AnalysisConfig::default(),
    );

    let report = builder
        .build(Utc::now() - ChronoDuration::days(4), Utc::now(), &[], &[])
        .await
        .unwrap();

    assert_eq!(report.total_movements, result.movements_created);
    assert!(!report.recommendations.is_empty());
    assert!(report.top_markets.len() <= AnalysisConfig::default().top_markets);
    // Two events, one market each.
    assert_eq!(report.top_markets.len(), 2);
}
