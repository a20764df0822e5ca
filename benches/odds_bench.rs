//! Odds Conversion Benchmarks — Hot-Path Performance Validation
//!
//! Benchmarks the domain functions that run on every ingested tick.
//!
//! Run with: cargo bench --bench odds_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use oddsflow::domain::odds::{self, OddsFormat};

/// Benchmark decimal parsing, the most common wire format.
fn bench_parse_decimal(c: &mut Criterion) {
    c.bench_function("parse_decimal", |b| {
        b.iter(|| {
            let _v = odds::parse_value(OddsFormat::Decimal, black_box("2.35"));
        });
    });
}

/// Benchmark fractional parsing, which splits and divides.
fn bench_parse_fractional(c: &mut Criterion) {
    c.bench_function("parse_fractional", |b| {
        b.iter(|| {
            let _v = odds::parse_value(OddsFormat::Fractional, black_box("5/2"));
        });
    });
}

/// Benchmark American-to-decimal conversion (branch per sign).
fn bench_american_to_decimal(c: &mut Criterion) {
    c.bench_function("american_to_decimal", |b| {
        b.iter(|| {
            let _pos = odds::to_decimal(OddsFormat::American, black_box(150.0));
            let _neg = odds::to_decimal(OddsFormat::American, black_box(-150.0));
        });
    });
}

/// Benchmark movement classification in decimal space.
fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_movement", |b| {
        b.iter(|| {
            let _m = odds::classify(black_box(2.0), black_box(2.3));
        });
    });
}

criterion_group!(
    benches,
    bench_parse_decimal,
    bench_parse_fractional,
    bench_american_to_decimal,
    bench_classify
);
criterion_main!(benches);
