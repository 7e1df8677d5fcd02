//! Per-sample processing throughput

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use fuelguard_core::{EngineConfig, ManualClock, TelemetrySample};
use fuelguard_engine::{CancelToken, FuelEngine, InMemoryBaselineStore, LegacyEngine};

const SAMPLES: usize = 1_000;

fn highway_trip(vehicle: &str) -> Vec<TelemetrySample> {
    let mut level = 95.0;
    (0..SAMPLES)
        .map(|i| {
            let miles = i as f64 * 62.0 / 240.0;
            level -= 0.025;
            TelemetrySample::new(vehicle, i as u64 * 15_000, level, 62.0)
                .with_rpm(1_450.0)
                .with_odometer(50_000.0 + miles)
                .with_gps(41.0 + miles / 69.0, -88.0)
                .with_ignition(true)
        })
        .collect()
}

fn engine() -> FuelEngine {
    FuelEngine::new(
        EngineConfig::default(),
        Arc::new(InMemoryBaselineStore::new()),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap()
}

fn bench_process(c: &mut Criterion) {
    let trip = highway_trip("truck-1");
    let mut group = c.benchmark_group("process");
    group.throughput(Throughput::Elements(SAMPLES as u64));

    group.bench_function("adaptive", |b| {
        b.iter_batched(
            engine,
            |mut engine| {
                for sample in &trip {
                    black_box(engine.process(sample).unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("legacy", |b| {
        b.iter_batched(
            || LegacyEngine::new(EngineConfig::default()).unwrap(),
            |mut engine| {
                for sample in &trip {
                    black_box(engine.process(sample).unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let trip = highway_trip("truck-1");
    c.bench_function("replay/adaptive", |b| {
        b.iter_batched(
            engine,
            |mut engine| black_box(engine.replay(&trip, &CancelToken::new())),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_process, bench_replay);
criterion_main!(benches);
