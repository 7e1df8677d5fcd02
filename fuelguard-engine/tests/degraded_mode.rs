//! Baseline store failures degrade the engine but never stop it

mod common;

use std::sync::Arc;

use common::{engine_with, feed_paced, Behaviour, ScriptedStore, TripBuilder, AFTERNOON_START};
use fuelguard_core::{ConsumptionBaseline, DriveMode, FilterCheckpoint, ManualClock, TelemetrySample};
use fuelguard_engine::{BaselineError, BaselineStatus, BreakerState, VehicleSnapshot};

fn highway_trip(vehicle: &str, samples: usize) -> Vec<TelemetrySample> {
    TripBuilder::new(vehicle, AFTERNOON_START, 95.0)
        .start(62.0, true)
        .cruise(samples, 60_000, 62.0, 7.0)
        .build()
}

fn learned_baseline(observations: usize) -> ConsumptionBaseline {
    let mut baseline = ConsumptionBaseline::default();
    for i in 0..observations {
        baseline.observe(0.05 + (i % 3) as f64 * 0.01);
    }
    baseline
}

#[test]
fn test_unavailable_store_still_yields_estimates() {
    let clock = ManualClock::new(0);
    let store = Arc::new(ScriptedStore::new(clock.clone()).always(Behaviour::Fail));
    let mut engine = engine_with(store.clone(), clock.clone());

    let outputs = feed_paced(&mut engine, &clock, &highway_trip("truck-1", 120));

    assert!(matches!(
        outputs[0].baseline_error,
        Some(BaselineError::Unavailable { .. })
    ));
    assert!(outputs.iter().all(|o| o.degraded));

    let mpg = outputs
        .iter()
        .find_map(|o| o.mpg_value())
        .expect("estimates continue without a baseline");
    assert!((mpg - 7.0).abs() < 0.15, "mpg {}", mpg);
    assert_eq!(outputs.last().unwrap().mode, DriveMode::Highway);

    // One load per retry interval, and nothing written over the unread snapshot
    assert_eq!(store.loads(), outputs.len());
    assert_eq!(store.saves(), 0);
}

#[test]
fn test_slow_store_times_out() {
    let clock = ManualClock::new(0);
    let store = Arc::new(ScriptedStore::new(clock.clone()).script_loads(&[Behaviour::Delay(400)]));
    let mut engine = engine_with(store, clock);

    let out = engine
        .process(&TelemetrySample::new("truck-1", AFTERNOON_START, 80.0, 0.0))
        .unwrap();

    assert!(out.degraded);
    assert_eq!(
        out.baseline_error,
        Some(BaselineError::Timeout {
            elapsed_ms: 400,
            budget_ms: 250,
        })
    );
    assert!((out.fuel.level_estimate - 80.0).abs() < 1e-9);
}

#[test]
fn test_late_load_restores_drain_statistics() {
    let clock = ManualClock::new(0);
    let store = Arc::new(ScriptedStore::new(clock.clone()).script_loads(&[Behaviour::Fail]));
    store.inner.insert(VehicleSnapshot {
        vehicle_id: "truck-1".into(),
        taken_at: AFTERNOON_START - 3_600_000,
        mode: DriveMode::Highway,
        filter: None,
        consumption: learned_baseline(30),
        last_fuel_level_pct: Some(96.0),
    });
    let mut engine = engine_with(store.clone(), clock.clone());

    let outputs = feed_paced(&mut engine, &clock, &highway_trip("truck-1", 3));

    assert!(outputs[0].degraded);
    assert!(outputs[0].baseline_error.is_some());
    assert!(!outputs[1].degraded);
    assert!(outputs[1].baseline_error.is_none());
    assert_eq!(store.loads(), 2);

    let state = engine.state("truck-1").unwrap();
    assert_eq!(state.baseline_status(), BaselineStatus::Backed);
    assert!(state.theft().baseline().count() >= 30);
}

#[test]
fn test_snapshot_restores_filter_and_mode() {
    let clock = ManualClock::new(0);
    let store = Arc::new(ScriptedStore::new(clock.clone()));
    store.inner.insert(VehicleSnapshot {
        vehicle_id: "truck-1".into(),
        taken_at: AFTERNOON_START,
        mode: DriveMode::Highway,
        filter: Some(FilterCheckpoint {
            level_pct: 60.0,
            bias_pct: 3.0,
            covariance: [[0.04, 0.0], [0.0, 0.01]],
            timestamp: AFTERNOON_START,
            smoothed_bias: 3.0,
            bias_detected: true,
        }),
        consumption: learned_baseline(25),
        last_fuel_level_pct: Some(63.0),
    });
    let mut engine = engine_with(store, clock);

    // Parked with the ignition off: no burn, reading matches level + bias
    let out = engine
        .process(&TelemetrySample::new("truck-1", AFTERNOON_START + 60_000, 63.0, 0.0).with_ignition(false))
        .unwrap();

    assert!(!out.degraded);
    assert_eq!(out.mode, DriveMode::Highway);
    assert!((out.fuel.level_estimate - 60.0).abs() < 1e-6);
    assert!((out.fuel.bias_estimate - 3.0).abs() < 1e-6);
    assert!(out.fuel.sensor_bias_detected);
}

#[test]
fn test_open_circuit_sheds_new_vehicles() {
    let clock = ManualClock::new(0);
    let store = Arc::new(ScriptedStore::new(clock.clone()).always(Behaviour::Fail));
    let mut engine = engine_with(store.clone(), clock.clone());

    for minute in 0..3u64 {
        clock.set(minute * 60_000);
        let sample = TelemetrySample::new("truck-1", AFTERNOON_START + minute * 60_000, 80.0, 0.0);
        engine.process(&sample).unwrap();
    }
    assert_eq!(store.loads(), 3);
    assert_eq!(
        engine.processor().baseline().breaker_state(),
        BreakerState::Open { until: 150_000 }
    );

    clock.set(130_000);
    let out = engine
        .process(&TelemetrySample::new("truck-2", AFTERNOON_START, 70.0, 0.0))
        .unwrap();

    assert_eq!(out.baseline_error, Some(BaselineError::CircuitOpen { retry_at: 150_000 }));
    assert!(out.degraded);
    assert_eq!(store.loads(), 3);
    assert_eq!(
        engine.state("truck-2").unwrap().baseline_status(),
        BaselineStatus::LoadFailed { retry_at: 190_000 }
    );
}
