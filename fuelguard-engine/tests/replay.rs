//! Batch replay: all-or-nothing commit, a single load per vehicle and no store writes

mod common;

use std::sync::Arc;

use common::{engine_with, Behaviour, CancellingStore, ScriptedStore, TripBuilder, NIGHT_START};
use fuelguard_core::{ManualClock, SampleError, TelemetrySample};
use fuelguard_engine::{CancelToken, FuelEngine, InMemoryBaselineStore, ReplayOutcome};

fn parked(vehicle: &str, start: u64, minutes: usize) -> Vec<TelemetrySample> {
    TripBuilder::new(vehicle, start, 70.0)
        .start(0.0, false)
        .park(minutes, 60_000, false)
        .build()
}

#[test]
fn test_completed_replay_commits_without_saving() {
    let store = Arc::new(InMemoryBaselineStore::new());
    let mut engine = engine_with(store.clone(), ManualClock::new(0));

    let mut batch = parked("truck-1", NIGHT_START, 30);
    batch.extend(parked("truck-2", NIGHT_START, 30));
    batch.push(TelemetrySample::new("truck-3", NIGHT_START, -4.0, 0.0));

    let outcome = engine.replay(&batch, &CancelToken::new());

    match &outcome {
        ReplayOutcome::Completed { outputs, rejected } => {
            assert_eq!(outputs.len(), 62);
            assert_eq!(rejected.len(), 1);
            assert_eq!(rejected[0].0, 62);
            assert!(matches!(rejected[0].1, SampleError::OutOfRange { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }

    // Half an hour of data, yet the store is untouched
    assert!(store.is_empty());
    assert_eq!(engine.vehicle_count(), 2);
    assert_eq!(engine.state("truck-1").unwrap().history().len(), 31);

    // Live processing continues from the replayed state
    let next = TelemetrySample::new("truck-1", NIGHT_START + 31 * 60_000, 70.0, 0.0);
    assert!(engine.process(&next).is_ok());
    let older = TelemetrySample::new("truck-1", NIGHT_START + 60_000, 70.0, 0.0);
    assert!(matches!(engine.process(&older), Err(SampleError::OutOfOrder { .. })));
}

#[test]
fn test_cancelled_replay_leaves_engine_untouched() {
    let token = CancelToken::new();
    let store = Arc::new(CancellingStore {
        trigger_vehicle: "truck-2".into(),
        token: token.clone(),
    });
    let mut engine: FuelEngine = engine_with(store, ManualClock::new(0));

    engine
        .process(&TelemetrySample::new("truck-1", NIGHT_START - 60_000, 70.0, 0.0))
        .unwrap();
    let before = engine.state("truck-1").unwrap().clone();

    // Looking up truck-2 cancels the run mid-batch
    let mut batch = parked("truck-1", NIGHT_START, 4);
    batch.extend(parked("truck-2", NIGHT_START, 4));

    let outcome = engine.replay(&batch, &token);

    assert_eq!(outcome, ReplayOutcome::Cancelled { processed: 6 });
    assert!(outcome.outputs().is_empty());
    assert_eq!(engine.vehicle_count(), 1);
    assert!(engine.state("truck-2").is_none());

    let after = engine.state("truck-1").unwrap();
    assert_eq!(after.history().len(), before.history().len());
    assert_eq!(after.filter(), before.filter());
}

#[test]
fn test_replay_reports_failed_load_without_retrying() {
    let clock = ManualClock::new(0);
    let store = Arc::new(ScriptedStore::new(clock.clone()).always(Behaviour::Fail));
    let mut engine = engine_with(store.clone(), clock.clone());

    let outcome = engine.replay(&parked("truck-4", NIGHT_START, 4), &CancelToken::new());
    let outputs = outcome.outputs();
    assert_eq!(outputs.len(), 5);
    assert!(outputs[0].baseline_error.is_some());
    assert!(outputs.iter().all(|o| o.degraded));
    assert!(outputs[1..].iter().all(|o| o.baseline_error.is_none()));
    assert_eq!(store.loads(), 1);

    // Past the retry time a second replay still leaves the store alone
    clock.advance(120_000);
    let later = parked("truck-4", NIGHT_START + 10 * 60_000, 4);
    let outcome = engine.replay(&later, &CancelToken::new());
    assert!(outcome.outputs().iter().all(|o| o.degraded && o.baseline_error.is_none()));
    assert_eq!(store.loads(), 1);
    assert_eq!(store.saves(), 0);

    // Live processing picks the retry back up
    let next = TelemetrySample::new("truck-4", NIGHT_START + 20 * 60_000, 70.0, 0.0);
    let out = engine.process(&next).unwrap();
    assert!(out.baseline_error.is_some());
    assert_eq!(store.loads(), 2);
}
