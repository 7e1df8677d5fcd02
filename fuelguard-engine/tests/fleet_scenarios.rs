//! End-to-end duty cycles through the fleet engine

mod common;

use std::sync::Arc;

use common::{engine_with, interleave, TripBuilder, AFTERNOON_START, NIGHT_START};
use fuelguard_core::{DriveMode, ManualClock, TheftClassification};
use fuelguard_engine::{BaselineStatus, FuelEngine, InMemoryBaselineStore};

fn engine() -> (FuelEngine, Arc<InMemoryBaselineStore>) {
    let store = Arc::new(InMemoryBaselineStore::new());
    (engine_with(store.clone(), ManualClock::new(0)), store)
}

#[test]
fn test_highway_run_publishes_mpg() {
    let (mut engine, _) = engine();
    let trip = TripBuilder::new("truck-1", AFTERNOON_START, 95.0)
        .start(62.0, true)
        .cruise(120, 60_000, 62.0, 100.0 / 14.3)
        .build();

    let outputs: Vec<_> = trip.iter().map(|s| engine.process(s).unwrap()).collect();
    let estimate = outputs
        .iter()
        .find_map(|o| o.mpg.estimate().cloned())
        .expect("highway window should close");

    assert_eq!(estimate.mode, DriveMode::Highway);
    assert!((estimate.value - 6.993).abs() < 0.1, "mpg {}", estimate.value);
    assert!(outputs.iter().all(|o| o.theft.is_none()));
}

#[test]
fn test_thirsty_long_haul_never_flags_sensor_bias() {
    let (mut engine, _) = engine();
    let trip = TripBuilder::new("reefer-3", AFTERNOON_START, 95.0)
        .start(62.0, true)
        .cruise(480, 60_000, 62.0, 5.0)
        .build();

    for sample in &trip {
        let out = engine.process(sample).unwrap();
        assert!(!out.fuel.sensor_bias_detected, "bias flagged at {}", sample.timestamp);
        assert!(out.fuel.bias_estimate.abs() < 1e-9);
        assert!(!out.fuel.reset_occurred);
    }
}

#[test]
fn test_overnight_siphon_raises_one_alarm() {
    let (mut engine, _) = engine();
    let trip = TripBuilder::new("truck-9", NIGHT_START, 80.0)
        .start(0.0, false)
        .park(30, 60_000, false)
        .siphon(8, 15_000, 5.0)
        .park(4, 15_000, false)
        .build();

    let outputs: Vec<_> = trip.iter().map(|s| engine.process(s).unwrap()).collect();
    let alarms: Vec<_> = outputs.iter().filter(|o| o.is_theft_alarm()).collect();

    assert_eq!(alarms.len(), 1);
    let score = alarms[0].theft.as_ref().unwrap();
    assert_eq!(score.classification, TheftClassification::TheftSuspected);
    assert!(score.confidence.as_float() >= 0.7);

    // Alarms leave the engine as JSON
    let json = serde_json::to_value(alarms[0]).unwrap();
    assert_eq!(json["vehicle_id"], "truck-9");
    assert_eq!(json["theft"]["classification"], "THEFT_SUSPECTED");
    let back: fuelguard_engine::EngineOutput = serde_json::from_value(json).unwrap();
    assert_eq!(&back, alarms[0]);
}

#[test]
fn test_sensor_glitch_is_not_an_alarm() {
    let (mut engine, _) = engine();
    let trip = TripBuilder::new("truck-3", AFTERNOON_START, 80.0)
        .start(62.0, true)
        .cruise(30, 60_000, 62.0, 7.0)
        .level_jump(-35.0)
        .cruise(3, 60_000, 62.0, 7.0)
        .build();

    let outputs: Vec<_> = trip.iter().map(|s| engine.process(s).unwrap()).collect();

    assert!(outputs.iter().all(|o| !o.is_theft_alarm()));
    assert!(outputs
        .iter()
        .filter_map(|o| o.theft.as_ref())
        .any(|s| s.classification == TheftClassification::Implausible));
}

#[test]
fn test_mixed_fleet_is_tracked_per_vehicle() {
    let (mut engine, store) = engine();
    let fleet = interleave(vec![
        TripBuilder::new("truck-1", NIGHT_START, 90.0)
            .start(62.0, true)
            .cruise(40, 60_000, 62.0, 7.0)
            .build(),
        TripBuilder::new("truck-2", NIGHT_START, 60.0)
            .start(0.0, false)
            .park(40, 60_000, false)
            .build(),
    ]);

    for sample in &fleet {
        engine.process(sample).unwrap();
    }

    assert_eq!(engine.vehicle_count(), 2);
    let mut ids: Vec<_> = engine.vehicle_ids().collect();
    ids.sort_unstable();
    assert_eq!(ids, ["truck-1", "truck-2"]);

    // 40 minutes of data crosses the 15-minute snapshot interval
    for id in ["truck-1", "truck-2"] {
        assert_eq!(engine.state(id).unwrap().baseline_status(), BaselineStatus::Backed);
        assert!(store.get(id).is_some());
    }
    assert!(engine.state("truck-1").unwrap().last_reading().unwrap().odometer_mi.unwrap() > 80_040.0);
}
