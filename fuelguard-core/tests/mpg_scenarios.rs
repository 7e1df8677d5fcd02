//! Economy estimation over generated trips

mod common;

use common::{Stages, TripBuilder, AFTERNOON_START};
use fuelguard_core::{DriveMode, EngineConfig, MpgOutcome, NoEstimateReason};

#[test]
fn test_highway_cruise_publishes_expected_economy() {
    // 62 mph at 6.993 mpg: 100 mi burns 14.3 gal
    let trip = TripBuilder::new(AFTERNOON_START, 95.0)
        .start(62.0, true)
        .cruise(120, 60_000, 62.0, 100.0 / 14.3)
        .build();

    let mut stages = Stages::new(&EngineConfig::default());
    let outputs = stages.feed_all(&trip);

    let estimate = outputs
        .iter()
        .find_map(|o| o.mpg.as_ref().and_then(MpgOutcome::estimate).cloned())
        .expect("highway window should close");

    assert_eq!(estimate.mode, DriveMode::Highway);
    assert!((estimate.value - 6.993).abs() < 0.01, "mpg {}", estimate.value);
    assert!(estimate.window_distance_mi >= 100.0);
    assert!(estimate.window_fuel_gal < 15.0);
    assert!(estimate.confidence.is_high());
    assert!(!estimate.implausible);
}

#[test]
fn test_mode_settles_to_highway_before_first_window() {
    let trip = TripBuilder::new(AFTERNOON_START, 95.0)
        .start(62.0, true)
        .cruise(10, 60_000, 62.0, 7.0)
        .build();

    let mut stages = Stages::new(&EngineConfig::default());
    let modes: Vec<_> = stages.feed_all(&trip).into_iter().map(|o| o.mode).collect();

    assert_eq!(modes[0], DriveMode::Mixed);
    assert_eq!(*modes.last().unwrap(), DriveMode::Highway);
}

#[test]
fn test_refuel_restarts_window() {
    let trip = TripBuilder::new(AFTERNOON_START, 40.0)
        .start(62.0, true)
        .cruise(40, 60_000, 62.0, 7.0)
        .park(1, 60_000, true)
        .level_jump(50.0)
        .park(1, 60_000, true)
        .build();

    let mut stages = Stages::new(&EngineConfig::default());
    let outputs = stages.feed_all(&trip);

    assert!(matches!(
        outputs.last().unwrap().mpg,
        Some(MpgOutcome::NoEstimate(NoEstimateReason::Refuel))
    ));
    assert_eq!(stages.window.steps(), 0);
}

#[test]
fn test_idle_only_window_never_publishes() {
    let trip = TripBuilder::new(AFTERNOON_START, 60.0)
        .start(0.0, true)
        .park(200, 60_000, true)
        .build();

    let mut stages = Stages::new(&EngineConfig::default());
    let published = stages
        .feed_all(&trip)
        .iter()
        .filter(|o| matches!(o.mpg, Some(MpgOutcome::Estimate(_))))
        .count();

    assert_eq!(published, 0);
}
