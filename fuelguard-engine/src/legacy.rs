//! Legacy analytics strategy
//!
//! The algorithms the adaptive engine replaces, kept behind the same
//! interface so both can run side by side:
//!
//! - one fixed MIXED-size MPG window regardless of how the truck is driven
//! - a scalar Kalman filter on the raw level, no consumption model, no bias
//! - a single-threshold theft rule: cumulative drop while stationary
//!
//! There is no baseline collaborator; legacy output is never degraded.

use std::collections::HashMap;

use fuelguard_core::constants::vehicle::STOP_SPEED_MPH;
use fuelguard_core::theft::{FactorBreakdown, FactorValue};
use fuelguard_core::{
    AdaptiveMpgEstimator, Confidence, DriveMode, EngineConfig, FilterInput, FuelLevelFilter,
    MpgOutcome, MpgWindow, NoEstimateReason, Reading, SampleError, SampleResult,
    ScalarKalmanFilter, ScalarState, StepAnalyzer, StepClass, TelemetrySample,
    TheftClassification, TheftFactor, TheftScore, Timestamp,
};
use fuelguard_core::constants::FACTOR_COUNT;
use fuelguard_core::errors::ConfigError;

use crate::output::EngineOutput;
use crate::replay::{self, CancelToken, ReplayOutcome};

/// Per-vehicle legacy state
#[derive(Debug, Clone, Default)]
pub struct LegacyVehicle {
    last: Option<Reading>,
    window: MpgWindow,
    filter: ScalarState,
    stationary_drop_pct: f64,
    drop_started_at: Option<Timestamp>,
    alarmed: bool,
}

/// Fixed-window, scalar-filter, threshold-rule engine
#[derive(Debug)]
pub struct LegacyEngine {
    config: EngineConfig,
    steps: StepAnalyzer,
    mpg: AdaptiveMpgEstimator,
    filter: ScalarKalmanFilter,
    vehicles: HashMap<String, LegacyVehicle>,
}

impl LegacyEngine {
    /// Validate `config` and build the engine
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            steps: StepAnalyzer::new(config.step.clone()),
            mpg: AdaptiveMpgEstimator::new(config.mpg.clone()),
            filter: ScalarKalmanFilter::new(config.legacy.process_noise),
            vehicles: HashMap::new(),
            config,
        })
    }

    /// Apply one sample
    pub fn process(&mut self, sample: &TelemetrySample) -> SampleResult<EngineOutput> {
        sample.validate()?;
        let vehicle = self.vehicles.entry(sample.vehicle_id.clone()).or_default();
        Self::apply(
            &self.config,
            &self.steps,
            &self.mpg,
            &self.filter,
            vehicle,
            sample,
        )
    }

    /// Replay a batch with all-or-nothing commit
    pub fn replay(&mut self, samples: &[TelemetrySample], cancel: &CancelToken) -> ReplayOutcome {
        let (config, steps, mpg, filter) = (&self.config, &self.steps, &self.mpg, &self.filter);
        replay::run(
            &mut self.vehicles,
            samples,
            cancel,
            |_| (LegacyVehicle::default(), None::<()>),
            |vehicle, sample, _| Self::apply(config, steps, mpg, filter, vehicle, sample),
        )
    }

    /// Vehicles with state
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    fn apply(
        config: &EngineConfig,
        steps: &StepAnalyzer,
        mpg: &AdaptiveMpgEstimator,
        filter: &ScalarKalmanFilter,
        vehicle: &mut LegacyVehicle,
        sample: &TelemetrySample,
    ) -> SampleResult<EngineOutput> {
        if let Some(last) = &vehicle.last {
            if sample.timestamp < last.timestamp {
                return Err(SampleError::OutOfOrder {
                    last: last.timestamp,
                    got: sample.timestamp,
                });
            }
        }

        let cur = sample.reading();
        let tank_gal = config.fleet.tank_capacity(&sample.vehicle_id);
        let fuel = FuelLevelFilter::step(
            filter,
            &mut vehicle.filter,
            &FilterInput {
                timestamp: cur.timestamp,
                level_pct: cur.fuel_level_pct,
                speed_mph: cur.speed_mph,
                rpm: cur.rpm,
                ignition_on: cur.ignition_on,
                fuel_rate_gph: cur.fuel_rate_gph,
                tank_gal,
                measurement_noise_var: config.legacy.measurement_noise_var,
            },
        );

        let (mpg_outcome, theft, step_class) = match vehicle.last {
            Some(prev) => {
                let step = steps.analyze(&prev, &cur, tank_gal);
                let outcome = mpg.observe(&mut vehicle.window, &step, DriveMode::Mixed, cur.timestamp);
                let theft = threshold_rule(config.legacy.theft_drop_pct, vehicle, &prev, &cur, step.class);
                (outcome, theft, Some(step.class))
            }
            None => {
                let target = config.mpg.window(DriveMode::Mixed);
                let waiting = MpgOutcome::NoEstimate(NoEstimateReason::InsufficientData {
                    distance_mi: 0.0,
                    fuel_gal: 0.0,
                    target_distance_mi: target.distance_mi,
                    target_fuel_gal: target.fuel_gal,
                });
                (waiting, None, None)
            }
        };
        vehicle.last = Some(cur);

        Ok(EngineOutput {
            vehicle_id: sample.vehicle_id.clone(),
            timestamp: cur.timestamp,
            mode: DriveMode::Mixed,
            mpg: mpg_outcome,
            fuel,
            theft,
            step_class,
            degraded: false,
            baseline_error: None,
        })
    }
}

/// Alarm once the cumulative drop while stationary crosses `threshold_pct`
fn threshold_rule(
    threshold_pct: f64,
    vehicle: &mut LegacyVehicle,
    prev: &Reading,
    cur: &Reading,
    class: StepClass,
) -> Option<TheftScore> {
    let stationary = prev.is_stopped(STOP_SPEED_MPH) && cur.is_stopped(STOP_SPEED_MPH);
    if !stationary || class == StepClass::Refuel {
        vehicle.stationary_drop_pct = 0.0;
        vehicle.drop_started_at = None;
        vehicle.alarmed = false;
        return None;
    }

    let drop = prev.fuel_level_pct - cur.fuel_level_pct;
    if drop <= 0.0 {
        return None;
    }
    vehicle.stationary_drop_pct += drop;
    let started = *vehicle.drop_started_at.get_or_insert(prev.timestamp);

    if vehicle.alarmed || vehicle.stationary_drop_pct < threshold_pct {
        return None;
    }
    vehicle.alarmed = true;
    log::warn!(
        "legacy rule: {:.1}% lost while stationary",
        vehicle.stationary_drop_pct
    );

    let mut breakdown = FactorBreakdown::new();
    // Capacity is one entry per factor
    let _ = breakdown.push(FactorValue {
        factor: TheftFactor::DropMagnitude,
        value: 1.0,
        weight: 1.0,
    });

    Some(TheftScore {
        composite: 1.0,
        factor_breakdown: breakdown,
        confidence: Confidence::from_coverage(1, FACTOR_COUNT),
        classification: TheftClassification::TheftSuspected,
        implausible: false,
        drop_pct: vehicle.stationary_drop_pct,
        drop_duration_ms: cur.timestamp.saturating_sub(started),
        timestamp: cur.timestamp,
    })
}
