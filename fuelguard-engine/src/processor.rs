//! Per-Vehicle Processing Pipeline
//!
//! ## Overview
//!
//! [`VehicleProcessor`] holds the configured algorithms and the baseline
//! guard; it owns no vehicle state. Callers that shard vehicles across
//! threads share one processor and keep a [`VehicleState`] per vehicle.
//!
//! ## Pipeline
//!
//! ```text
//! sample ─→ validate ─→ order check ─→ history
//!                                        │
//!            ┌───────────────────────────┤
//!            ↓                           ↓
//!      mode classifier             fuel filter (EKF)
//!            │                           │
//!            ↓                           ↓
//!   step analysis ─→ MPG window     theft scorer
//!            │                           │
//!            └───────→ EngineOutput ←────┘
//!                          │
//!                  periodic snapshot
//! ```
//!
//! A rejected sample leaves the state exactly as it was.

use std::sync::Arc;

use fuelguard_core::{
    AdaptiveMpgEstimator, Clock, EngineConfig, ExtendedKalmanFuelFilter, FilterInput,
    ModeClassifier, MpgOutcome, MultiFactorTheftScorer, NoEstimateReason, SampleError,
    SampleResult, StepAnalyzer, TelemetrySample,
};
use fuelguard_core::errors::ConfigError;

use crate::baseline::{BaselineError, BaselineGuard, BaselineStore};
use crate::output::EngineOutput;
use crate::state::{BaselineStatus, VehicleState};

/// Whether a processing pass may use the baseline store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Persistence {
    /// Save snapshots and retry failed loads on schedule
    Live,
    /// No store traffic beyond the initial load
    ReadOnly,
}

/// Stateless per-vehicle pipeline, shareable across threads
#[derive(Debug)]
pub struct VehicleProcessor {
    config: EngineConfig,
    steps: StepAnalyzer,
    classifier: ModeClassifier,
    mpg: AdaptiveMpgEstimator,
    filter: ExtendedKalmanFuelFilter,
    theft: MultiFactorTheftScorer,
    baseline: BaselineGuard,
}

impl VehicleProcessor {
    /// Validate the configuration and build the algorithms
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn BaselineStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            steps: StepAnalyzer::new(config.step.clone()),
            classifier: ModeClassifier::new(config.classifier.clone()),
            mpg: AdaptiveMpgEstimator::new(config.mpg.clone()),
            filter: ExtendedKalmanFuelFilter::new(config.ekf.clone()),
            theft: MultiFactorTheftScorer::new(config.theft.clone(), config.fleet.utc_offset_minutes),
            baseline: BaselineGuard::new(store, clock, config.baseline.clone()),
            config,
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Baseline guard, for inspecting the circuit breaker
    pub fn baseline(&self) -> &BaselineGuard {
        &self.baseline
    }

    /// Create a vehicle's state, restoring its baseline when the store has one
    ///
    /// Never fails: a store error yields a degraded state and the error.
    pub fn open(&self, vehicle_id: &str) -> (VehicleState, Option<BaselineError>) {
        match self.baseline.load(vehicle_id) {
            Ok(Some(snapshot)) => {
                log::debug!("restored baseline for {} from {}", vehicle_id, snapshot.taken_at);
                (VehicleState::from_snapshot(&snapshot), None)
            }
            Ok(None) => (VehicleState::new(vehicle_id), None),
            Err(err) => {
                let mut state = VehicleState::new(vehicle_id);
                state.baseline = BaselineStatus::LoadFailed {
                    retry_at: self.retry_at(&err),
                };
                (state, Some(err))
            }
        }
    }

    /// Apply one sample to a vehicle's state
    pub fn process(&self, state: &mut VehicleState, sample: &TelemetrySample) -> SampleResult<EngineOutput> {
        self.process_with(state, sample, None, Persistence::Live)
    }

    /// Check a sample against the state without applying it
    pub fn admit(&self, state: &VehicleState, sample: &TelemetrySample) -> SampleResult<()> {
        sample.validate()?;
        if sample.vehicle_id != state.vehicle_id {
            return Err(SampleError::VehicleMismatch {
                expected: state.vehicle_id.clone(),
                got: sample.vehicle_id.clone(),
            });
        }
        if let Some(last) = state.last_reading() {
            if sample.timestamp < last.timestamp {
                return Err(SampleError::OutOfOrder {
                    last: last.timestamp,
                    got: sample.timestamp,
                });
            }
        }
        Ok(())
    }

    /// Best-effort final snapshot
    pub fn flush(&self, state: &mut VehicleState) -> Result<(), BaselineError> {
        let Some(last) = state.last_reading().map(|r| r.timestamp) else {
            return Ok(());
        };
        if matches!(state.baseline, BaselineStatus::LoadFailed { .. }) {
            return Ok(());
        }
        self.save(state, last)
    }

    pub(crate) fn process_with(
        &self,
        state: &mut VehicleState,
        sample: &TelemetrySample,
        open_error: Option<BaselineError>,
        persistence: Persistence,
    ) -> SampleResult<EngineOutput> {
        if let Err(err) = self.admit(state, sample) {
            log::warn!("rejected sample for '{}' at {}: {}", sample.vehicle_id, sample.timestamp, err);
            return Err(err);
        }

        let mut baseline_error = open_error;
        if persistence == Persistence::Live {
            if let Some(err) = self.retry_load(state) {
                baseline_error = Some(err);
            }
        }

        let cur = sample.reading();
        let prev = state.history.last().copied();
        state.history.push(cur);

        let decision = self.classifier.evaluate(&state.history, &mut state.mode);
        if decision.changed {
            log::info!("{} drive mode now {:?}", state.vehicle_id, decision.mode);
        }

        let tank_gal = self.config.fleet.tank_capacity(&state.vehicle_id);
        let fuel = self.filter.step(
            &mut state.filter,
            &FilterInput {
                timestamp: cur.timestamp,
                level_pct: cur.fuel_level_pct,
                speed_mph: cur.speed_mph,
                rpm: cur.rpm,
                ignition_on: cur.ignition_on,
                fuel_rate_gph: cur.fuel_rate_gph,
                tank_gal,
                measurement_noise_var: self.config.ekf.measurement_noise(&state.vehicle_id),
            },
        );

        let (mpg, theft, step_class) = match prev {
            Some(prev) => {
                let step = self.steps.analyze(&prev, &cur, tank_gal);
                let mpg = self.mpg.observe(&mut state.window, &step, decision.mode, cur.timestamp);
                let theft = self.theft.observe(&mut state.theft, &prev, &cur, &step, &fuel);
                (mpg, theft, Some(step.class))
            }
            None => {
                let target = self.config.mpg.window(decision.mode);
                let waiting = MpgOutcome::NoEstimate(NoEstimateReason::InsufficientData {
                    distance_mi: 0.0,
                    fuel_gal: 0.0,
                    target_distance_mi: target.distance_mi,
                    target_fuel_gal: target.fuel_gal,
                });
                (waiting, None, None)
            }
        };

        if persistence == Persistence::Live {
            if let Some(err) = self.maybe_snapshot(state, cur.timestamp) {
                baseline_error = Some(err);
            }
        }

        Ok(EngineOutput {
            vehicle_id: state.vehicle_id.clone(),
            timestamp: cur.timestamp,
            mode: decision.mode,
            mpg,
            fuel,
            theft,
            step_class,
            degraded: state.is_degraded(),
            baseline_error,
        })
    }

    /// Retry a failed load once its retry time has come
    ///
    /// A late snapshot only contributes its drain-rate statistics; the live
    /// filter and mode have moved on since it was taken.
    fn retry_load(&self, state: &mut VehicleState) -> Option<BaselineError> {
        let BaselineStatus::LoadFailed { retry_at } = state.baseline else {
            return None;
        };
        if self.baseline.now() < retry_at {
            return None;
        }

        match self.baseline.load(&state.vehicle_id) {
            Ok(Some(snapshot)) => {
                log::info!("late baseline for {} restored", state.vehicle_id);
                state.theft.adopt_baseline(snapshot.consumption);
                state.baseline = BaselineStatus::Backed;
                None
            }
            Ok(None) => {
                state.baseline = BaselineStatus::Absent;
                None
            }
            Err(err) => {
                state.baseline = BaselineStatus::LoadFailed {
                    retry_at: self.retry_at(&err),
                };
                Some(err)
            }
        }
    }

    fn maybe_snapshot(&self, state: &mut VehicleState, now: u64) -> Option<BaselineError> {
        // Never overwrite a snapshot we could not read
        if matches!(state.baseline, BaselineStatus::LoadFailed { .. }) {
            return None;
        }
        let Some(last) = state.last_snapshot_at else {
            state.last_snapshot_at = Some(now);
            return None;
        };
        if now.saturating_sub(last) < self.config.baseline.snapshot_interval_ms {
            return None;
        }
        self.save(state, now).err()
    }

    fn save(&self, state: &mut VehicleState, taken_at: u64) -> Result<(), BaselineError> {
        state.last_snapshot_at = Some(taken_at);
        self.baseline.save(&state.snapshot(taken_at))?;
        log::debug!("saved baseline snapshot for {} at {}", state.vehicle_id, taken_at);
        state.baseline = BaselineStatus::Backed;
        Ok(())
    }

    fn retry_at(&self, err: &BaselineError) -> u64 {
        let after_interval = self
            .baseline
            .now()
            .saturating_add(self.config.baseline.retry_interval_ms);
        match err {
            BaselineError::CircuitOpen { retry_at } => after_interval.max(*retry_at),
            _ => after_interval,
        }
    }
}
