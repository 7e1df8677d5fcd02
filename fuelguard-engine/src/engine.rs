//! Fleet engine facade
//!
//! [`FuelEngine`] is constructed once per process with its collaborators
//! injected. It owns the per-vehicle state map and routes each sample to its
//! vehicle; there is no global state.
//!
//! ```rust
//! use std::sync::Arc;
//! use fuelguard_core::{EngineConfig, ManualClock, TelemetrySample};
//! use fuelguard_engine::{FuelEngine, InMemoryBaselineStore};
//!
//! let mut engine = FuelEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(InMemoryBaselineStore::new()),
//!     Arc::new(ManualClock::new(0)),
//! )
//! .unwrap();
//!
//! let output = engine
//!     .process(&TelemetrySample::new("truck-7", 0, 80.0, 0.0).with_ignition(false))
//!     .unwrap();
//! assert!(output.degraded);
//! assert_eq!(engine.vehicle_count(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use fuelguard_core::errors::ConfigError;
use fuelguard_core::{Clock, EngineConfig, SampleResult, TelemetrySample};

use crate::baseline::{BaselineError, BaselineStore};
use crate::output::EngineOutput;
use crate::processor::{Persistence, VehicleProcessor};
use crate::replay::{self, CancelToken, ReplayOutcome};
use crate::state::VehicleState;

/// Adaptive fuel analytics for a whole fleet
#[derive(Debug)]
pub struct FuelEngine {
    processor: VehicleProcessor,
    vehicles: HashMap<String, VehicleState>,
}

impl FuelEngine {
    /// Validate `config` and build an engine around the collaborators
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn BaselineStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            processor: VehicleProcessor::new(config, store, clock)?,
            vehicles: HashMap::new(),
        })
    }

    /// Shared pipeline
    pub fn processor(&self) -> &VehicleProcessor {
        &self.processor
    }

    /// Apply one sample
    ///
    /// A vehicle seen for the first time has its baseline loaded before the
    /// sample is applied. Invalid samples never create state.
    pub fn process(&mut self, sample: &TelemetrySample) -> SampleResult<EngineOutput> {
        if let Err(err) = sample.validate() {
            log::warn!("rejected sample for '{}' at {}: {}", sample.vehicle_id, sample.timestamp, err);
            return Err(err);
        }

        let processor = &self.processor;
        let mut open_error = None;
        let state = self
            .vehicles
            .entry(sample.vehicle_id.clone())
            .or_insert_with(|| {
                let (state, err) = processor.open(&sample.vehicle_id);
                open_error = err;
                state
            });

        processor.process_with(state, sample, open_error, Persistence::Live)
    }

    /// Replay a batch, committing every touched vehicle only if it completes
    ///
    /// Each new vehicle's baseline is loaded once when it is first seen; a
    /// failed load is reported on that vehicle's first output. Nothing is
    /// written to the store and failed loads are not retried.
    pub fn replay(&mut self, samples: &[TelemetrySample], cancel: &CancelToken) -> ReplayOutcome {
        let processor = &self.processor;
        replay::run(
            &mut self.vehicles,
            samples,
            cancel,
            |vehicle_id| processor.open(vehicle_id),
            |state, sample, open_error| {
                processor.process_with(state, sample, open_error, Persistence::ReadOnly)
            },
        )
    }

    /// Drop a vehicle's state after a best-effort final snapshot
    pub fn evict(&mut self, vehicle_id: &str) -> Option<(VehicleState, Option<BaselineError>)> {
        let mut state = self.vehicles.remove(vehicle_id)?;
        let err = self.processor.flush(&mut state).err();
        log::debug!("evicted {}", vehicle_id);
        Some((state, err))
    }

    /// State of one vehicle
    pub fn state(&self, vehicle_id: &str) -> Option<&VehicleState> {
        self.vehicles.get(vehicle_id)
    }

    /// Vehicles with state
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Identifiers of vehicles with state
    pub fn vehicle_ids(&self) -> impl Iterator<Item = &str> {
        self.vehicles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::InMemoryBaselineStore;
    use fuelguard_core::{ManualClock, SampleError};

    fn engine() -> (FuelEngine, Arc<InMemoryBaselineStore>) {
        let store = Arc::new(InMemoryBaselineStore::new());
        let engine = FuelEngine::new(EngineConfig::default(), store.clone(), Arc::new(ManualClock::new(0))).unwrap();
        (engine, store)
    }

    #[test]
    fn test_engine_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FuelEngine>();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.theft.weights.time_of_day = 0.5;
        let result = FuelEngine::new(config, Arc::new(InMemoryBaselineStore::new()), Arc::new(ManualClock::new(0)));
        assert!(matches!(result, Err(ConfigError::WeightsDoNotSumToOne { .. })));
    }

    #[test]
    fn test_invalid_sample_creates_no_state() {
        let (mut engine, _) = engine();
        let result = engine.process(&TelemetrySample::new("truck-1", 0, f64::NAN, 0.0));
        assert!(matches!(result, Err(SampleError::NonFinite { .. })));
        assert_eq!(engine.vehicle_count(), 0);
    }

    #[test]
    fn test_vehicles_are_isolated() {
        let (mut engine, _) = engine();
        engine.process(&TelemetrySample::new("a", 60_000, 50.0, 0.0)).unwrap();
        engine.process(&TelemetrySample::new("b", 0, 90.0, 0.0)).unwrap();

        // Out of order for "a" only
        assert!(engine.process(&TelemetrySample::new("a", 0, 50.0, 0.0)).is_err());
        assert!(engine.process(&TelemetrySample::new("b", 30_000, 90.0, 0.0)).is_ok());
        assert_eq!(engine.vehicle_count(), 2);
    }

    #[test]
    fn test_evict_saves_final_snapshot() {
        let (mut engine, store) = engine();
        engine.process(&TelemetrySample::new("a", 60_000, 50.0, 0.0)).unwrap();

        let (state, err) = engine.evict("a").unwrap();
        assert!(err.is_none());
        assert_eq!(state.vehicle_id(), "a");
        assert_eq!(store.get("a").unwrap().taken_at, 60_000);
        assert_eq!(engine.vehicle_count(), 0);
        assert!(engine.evict("a").is_none());
    }
}
