//! Per-vehicle engine state

use fuelguard_core::constants::vehicle::HISTORY_CAPACITY;
use fuelguard_core::{
    CircularBuffer, FilterState, ModeTracker, MpgWindow, Reading, TheftTracker, Timestamp,
};

use crate::baseline::VehicleSnapshot;

/// Where a vehicle's persisted baseline stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineStatus {
    /// Load failed; retry at the given clock time
    LoadFailed {
        /// Clock time of the next attempt
        retry_at: Timestamp,
    },
    /// Store had nothing for this vehicle and nothing has been saved yet
    Absent,
    /// Restored from or persisted to the store
    Backed,
}

/// Everything the engine remembers about one vehicle
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub(crate) vehicle_id: String,
    pub(crate) history: CircularBuffer<Reading, HISTORY_CAPACITY>,
    pub(crate) mode: ModeTracker,
    pub(crate) window: MpgWindow,
    pub(crate) filter: FilterState,
    pub(crate) theft: TheftTracker,
    pub(crate) baseline: BaselineStatus,
    pub(crate) last_snapshot_at: Option<Timestamp>,
}

impl VehicleState {
    /// Fresh state on default parameters
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            history: CircularBuffer::new(),
            mode: ModeTracker::default(),
            window: MpgWindow::default(),
            filter: FilterState::default(),
            theft: TheftTracker::default(),
            baseline: BaselineStatus::Absent,
            last_snapshot_at: None,
        }
    }

    /// State restored from a snapshot
    pub fn from_snapshot(snapshot: &VehicleSnapshot) -> Self {
        let mut state = Self::new(snapshot.vehicle_id.clone());
        state.mode = ModeTracker::starting_in(snapshot.mode);
        if let Some(checkpoint) = &snapshot.filter {
            state.filter = FilterState::from_checkpoint(checkpoint);
        }
        state.theft = TheftTracker::with_baseline(snapshot.consumption);
        state.baseline = BaselineStatus::Backed;
        state
    }

    /// Snapshot of the persistable parts, taken at sample time `taken_at`
    pub fn snapshot(&self, taken_at: Timestamp) -> VehicleSnapshot {
        VehicleSnapshot {
            vehicle_id: self.vehicle_id.clone(),
            taken_at,
            mode: self.mode.current(),
            filter: self.filter.checkpoint(),
            consumption: *self.theft.baseline(),
            last_fuel_level_pct: self.last_reading().map(|r| r.fuel_level_pct),
        }
    }

    /// Vehicle identifier
    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    /// Most recent accepted reading
    pub fn last_reading(&self) -> Option<&Reading> {
        self.history.last()
    }

    /// Recent readings, oldest first
    pub fn history(&self) -> &CircularBuffer<Reading, HISTORY_CAPACITY> {
        &self.history
    }

    /// Drive-mode hysteresis state
    pub fn mode(&self) -> &ModeTracker {
        &self.mode
    }

    /// Open MPG window
    pub fn window(&self) -> &MpgWindow {
        &self.window
    }

    /// Fuel filter state
    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Theft tracking state
    pub fn theft(&self) -> &TheftTracker {
        &self.theft
    }

    /// Baseline status
    pub fn baseline_status(&self) -> BaselineStatus {
        self.baseline
    }

    /// Running without a persisted baseline
    pub fn is_degraded(&self) -> bool {
        self.baseline != BaselineStatus::Backed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelguard_core::{ConsumptionBaseline, DriveMode, FilterCheckpoint};

    #[test]
    fn test_fresh_state_is_degraded() {
        let state = VehicleState::new("truck-1");
        assert!(state.is_degraded());
        assert!(state.last_reading().is_none());
        assert!(!state.filter().is_initialized());
    }

    #[test]
    fn test_snapshot_restores_learned_parts() {
        let mut consumption = ConsumptionBaseline::default();
        for _ in 0..25 {
            consumption.observe(0.1);
        }
        let snapshot = VehicleSnapshot {
            vehicle_id: "truck-1".into(),
            taken_at: 5_000,
            mode: DriveMode::Highway,
            filter: Some(FilterCheckpoint {
                level_pct: 61.0,
                bias_pct: 2.5,
                covariance: [[0.2, -0.1], [-0.1, 0.3]],
                timestamp: 5_000,
                smoothed_bias: 2.4,
                bias_detected: true,
            }),
            consumption,
            last_fuel_level_pct: Some(63.5),
        };

        let state = VehicleState::from_snapshot(&snapshot);
        assert!(!state.is_degraded());
        assert_eq!(state.mode().current(), DriveMode::Highway);
        assert_eq!(state.filter().bias(), 2.5);
        assert!(state.filter().bias_detected());
        assert_eq!(state.theft().baseline().count(), 25);

        let again = state.snapshot(5_000);
        assert_eq!(again.filter, snapshot.filter);
        assert_eq!(again.consumption, consumption);
        assert_eq!(again.last_fuel_level_pct, None);
    }
}
