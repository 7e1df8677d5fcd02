//! Baseline Collaborator
//!
//! ## Overview
//!
//! Each vehicle's learned state (filter checkpoint, drive mode, normal drain
//! statistics) outlives the process through an injected [`BaselineStore`].
//! The store is someone else's database, so every call is treated as
//! unreliable:
//!
//! - calls are timed with the injected clock; one that overruns its budget
//!   counts as a `Timeout` and its result is discarded
//! - consecutive failures open a circuit breaker; while open, calls are
//!   refused without touching the store
//! - no failure is fatal: the engine keeps processing on default
//!   parameters and tags its output `degraded`
//!
//! ## Circuit Breaker
//!
//! ```text
//!            N consecutive failures
//!   CLOSED ─────────────────────────→ OPEN
//!     ↑                                 │ cooldown elapsed
//!     │ success                         ↓
//!     └─────────────────────────── HALF_OPEN ──→ OPEN (trial failed)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fuelguard_core::config::BaselineConfig;
use fuelguard_core::{Clock, ConsumptionBaseline, DriveMode, FilterCheckpoint, Timestamp};

/// Serializable subset of a vehicle's state, exchanged with the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    /// Vehicle the snapshot belongs to
    pub vehicle_id: String,
    /// Sample time the snapshot was taken at
    pub taken_at: Timestamp,
    /// Drive mode in force
    pub mode: DriveMode,
    /// Fuel filter state, once the filter has seen a measurement
    pub filter: Option<FilterCheckpoint>,
    /// Normal drain-rate statistics used by the theft scorer
    pub consumption: ConsumptionBaseline,
    /// Last reported fuel level
    pub last_fuel_level_pct: Option<f64>,
}

/// Baseline collaborator failures; never fatal to processing
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BaselineError {
    /// Call overran its budget
    #[error("baseline call took {elapsed_ms} ms (budget {budget_ms} ms)")]
    Timeout {
        /// Measured duration
        elapsed_ms: u64,
        /// Allowed duration
        budget_ms: u64,
    },

    /// Store reported a failure
    #[error("baseline store unavailable: {reason}")]
    Unavailable {
        /// Store-provided description
        reason: String,
    },

    /// Breaker is open; the store was not called
    #[error("baseline circuit open until {retry_at}")]
    CircuitOpen {
        /// Clock time of the next trial call
        retry_at: Timestamp,
    },

    /// Store returned something unusable
    #[error("corrupt baseline snapshot: {reason}")]
    Corrupt {
        /// What was wrong with it
        reason: String,
    },
}

/// Persistence collaborator for vehicle snapshots
///
/// Implementations should honour `timeout`; the engine enforces it anyway by
/// measuring each call.
pub trait BaselineStore: Send + Sync {
    /// Fetch a vehicle's snapshot; `Ok(None)` when none exists
    fn load(&self, vehicle_id: &str, timeout: Duration) -> Result<Option<VehicleSnapshot>, BaselineError>;

    /// Persist a snapshot, replacing any previous one
    fn save(&self, snapshot: &VehicleSnapshot, timeout: Duration) -> Result<(), BaselineError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryBaselineStore {
    snapshots: RwLock<HashMap<String, VehicleSnapshot>>,
}

impl InMemoryBaselineStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot directly
    pub fn insert(&self, snapshot: VehicleSnapshot) {
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.vehicle_id.clone(), snapshot);
    }

    /// Stored snapshot for a vehicle
    pub fn get(&self, vehicle_id: &str) -> Option<VehicleSnapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(vehicle_id)
            .cloned()
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BaselineStore for InMemoryBaselineStore {
    fn load(&self, vehicle_id: &str, _timeout: Duration) -> Result<Option<VehicleSnapshot>, BaselineError> {
        Ok(self.get(vehicle_id))
    }

    fn save(&self, snapshot: &VehicleSnapshot, _timeout: Duration) -> Result<(), BaselineError> {
        self.insert(snapshot.clone());
        Ok(())
    }
}

/// Breaker position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through
    Closed,
    /// Calls refused until the given clock time
    Open {
        /// End of the cooldown
        until: Timestamp,
    },
    /// One trial call allowed
    HalfOpen,
}

/// Consecutive-failure circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    failure_threshold: u32,
    cooldown_ms: u64,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(failure_threshold: u32, cooldown_ms: u64) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            cooldown_ms,
        }
    }

    /// Current position
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Ask to make a call at `now`
    pub fn allow(&mut self, now: Timestamp) -> Result<(), BaselineError> {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open { until } if now >= until => {
                self.state = BreakerState::HalfOpen;
                log::debug!("baseline circuit half-open, allowing trial call");
                Ok(())
            }
            BreakerState::Open { until } => Err(BaselineError::CircuitOpen { retry_at: until }),
        }
    }

    /// Record a successful call
    pub fn record_success(&mut self) {
        if self.state != BreakerState::Closed {
            log::info!("baseline circuit closed");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
    }

    /// Record a failed call at `now`
    pub fn record_failure(&mut self, now: Timestamp) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let trip = self.state == BreakerState::HalfOpen
            || self.consecutive_failures >= self.failure_threshold;
        if trip {
            let until = now.saturating_add(self.cooldown_ms);
            if !matches!(self.state, BreakerState::Open { .. }) {
                log::warn!(
                    "baseline circuit open after {} consecutive failures; retry at {}",
                    self.consecutive_failures,
                    until
                );
            }
            self.state = BreakerState::Open { until };
        }
    }
}

/// Store wrapper enforcing the time budget and the circuit breaker
pub struct BaselineGuard {
    store: Arc<dyn BaselineStore>,
    clock: Arc<dyn Clock>,
    config: BaselineConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl BaselineGuard {
    /// Wrap a store
    pub fn new(store: Arc<dyn BaselineStore>, clock: Arc<dyn Clock>, config: BaselineConfig) -> Self {
        let breaker = CircuitBreaker::new(config.failure_threshold, config.cooldown_ms);
        Self {
            store,
            clock,
            config,
            breaker: Mutex::new(breaker),
        }
    }

    /// Current clock time
    pub fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    /// Handling parameters
    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Breaker position
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner).state()
    }

    /// Load a vehicle's snapshot
    pub fn load(&self, vehicle_id: &str) -> Result<Option<VehicleSnapshot>, BaselineError> {
        let snapshot = self.guarded("load", vehicle_id, |budget| self.store.load(vehicle_id, budget))?;
        match snapshot {
            Some(snapshot) if snapshot.vehicle_id != vehicle_id => {
                let err = BaselineError::Corrupt {
                    reason: format!("snapshot belongs to '{}'", snapshot.vehicle_id),
                };
                log::warn!("baseline load for {} rejected: {}", vehicle_id, err);
                Err(err)
            }
            other => Ok(other),
        }
    }

    /// Save a vehicle's snapshot
    pub fn save(&self, snapshot: &VehicleSnapshot) -> Result<(), BaselineError> {
        self.guarded("save", &snapshot.vehicle_id, |budget| self.store.save(snapshot, budget))
    }

    fn guarded<T>(
        &self,
        op: &str,
        vehicle_id: &str,
        call: impl FnOnce(Duration) -> Result<T, BaselineError>,
    ) -> Result<T, BaselineError> {
        let start = self.clock.now_ms();
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allow(start)?;

        let budget_ms = self.config.timeout_ms;
        let result = call(Duration::from_millis(budget_ms));
        let end = self.clock.now_ms();
        let elapsed_ms = end.saturating_sub(start);

        let result = match result {
            Ok(_) if elapsed_ms > budget_ms => Err(BaselineError::Timeout {
                elapsed_ms,
                budget_ms,
            }),
            other => other,
        };

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(_) => breaker.record_success(),
            Err(err) => {
                log::warn!("baseline {} for {} failed: {}", op, vehicle_id, err);
                breaker.record_failure(end);
            }
        }
        result
    }
}

impl std::fmt::Debug for BaselineGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineGuard")
            .field("config", &self.config)
            .field("breaker", &self.breaker_state())
            .finish()
    }
}
