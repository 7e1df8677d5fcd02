//! Fleet fuel engine built on `fuelguard-core`
//!
//! Adds what a deployment needs around the algorithms:
//!
//! - a per-vehicle state map behind [`FuelEngine`], or a shareable
//!   [`VehicleProcessor`] for callers that shard vehicles themselves
//! - baseline persistence through an injected [`BaselineStore`], with a
//!   time budget, a circuit breaker and degraded-mode fallback
//! - cancellable replay that commits all or nothing
//! - the [`FuelAnalytics`] strategy interface with the adaptive and legacy
//!   engines, plus [`compare`] and deploy-gate evaluation for A/B runs
//!
//! The engine performs no I/O and no locking of vehicle state; samples of
//! one vehicle must be fed by a single writer.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod baseline;
pub mod compare;
pub mod engine;
pub mod legacy;
pub mod output;
pub mod processor;
pub mod replay;
pub mod state;
pub mod strategy;

// Public API
pub use baseline::{
    BaselineError, BaselineGuard, BaselineStore, BreakerState, CircuitBreaker,
    InMemoryBaselineStore, VehicleSnapshot,
};
pub use compare::{compare, ComparisonStats, EvaluateGates, Gate, GateCheck, GateReport};
pub use engine::FuelEngine;
pub use legacy::LegacyEngine;
pub use output::EngineOutput;
pub use processor::VehicleProcessor;
pub use replay::{CancelToken, ReplayOutcome};
pub use state::{BaselineStatus, VehicleState};
pub use strategy::{build_analytics, FuelAnalytics};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
