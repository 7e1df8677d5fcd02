//! Constants for FuelGuard Core
//!
//! This module provides centralized, documented constants used throughout
//! the FuelGuard algorithms. Every tunable in [`crate::config`] takes its
//! default from here, so the numbers live in exactly one place.
//!
//! ## Organization
//!
//! Constants are grouped by domain:
//! - **Vehicle**: Physical limits of heavy-duty trucks, tank geometry and
//!   driving-mode thresholds
//! - **Fusion**: Extended Kalman filter noise levels and health limits
//! - **Theft**: Factor weights and normalisation ranges for drop scoring
//! - **Gates**: Deployment thresholds for A/B comparison runs
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Use descriptive names that include units (`_PCT`, `_MPH`, `_GAL`, `_MS`)
//! 3. When a value comes from field data rather than physics, say so

/// Physical limits, tank geometry and driving-mode thresholds.
pub mod vehicle;

/// Extended Kalman filter parameters and numerical health limits.
pub mod fusion;

/// Theft scoring weights, normalisation ranges and episode timing.
pub mod theft;

/// Deployment gate thresholds for comparing analytics strategies.
pub mod gates;

// Re-export commonly used constants for convenience
pub use vehicle::{
    DEFAULT_TANK_CAPACITY_GAL, HISTORY_CAPACITY, MAX_RPM, MAX_SPEED_MPH,
    MPG_PLAUSIBLE_MAX, MPG_PLAUSIBLE_MIN,
};

pub use fusion::{DEFAULT_MEASUREMENT_NOISE_VAR, JUMP_GATE_SIGMA};

pub use theft::{FACTOR_COUNT, SUSPICION_THRESHOLD};

/// Milliseconds in one second.
pub const MS_PER_SECOND: u64 = 1_000;

/// Milliseconds in one minute.
pub const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;

/// Milliseconds in one hour.
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
