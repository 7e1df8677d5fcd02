//! Theft Scoring Constants
//!
//! Weights, normalisation ranges and episode timing for the multi-factor
//! drop scorer. Each factor maps onto `[0, 1]` through a linear ramp
//! between a floor (score 0) and a ceiling (score 1).

use super::MS_PER_MINUTE;

/// Number of scoring factors.
pub const FACTOR_COUNT: usize = 7;

// ===== WEIGHTS =====
//
// Weights sum to 1.0. Ignition and GPS carry the most weight because a
// drop while the truck is parked with the engine off has no innocent
// explanation, whereas a fast drop alone can be a sloshing float.

pub const WEIGHT_DROP_MAGNITUDE: f64 = 0.20;
pub const WEIGHT_DROP_RATE: f64 = 0.10;
pub const WEIGHT_IGNITION: f64 = 0.20;
pub const WEIGHT_GPS: f64 = 0.20;
pub const WEIGHT_TIME_OF_DAY: f64 = 0.05;
pub const WEIGHT_BASELINE: f64 = 0.10;
pub const WEIGHT_KALMAN: f64 = 0.15;

// ===== NORMALISATION =====

/// Net drops at or below this score 0.
pub const MIN_DROP_PCT: f64 = 2.0;

/// Net drops at or above this score 1 (30 gal of a 150 gal tank).
pub const FULL_SCALE_DROP_PCT: f64 = 20.0;

/// Drain rates at or above this score 1. Siphoning runs 3-10 gal/min.
pub const FULL_SCALE_RATE_PCT_PER_MIN: f64 = 5.0;

/// Displacement across the episode at which the GPS factor reaches 0.
pub const STATIONARY_DISPLACEMENT_M: f64 = 200.0;

/// Kalman residual ramp, in σ.
pub const RESIDUAL_FLOOR_SIGMA: f64 = 3.0;
pub const RESIDUAL_CEILING_SIGMA: f64 = 10.0;

/// Kalman factor multiplier while the filter reports a sensor bias.
pub const BIAS_RESIDUAL_DISCOUNT: f64 = 0.5;

/// Baseline z-score ramp.
pub const BASELINE_Z_FLOOR: f64 = 2.0;
pub const BASELINE_Z_CEILING: f64 = 6.0;

/// Observations required before the baseline factor is computable.
pub const MIN_BASELINE_OBSERVATIONS: u64 = 20;

/// Standard deviation floor for the consumption-rate baseline, in %/min.
pub const BASELINE_STD_FLOOR: f64 = 0.05;

// ===== FACTOR LEVELS =====

/// Ignition factor when the ignition is off.
pub const IGNITION_OFF_SCORE: f64 = 1.0;

/// Ignition factor when the engine runs but the truck is not moving.
pub const IGNITION_IDLE_SCORE: f64 = 0.5;

/// Time-of-day risk between 22:00 and 05:00 local.
pub const NIGHT_RISK: f64 = 1.0;

/// Time-of-day risk 05:00-07:00 and 19:00-22:00 local.
pub const TWILIGHT_RISK: f64 = 0.5;

/// Time-of-day risk during the working day.
pub const DAY_RISK: f64 = 0.2;

// ===== VERDICT =====

/// Composite score above which a settled episode is theft-suspected.
pub const SUSPICION_THRESHOLD: f64 = 0.7;

/// Minimum factor coverage for a theft verdict.
pub const MIN_FACTOR_CONFIDENCE: f64 = 3.0 / 7.0;

/// When both the ignition and GPS factors are at or below this, the truck
/// was running and moving through the drop and the drop is implausible.
pub const IMPLAUSIBLE_MOTION_CEILING: f64 = 0.1;

// ===== EPISODE TIMING =====

/// Level movement below this counts as settled.
pub const SETTLE_NOISE_PCT: f64 = 0.5;

/// Consecutive settled samples that end an episode.
pub const SETTLE_SAMPLES: u32 = 2;

/// Episodes are resolved at the latest after this long.
pub const OBSERVATION_WINDOW_MS: u64 = 15 * MS_PER_MINUTE;

/// Regaining this share of the gross drop marks the drop as a glitch.
pub const RECOVERY_FRACTION: f64 = 0.5;
