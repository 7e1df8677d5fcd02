//! Fusion Algorithm Constants
//!
//! This module defines the noise model and health limits for the
//! two-state (level, bias) extended Kalman fuel filter.

use super::MS_PER_MINUTE;

// ===== MEASUREMENT NOISE =====

/// Default fuel-level sensor variance in %².
///
/// Source: Capacitive probes, ±0.5% repeatability
pub const DEFAULT_MEASUREMENT_NOISE_VAR: f64 = 0.25;

/// Ultrasonic level sensors (±0.3%).
pub const ULTRASONIC_NOISE_VAR: f64 = 0.09;

/// Capacitive probes (±0.5%).
pub const CAPACITIVE_NOISE_VAR: f64 = 0.25;

/// Resistive float senders (±1.0%), the OEM default on most tractors.
pub const FLOAT_NOISE_VAR: f64 = 1.0;

// ===== PROCESS NOISE =====

/// Level random-walk variance per minute, in %²/min.
pub const LEVEL_PROCESS_NOISE_PER_MIN: f64 = 0.001;

/// Bias random-walk variance per minute, in %²/min.
///
/// Smaller than the level term: calibration drifts over days, not minutes.
pub const BIAS_PROCESS_NOISE_PER_MIN: f64 = 0.0005;

/// Relative uncertainty of the consumption model.
///
/// Adds `(RATE_UNCERTAINTY * predicted_delta)²` to the level variance.
pub const RATE_UNCERTAINTY: f64 = 0.1;

// ===== PRIORS =====

/// Level variance assigned at initialisation and after a reset.
pub const INITIAL_LEVEL_VAR: f64 = 1.0;

/// Bias variance assigned at initialisation and after a reset (2% σ).
pub const INITIAL_BIAS_VAR: f64 = 4.0;

// ===== CONSUMPTION MODEL =====

/// Fuel burned at idle with the engine running, gph.
pub const MODEL_IDLE_GPH: f64 = 0.8;

/// Linear rolling-resistance term, gph per mph.
pub const MODEL_SPEED_COEFF: f64 = 0.05;

/// Aerodynamic drag term, gph per mph².
///
/// Source: Fitted to 62 mph cruise at ~7 mpg for a loaded tractor
pub const MODEL_DRAG_COEFF: f64 = 0.0012;

/// Engine-speed term, gph per (krpm)².
pub const MODEL_RPM_COEFF: f64 = 0.3;

/// Extra burn per unit of fill fraction (a full tank weighs ~1,000 lb).
pub const MODEL_LOAD_COEFF: f64 = 0.05;

/// Perturbation for the central-difference Jacobian.
pub const JACOBIAN_EPSILON: f64 = 1e-4;

/// Gaps longer than this re-anchor the level to the next measurement
/// instead of predicting across them with stale inputs.
pub const REANCHOR_GAP_MS: u64 = 30 * MS_PER_MINUTE;

// ===== GATING AND DETECTION =====

/// Innovations beyond this many σ are treated as level discontinuities.
pub const JUMP_GATE_SIGMA: f64 = 4.0;

/// Smoothing factor for the bias EMA used by the detector.
pub const BIAS_SMOOTHING_ALPHA: f64 = 0.2;

/// Sustained |bias| above this is reported as a sensor bias.
///
/// Source: Calibration tolerance of OEM float senders
pub const BIAS_THRESHOLD_PCT: f64 = 2.0;

/// Consecutive updates the smoothed bias must stay outside (or back
/// inside) the band before the flag changes.
pub const BIAS_SUSTAIN_UPDATES: u32 = 10;

/// The flag clears only once |bias| falls below this fraction of the threshold.
pub const BIAS_CLEAR_FRACTION: f64 = 0.5;

// ===== NUMERICAL HEALTH =====

/// Covariance determinants outside `[MIN, MAX]` trigger a filter reset.
pub const MIN_COVARIANCE_DET: f64 = 1e-12;
pub const MAX_COVARIANCE_DET: f64 = 1e8;
