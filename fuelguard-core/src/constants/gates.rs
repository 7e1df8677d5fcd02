//! Deployment Gate Constants
//!
//! Defaults for the checks a treatment strategy must pass against the
//! control before it is rolled out fleet-wide.

/// Maximum mean |MPG difference| between the two arms.
pub const MPG_DEPLOY_DIFF_THRESHOLD: f64 = 0.5;

/// Maximum processing-time overhead of the treatment arm, in percent.
pub const MPG_MAX_PERF_DEGRADATION_PCT: f64 = 10.0;

/// Minimum reduction of mean filter variance, in percent.
pub const EKF_VARIANCE_IMPROVEMENT_PCT: f64 = 15.0;

/// Minimum share of vehicles with a detected sensor bias, in percent.
pub const EKF_BIAS_DETECTION_RATE_PCT: f64 = 10.0;

/// Minimum per-sample agreement on theft alarms, in percent.
pub const THEFT_AGREEMENT_PCT: f64 = 90.0;

/// Minimum mean confidence of the treatment arm's theft verdicts.
pub const THEFT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Minimum reduction of false-positive theft alarms, in percent.
pub const THEFT_FALSE_POSITIVE_REDUCTION_PCT: f64 = 20.0;
