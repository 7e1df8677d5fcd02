//! Scalar Kalman filter on the raw fuel level
//!
//! The pre-EKF filter: one state, a random-walk model with no consumption
//! term, and no notion of sensor bias. It lags behind every real drain and
//! has to be told about none of the physics, which is exactly why it serves
//! as the control arm when evaluating the extended filter.

use super::{FilterInput, FuelFilterOutput, FuelLevelFilter};
use crate::constants::vehicle::{FUEL_LEVEL_MAX_PCT, FUEL_LEVEL_MIN_PCT};
use crate::constants::MS_PER_MINUTE;
use crate::time::Timestamp;

/// Per-vehicle scalar filter state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScalarState {
    level: Option<f64>,
    variance: f64,
    last_timestamp: Timestamp,
}

impl ScalarState {
    /// Current estimate, if initialised
    pub fn level(&self) -> Option<f64> {
        self.level
    }
}

/// One-state random-walk Kalman filter
#[derive(Debug, Clone, Copy)]
pub struct ScalarKalmanFilter {
    /// Random-walk variance per minute
    process_noise: f64,
}

impl ScalarKalmanFilter {
    /// Create a filter with the given random walk in %²/min
    pub fn new(process_noise: f64) -> Self {
        Self { process_noise }
    }

    /// Process one measurement
    pub fn step(&self, st: &mut ScalarState, input: &FilterInput) -> FuelFilterOutput {
        let r = input.measurement_noise_var;
        let z = input.level_pct;

        let (level, variance) = match st.level {
            Some(level) => {
                let dt_min = input.timestamp.saturating_sub(st.last_timestamp) as f64
                    / MS_PER_MINUTE as f64;
                (level, st.variance + self.process_noise * dt_min)
            }
            None => (z, r),
        };

        let residual = z - level;
        let s = variance + r;
        let gain = variance / s;
        let mut new_level = level + gain * residual;
        let mut new_variance = (1.0 - gain) * variance;

        let reset_occurred = !(new_level.is_finite() && new_variance.is_finite() && new_variance >= 0.0);
        if reset_occurred {
            log::warn!("scalar fuel filter reset at level {:.1}%", z);
            new_level = z;
            new_variance = r;
        }

        st.level = Some(new_level.clamp(FUEL_LEVEL_MIN_PCT, FUEL_LEVEL_MAX_PCT));
        st.variance = new_variance;
        st.last_timestamp = input.timestamp;

        FuelFilterOutput {
            level_estimate: new_level,
            bias_estimate: 0.0,
            variance: new_variance,
            bias_variance: 0.0,
            residual,
            normalized_residual: if s > 0.0 { residual / s.sqrt() } else { 0.0 },
            sensor_bias_detected: false,
            reset_occurred,
            discontinuity: false,
            timestamp: input.timestamp,
        }
    }
}

impl FuelLevelFilter for ScalarKalmanFilter {
    type State = ScalarState;

    fn name(&self) -> &'static str {
        "scalar"
    }

    fn step(&self, state: &mut ScalarState, input: &FilterInput) -> FuelFilterOutput {
        ScalarKalmanFilter::step(self, state, input)
    }
}
