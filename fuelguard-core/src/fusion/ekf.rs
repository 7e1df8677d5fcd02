//! Extended Kalman Filter for Fuel Level and Sensor Bias
//!
//! ## Overview
//!
//! The filter tracks two states, the true fuel level `L` and the sensor's
//! calibration bias `b`, both in percent of tank. The sensor reports their
//! sum, so the bias only becomes observable when the burn is known: parked
//! with the ignition off the tank should hold at 60%, and a sensor that keeps
//! saying 63% settles the difference into `b`. The same goes for a measured
//! ECU fuel rate.
//!
//! ## Model
//!
//! ### Prediction
//! ```text
//! burn      = fuel_rate                                  (ECU rate available)
//!           = 0                                          (ignition off, stopped)
//!           = (idle + a·v + c·v² + r·krpm²)·(1 + k·L/100)  (otherwise)
//! L'        = max(0, L - burn·Δt_h·100/tank)
//! b'        = b
//! F         = ∂f/∂x   (central differences)
//! Q         = diag(q_L·Δt_min + (σ_rate·ΔL)², q_b·Δt_min)
//! P'        = F·P·Fᵀ + Q
//! ```
//!
//! ### Update
//! ```text
//! H = [1, 1]
//! y = z - (L + b)
//! S = H·P·Hᵀ + R
//! K = P·Hᵀ / S
//! x = x + K·y
//! P = (I - K·H)·P·(I - K·H)ᵀ + K·R·Kᵀ     (Joseph form)
//! ```
//!
//! While moving on the speed model the burn is only a guess. A truck that
//! burns 30% more than modelled would otherwise show up as a growing negative
//! bias. In that case the bias is held: the cross-covariance is dropped and
//! the update runs with `H = [1, 0]`, so the whole residual goes to the level.
//!
//! ## Discontinuities
//!
//! A refuel or a siphon moves the level by far more than the model allows.
//! When `|y| / √S` exceeds the jump gate, the level variance is inflated by
//! `y²` before the update. The level then absorbs the jump and the bias
//! barely moves, instead of the filter slowly dragging both states towards
//! the new reading.
//!
//! ## Bias Detection
//!
//! The bias estimate is smoothed with an EMA. The `sensor_bias_detected`
//! flag rises once the smoothed magnitude has stayed above the threshold for
//! a sustained number of updates, and clears only after it has stayed below
//! half the threshold for as long.
//!
//! ## Recovery
//!
//! After every step the state and covariance are checked: finite values,
//! non-negative variances and a determinant inside `[min_det, max_det]`. A
//! failed check resets the filter to the last healthy bias (or zero), sets
//! the level to `measurement - bias`, restores the prior covariance and
//! reports `reset_occurred`.

use serde::{Deserialize, Serialize};

use super::matrix::{
    add, determinant2, diagonal, identity, is_finite, make_symmetric, matvec, multiply,
    sub, transpose, SquareMatrix, Vector,
};
use super::{FilterInput, FuelFilterOutput, FuelLevelFilter, FusionError, FusionResult};
use crate::config::EkfConfig;
use crate::constants::fusion::JACOBIAN_EPSILON;
use crate::constants::vehicle::{FUEL_LEVEL_MAX_PCT, FUEL_LEVEL_MIN_PCT, STOP_SPEED_MPH};
use crate::constants::MS_PER_MINUTE;
use crate::time::Timestamp;

const LEVEL: usize = 0;
const BIAS: usize = 1;

/// Persisted filter state, part of a vehicle's baseline snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCheckpoint {
    /// Level estimate
    pub level_pct: f64,
    /// Bias estimate
    pub bias_pct: f64,
    /// State covariance
    pub covariance: SquareMatrix<2>,
    /// Time of the last applied measurement
    pub timestamp: Timestamp,
    /// Smoothed bias used by the detector
    pub smoothed_bias: f64,
    /// Detector flag
    pub bias_detected: bool,
}

/// Per-vehicle EKF state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    initialized: bool,
    state: Vector<2>,
    covariance: SquareMatrix<2>,
    last_timestamp: Option<Timestamp>,

    // Bias detector
    smoothed_bias: f64,
    bias_streak: u32,
    clear_streak: u32,
    bias_detected: bool,

    /// Bias after the most recent healthy update
    last_good_bias: Option<f64>,
    update_count: u64,
    reset_count: u32,
}

impl FilterState {
    /// Start from an explicit prior instead of the first measurement
    pub fn with_prior(
        level_pct: f64,
        bias_pct: f64,
        covariance: SquareMatrix<2>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            initialized: true,
            state: [level_pct, bias_pct],
            covariance,
            last_timestamp: Some(timestamp),
            smoothed_bias: bias_pct,
            last_good_bias: Some(bias_pct),
            ..Self::default()
        }
    }

    /// Restore from a baseline snapshot
    pub fn from_checkpoint(checkpoint: &FilterCheckpoint) -> Self {
        Self {
            smoothed_bias: checkpoint.smoothed_bias,
            bias_detected: checkpoint.bias_detected,
            ..Self::with_prior(
                checkpoint.level_pct,
                checkpoint.bias_pct,
                checkpoint.covariance,
                checkpoint.timestamp,
            )
        }
    }

    /// Snapshot for persistence; `None` before the first measurement
    pub fn checkpoint(&self) -> Option<FilterCheckpoint> {
        if !self.initialized {
            return None;
        }
        Some(FilterCheckpoint {
            level_pct: self.state[LEVEL],
            bias_pct: self.state[BIAS],
            covariance: self.covariance,
            timestamp: self.last_timestamp.unwrap_or_default(),
            smoothed_bias: self.smoothed_bias,
            bias_detected: self.bias_detected,
        })
    }

    /// Whether the filter has seen a measurement or prior
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Level estimate
    pub fn level(&self) -> f64 {
        self.state[LEVEL]
    }

    /// Bias estimate
    pub fn bias(&self) -> f64 {
        self.state[BIAS]
    }

    /// State covariance
    pub fn covariance(&self) -> &SquareMatrix<2> {
        &self.covariance
    }

    /// Detector flag
    pub fn bias_detected(&self) -> bool {
        self.bias_detected
    }

    /// Successful measurement updates
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Resets after numerical failures
    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }
}

/// Innovation statistics of one update
struct Innovation {
    residual: f64,
    normalized: f64,
    discontinuity: bool,
}

/// Two-state extended Kalman filter for fuel level and sensor bias
#[derive(Debug, Clone)]
pub struct ExtendedKalmanFuelFilter {
    config: EkfConfig,
}

impl ExtendedKalmanFuelFilter {
    /// Create a filter
    pub fn new(config: EkfConfig) -> Self {
        Self { config }
    }

    /// Filter configuration
    pub fn config(&self) -> &EkfConfig {
        &self.config
    }

    /// Process one measurement
    pub fn step(&self, st: &mut FilterState, input: &FilterInput) -> FuelFilterOutput {
        if !st.initialized {
            self.initialize(st, input);
        } else {
            let dt_ms = st
                .last_timestamp
                .map(|last| input.timestamp.saturating_sub(last))
                .unwrap_or(0);

            if dt_ms > self.config.reanchor_after_ms {
                self.reanchor(st, input);
            } else if dt_ms > 0 {
                if let Err(err) = self.predict(st, input, dt_ms) {
                    return self.reset(st, input, err);
                }
            }
        }

        match self.update(st, input) {
            Ok(innovation) => {
                st.last_timestamp = Some(input.timestamp);
                st.last_good_bias = Some(st.state[BIAS]);
                st.update_count += 1;
                self.track_bias(st);
                self.output(st, input.timestamp, &innovation, false)
            }
            Err(err) => self.reset(st, input, err),
        }
    }

    /// Fuel burn rate in gph at a given level
    pub fn burn_rate_gph(&self, level_pct: f64, input: &FilterInput) -> f64 {
        if let Some(rate) = input.fuel_rate_gph {
            return rate;
        }
        if input.ignition_on == Some(false) && input.speed_mph < STOP_SPEED_MPH {
            return 0.0;
        }

        let m = &self.config.consumption;
        let v = input.speed_mph;
        let krpm = input.rpm.unwrap_or(0.0) / 1_000.0;
        let base = m.idle_gph + m.speed_coeff * v + m.drag_coeff * v * v + m.rpm_coeff * krpm * krpm;
        let fill = level_pct.clamp(FUEL_LEVEL_MIN_PCT, FUEL_LEVEL_MAX_PCT) / 100.0;
        base * (1.0 + m.load_coeff * fill)
    }

    /// State transition f(x) over `dt_h` hours
    pub fn transition(&self, x: &Vector<2>, input: &FilterInput, dt_h: f64) -> Vector<2> {
        let burn_pct = self.burn_rate_gph(x[LEVEL], input) * dt_h * 100.0 / input.tank_gal;
        [(x[LEVEL] - burn_pct).max(0.0), x[BIAS]]
    }

    /// Jacobian of the transition by central differences
    fn jacobian(&self, x: &Vector<2>, input: &FilterInput, dt_h: f64) -> SquareMatrix<2> {
        let mut jacobian = [[0.0; 2]; 2];

        for j in 0..2 {
            let mut plus = *x;
            let mut minus = *x;
            plus[j] += JACOBIAN_EPSILON;
            minus[j] -= JACOBIAN_EPSILON;

            let f_plus = self.transition(&plus, input, dt_h);
            let f_minus = self.transition(&minus, input, dt_h);

            // df/dx_j
            for i in 0..2 {
                jacobian[i][j] = (f_plus[i] - f_minus[i]) / (2.0 * JACOBIAN_EPSILON);
            }
        }

        jacobian
    }

    fn initialize(&self, st: &mut FilterState, input: &FilterInput) {
        st.initialized = true;
        st.state = [input.level_pct, 0.0];
        st.covariance = self.prior_covariance();
        st.smoothed_bias = 0.0;
    }

    fn reanchor(&self, st: &mut FilterState, input: &FilterInput) {
        log::debug!(
            "re-anchoring fuel level after gap ({:.1}% -> {:.1}%)",
            st.state[LEVEL],
            input.level_pct - st.state[BIAS]
        );
        st.state[LEVEL] = (input.level_pct - st.state[BIAS]).clamp(FUEL_LEVEL_MIN_PCT, FUEL_LEVEL_MAX_PCT);
        st.covariance = [
            [self.config.initial_level_var, 0.0],
            [0.0, st.covariance[BIAS][BIAS]],
        ];
    }

    fn predict(&self, st: &mut FilterState, input: &FilterInput, dt_ms: u64) -> FusionResult<()> {
        let dt_min = dt_ms as f64 / MS_PER_MINUTE as f64;
        let dt_h = dt_min / 60.0;

        let predicted = self.transition(&st.state, input, dt_h);
        let f = self.jacobian(&st.state, input, dt_h);

        let level_change = st.state[LEVEL] - predicted[LEVEL];
        let q = diagonal(&[
            self.config.level_process_noise * dt_min
                + (self.config.rate_uncertainty * level_change).powi(2),
            self.config.bias_process_noise * dt_min,
        ]);

        // P = F·P·Fᵀ + Q
        let mut covariance = add(&multiply(&multiply(&f, &st.covariance), &transpose(&f)), &q);
        make_symmetric(&mut covariance);

        self.check_health(&predicted, &covariance)?;
        st.state = predicted;
        st.covariance = covariance;
        Ok(())
    }

    fn update(&self, st: &mut FilterState, input: &FilterInput) -> FusionResult<Innovation> {
        let r = input.measurement_noise_var;
        let mut p = st.covariance;

        // With the bias held as a known offset: H = [1, 0], no cross-covariance
        let h: Vector<2> = if self.bias_observable(input) {
            [1.0, 1.0]
        } else {
            p[LEVEL][BIAS] = 0.0;
            p[BIAS][LEVEL] = 0.0;
            [1.0, 0.0]
        };

        // y = z - (L + b)
        let residual = input.level_pct - (st.state[LEVEL] + st.state[BIAS]);

        // S = H·P·Hᵀ + R
        let ph = matvec(&p, &h);
        let mut s = h[LEVEL] * ph[LEVEL] + h[BIAS] * ph[BIAS] + r;
        if !(s.is_finite() && s > 0.0) {
            return Err(FusionError::SingularInnovation { variance: s });
        }
        let normalized = residual / s.sqrt();

        let discontinuity = normalized.abs() > self.config.jump_gate_sigma;
        if discontinuity {
            log::debug!(
                "fuel level discontinuity: residual {:.2}% ({:.1}σ)",
                residual,
                normalized
            );
            p[LEVEL][LEVEL] += residual * residual;
            s += residual * residual;
        }

        // K = P·Hᵀ / S
        let ph = matvec(&p, &h);
        let k = [ph[LEVEL] / s, ph[BIAS] / s];
        let mut state = [
            st.state[LEVEL] + k[LEVEL] * residual,
            st.state[BIAS] + k[BIAS] * residual,
        ];
        state[LEVEL] = state[LEVEL].clamp(FUEL_LEVEL_MIN_PCT, FUEL_LEVEL_MAX_PCT);

        // P = (I - K·H)·P·(I - K·H)ᵀ + K·R·Kᵀ
        let kh = multiply(&transpose(&[k]), &[h]);
        let i_kh = sub(&identity(), &kh);
        let krk = [
            [k[0] * k[0] * r, k[0] * k[1] * r],
            [k[1] * k[0] * r, k[1] * k[1] * r],
        ];
        let mut covariance = add(&multiply(&multiply(&i_kh, &p), &transpose(&i_kh)), &krk);
        make_symmetric(&mut covariance);

        self.check_health(&state, &covariance)?;
        st.state = state;
        st.covariance = covariance;

        Ok(Innovation {
            residual,
            normalized,
            discontinuity,
        })
    }

    /// Whether a level error can be told apart from a calibration offset.
    ///
    /// Only a measured burn (ECU fuel rate) or a known zero burn (parked with
    /// the ignition off) pins the level independently of the sensor. Under the
    /// speed model a wrong consumption coefficient is indistinguishable from a
    /// bias, so the bias estimate is held and the level alone follows the
    /// sensor.
    pub fn bias_observable(&self, input: &FilterInput) -> bool {
        input.fuel_rate_gph.is_some()
            || (input.ignition_on == Some(false) && input.speed_mph < STOP_SPEED_MPH)
    }

    fn check_health(&self, state: &Vector<2>, covariance: &SquareMatrix<2>) -> FusionResult<()> {
        if !state.iter().all(|v| v.is_finite()) || !is_finite(covariance) {
            return Err(FusionError::NonFinite);
        }
        for i in 0..2 {
            if covariance[i][i] < 0.0 {
                return Err(FusionError::NegativeVariance {
                    variance: covariance[i][i],
                });
            }
        }
        let det = determinant2(covariance);
        if det < self.config.min_covariance_det {
            return Err(FusionError::Collapsed { det });
        }
        if det > self.config.max_covariance_det {
            return Err(FusionError::Diverged { det });
        }
        Ok(())
    }

    fn reset(&self, st: &mut FilterState, input: &FilterInput, err: FusionError) -> FuelFilterOutput {
        let bias = st.last_good_bias.unwrap_or(0.0);
        log::warn!(
            "fuel filter reset ({}); restoring bias {:.2}% at level {:.1}%",
            err,
            bias,
            input.level_pct
        );

        st.initialized = true;
        st.state = [
            (input.level_pct - bias).clamp(FUEL_LEVEL_MIN_PCT, FUEL_LEVEL_MAX_PCT),
            bias,
        ];
        st.covariance = self.prior_covariance();
        st.last_timestamp = Some(input.timestamp);
        st.smoothed_bias = bias;
        st.bias_streak = 0;
        st.clear_streak = 0;
        st.reset_count += 1;

        let quiet = Innovation {
            residual: 0.0,
            normalized: 0.0,
            discontinuity: false,
        };
        self.output(st, input.timestamp, &quiet, true)
    }

    fn track_bias(&self, st: &mut FilterState) {
        let alpha = self.config.bias_smoothing_alpha;
        st.smoothed_bias = alpha * st.state[BIAS] + (1.0 - alpha) * st.smoothed_bias;

        let magnitude = st.smoothed_bias.abs();
        let threshold = self.config.bias_threshold_pct;
        let sustain = self.config.bias_sustain_updates;

        if magnitude > threshold {
            st.clear_streak = 0;
            st.bias_streak = st.bias_streak.saturating_add(1);
            if !st.bias_detected && st.bias_streak >= sustain {
                st.bias_detected = true;
                log::info!("sensor bias detected: {:+.2}%", st.smoothed_bias);
            }
        } else if magnitude < threshold * self.config.bias_clear_fraction {
            st.bias_streak = 0;
            st.clear_streak = st.clear_streak.saturating_add(1);
            if st.bias_detected && st.clear_streak >= sustain {
                st.bias_detected = false;
                log::info!("sensor bias cleared: {:+.2}%", st.smoothed_bias);
            }
        } else {
            st.bias_streak = 0;
            st.clear_streak = 0;
        }
    }

    fn prior_covariance(&self) -> SquareMatrix<2> {
        diagonal(&[self.config.initial_level_var, self.config.initial_bias_var])
    }

    fn output(
        &self,
        st: &FilterState,
        timestamp: Timestamp,
        innovation: &Innovation,
        reset_occurred: bool,
    ) -> FuelFilterOutput {
        FuelFilterOutput {
            level_estimate: st.state[LEVEL],
            bias_estimate: st.state[BIAS],
            variance: st.covariance[LEVEL][LEVEL],
            bias_variance: st.covariance[BIAS][BIAS],
            residual: innovation.residual,
            normalized_residual: innovation.normalized,
            sensor_bias_detected: st.bias_detected,
            reset_occurred,
            discontinuity: innovation.discontinuity,
            timestamp,
        }
    }
}

impl FuelLevelFilter for ExtendedKalmanFuelFilter {
    type State = FilterState;

    fn name(&self) -> &'static str {
        "ekf"
    }

    fn step(&self, state: &mut FilterState, input: &FilterInput) -> FuelFilterOutput {
        ExtendedKalmanFuelFilter::step(self, state, input)
    }
}
