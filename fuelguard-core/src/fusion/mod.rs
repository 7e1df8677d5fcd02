//! Fuel-Level Filtering
//!
//! ## Overview
//!
//! Tank sensors are noisy, slosh with every brake application and drift out
//! of calibration. This module turns raw level readings into a filtered
//! level plus an explicit estimate of the sensor's calibration bias.
//!
//! ```text
//! level sensor ──┐
//! speed / rpm  ──┼─→ Extended Kalman Filter ─→ level, bias, variance
//! fuel rate    ──┘         ↓
//!                    innovation (feeds theft scoring)
//! ```
//!
//! ## Filters
//!
//! ### Extended Kalman Filter (primary)
//!
//! Two states, level and bias, with a nonlinear physics-based consumption
//! model for prediction. See [`ekf`].
//!
//! ### Scalar Kalman Filter (legacy)
//!
//! One state, no consumption model, no bias. Kept as the control arm for
//! A/B comparison. See [`scalar`].
//!
//! ## Numerical Stability
//!
//! - **Symmetric enforcement**: covariance kept symmetric after every step
//! - **Joseph form**: measurement update preserves positive semi-definiteness
//! - **Health checks**: non-finite values, negative variances and runaway
//!   determinants are detected and the filter resets instead of diverging

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::Timestamp;

pub mod ekf;
pub mod scalar;

pub use ekf::{ExtendedKalmanFuelFilter, FilterCheckpoint, FilterState};
pub use scalar::{ScalarKalmanFilter, ScalarState};

/// Result type for filter internals
pub type FusionResult<T> = Result<T, FusionError>;

/// Numerical failures inside a filter step
///
/// These never escape a filter: the step that hits one resets the filter and
/// reports `reset_occurred` instead.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FusionError {
    /// A state or covariance entry is NaN or infinite
    #[error("non-finite value in filter state")]
    NonFinite,
    /// A variance on the covariance diagonal went negative
    #[error("negative variance {variance}")]
    NegativeVariance {
        /// The offending diagonal entry
        variance: f64,
    },
    /// The covariance determinant collapsed towards zero
    #[error("covariance determinant {det} below limit")]
    Collapsed {
        /// Determinant found
        det: f64,
    },
    /// The covariance determinant grew without bound
    #[error("covariance determinant {det} above limit")]
    Diverged {
        /// Determinant found
        det: f64,
    },
    /// The innovation variance is not positive
    #[error("innovation variance {variance} is not positive")]
    SingularInnovation {
        /// Innovation variance found
        variance: f64,
    },
}

/// Inputs to one filter step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterInput {
    /// Sample time
    pub timestamp: Timestamp,
    /// Measured fuel level, percent
    pub level_pct: f64,
    /// Road speed
    pub speed_mph: f64,
    /// Engine speed
    pub rpm: Option<f64>,
    /// Ignition state
    pub ignition_on: Option<bool>,
    /// ECU fuel rate, used in place of the consumption model when present
    pub fuel_rate_gph: Option<f64>,
    /// Tank capacity
    pub tank_gal: f64,
    /// Measurement variance for this vehicle's sensor
    pub measurement_noise_var: f64,
}

/// Output of one filter step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelFilterOutput {
    /// Filtered true level, percent
    pub level_estimate: f64,
    /// Estimated sensor bias, percent (reading = level + bias)
    pub bias_estimate: f64,
    /// Level variance
    pub variance: f64,
    /// Bias variance
    pub bias_variance: f64,
    /// Measurement minus prediction
    pub residual: f64,
    /// Residual divided by the innovation standard deviation
    pub normalized_residual: f64,
    /// Whether a sustained sensor bias is currently detected
    pub sensor_bias_detected: bool,
    /// Whether this step reset the filter after a numerical failure
    pub reset_occurred: bool,
    /// Whether the innovation exceeded the jump gate
    pub discontinuity: bool,
    /// Sample time
    pub timestamp: Timestamp,
}

/// A fuel-level filter whose per-vehicle state lives outside the filter
///
/// The filter holds only configuration, so one instance serves a whole
/// fleet and can be shared across threads.
pub trait FuelLevelFilter: Send + Sync {
    /// Per-vehicle state
    type State: Clone + Default;

    /// Short name for logs and reports
    fn name(&self) -> &'static str;

    /// Advance `state` by one measurement
    fn step(&self, state: &mut Self::State, input: &FilterInput) -> FuelFilterOutput;
}

/// Matrix operations for fixed-size filter algebra
pub mod matrix {
    /// Matrix type using const generics
    pub type Matrix<const R: usize, const C: usize> = [[f64; C]; R];

    /// Square matrix type
    pub type SquareMatrix<const N: usize> = Matrix<N, N>;

    /// Vector type
    pub type Vector<const N: usize> = [f64; N];

    /// Identity matrix
    pub fn identity<const N: usize>() -> SquareMatrix<N> {
        let mut m = [[0.0; N]; N];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        m
    }

    /// Diagonal matrix from a vector
    pub fn diagonal<const N: usize>(values: &Vector<N>) -> SquareMatrix<N> {
        let mut m = [[0.0; N]; N];
        for i in 0..N {
            m[i][i] = values[i];
        }
        m
    }

    /// Matrix multiplication: A × B
    pub fn multiply<const R: usize, const K: usize, const C: usize>(
        a: &Matrix<R, K>,
        b: &Matrix<K, C>,
    ) -> Matrix<R, C> {
        let mut result = [[0.0; C]; R];
        for i in 0..R {
            for j in 0..C {
                for k in 0..K {
                    result[i][j] += a[i][k] * b[k][j];
                }
            }
        }
        result
    }

    /// Matrix transpose: Aᵀ
    pub fn transpose<const R: usize, const C: usize>(a: &Matrix<R, C>) -> Matrix<C, R> {
        let mut result = [[0.0; R]; C];
        for i in 0..R {
            for j in 0..C {
                result[j][i] = a[i][j];
            }
        }
        result
    }

    /// Matrix addition: A + B
    pub fn add<const R: usize, const C: usize>(a: &Matrix<R, C>, b: &Matrix<R, C>) -> Matrix<R, C> {
        let mut result = *a;
        for i in 0..R {
            for j in 0..C {
                result[i][j] += b[i][j];
            }
        }
        result
    }

    /// Matrix subtraction: A - B
    pub fn sub<const R: usize, const C: usize>(a: &Matrix<R, C>, b: &Matrix<R, C>) -> Matrix<R, C> {
        let mut result = *a;
        for i in 0..R {
            for j in 0..C {
                result[i][j] -= b[i][j];
            }
        }
        result
    }

    /// Make matrix symmetric: A = (A + Aᵀ) / 2
    ///
    /// Critical for keeping covariance matrices positive semi-definite
    pub fn make_symmetric<const N: usize>(matrix: &mut SquareMatrix<N>) {
        for i in 0..N {
            for j in i + 1..N {
                let avg = (matrix[i][j] + matrix[j][i]) * 0.5;
                matrix[i][j] = avg;
                matrix[j][i] = avg;
            }
        }
    }

    /// Matrix-vector multiplication: A × x
    pub fn matvec<const R: usize, const C: usize>(matrix: &Matrix<R, C>, vector: &Vector<C>) -> Vector<R> {
        let mut result = [0.0; R];
        for i in 0..R {
            for j in 0..C {
                result[i] += matrix[i][j] * vector[j];
            }
        }
        result
    }

    /// Determinant of a 2×2 matrix
    pub fn determinant2(m: &SquareMatrix<2>) -> f64 {
        m[0][0] * m[1][1] - m[0][1] * m[1][0]
    }

    /// Whether every entry is finite
    pub fn is_finite<const R: usize, const C: usize>(m: &Matrix<R, C>) -> bool {
        m.iter().flatten().all(|v| v.is_finite())
    }
}
