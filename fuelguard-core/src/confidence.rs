//! Confidence Scores for Estimates and Verdicts
//!
//! ## Overview
//!
//! Every estimate the engine publishes carries a confidence in `[0, 1]` so
//! downstream consumers can decide whether to act on it. Two constructions
//! cover the engine's needs:
//!
//! ### Dispersion-Based (MPG windows)
//!
//! ```text
//! confidence = min(n / n_full, 1) × 1 / (1 + cv)
//!
//! Where:
//! - n      = samples in the window
//! - n_full = samples at which the size term saturates
//! - cv     = coefficient of variation of per-step consumption
//! ```
//!
//! Few samples or erratic per-step consumption both pull confidence down.
//!
//! ### Coverage-Based (theft verdicts)
//!
//! ```text
//! confidence = computable_factors / total_factors
//! ```
//!
//! A score built from two factors is worth less than one built from seven,
//! even when both composites agree.

use serde::{Deserialize, Serialize};

/// Confidence score in range [0, 1]
///
/// 0.0 = no confidence, 1.0 = full confidence. Construction clamps, and NaN
/// maps to zero, so a `Confidence` is always a usable number.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// No confidence
    pub const ZERO: Self = Self(0.0);

    /// Full confidence
    pub const FULL: Self = Self(1.0);

    /// High confidence threshold (90%)
    pub const HIGH_THRESHOLD: Self = Self(0.9);

    /// Create from a floating point value, clamped to [0, 1]
    pub fn from_float(confidence: f64) -> Self {
        if confidence.is_nan() {
            return Self::ZERO;
        }
        Self(confidence.clamp(0.0, 1.0))
    }

    /// Convert to floating point
    pub fn as_float(&self) -> f64 {
        self.0
    }

    /// Check if confidence is above the high threshold
    pub fn is_high(&self) -> bool {
        *self >= Self::HIGH_THRESHOLD
    }

    /// Share of available inputs, e.g. computable theft factors
    pub fn from_coverage(available: usize, total: usize) -> Self {
        if total == 0 {
            return Self::ZERO;
        }
        Self::from_float(available as f64 / total as f64)
    }

    /// Sample-size term times a stability term from the coefficient of variation
    pub fn from_dispersion(samples: u32, full_samples: u32, coefficient_of_variation: f64) -> Self {
        let size = if full_samples == 0 {
            1.0
        } else {
            (samples as f64 / full_samples as f64).min(1.0)
        };
        let cv = if coefficient_of_variation.is_finite() {
            coefficient_of_variation.abs()
        } else {
            return Self::ZERO;
        };
        Self::from_float(size / (1.0 + cv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_and_rejects_nan() {
        assert_eq!(Confidence::from_float(1.7), Confidence::FULL);
        assert_eq!(Confidence::from_float(-0.2), Confidence::ZERO);
        assert_eq!(Confidence::from_float(f64::NAN), Confidence::ZERO);
        assert!(Confidence::from_float(0.95).is_high());
    }

    #[test]
    fn test_coverage() {
        let c = Confidence::from_coverage(3, 7);
        assert!((c.as_float() - 3.0 / 7.0).abs() < 1e-12);
        assert_eq!(Confidence::from_coverage(0, 0), Confidence::ZERO);
    }

    #[test]
    fn test_dispersion_rewards_size_and_stability() {
        let small = Confidence::from_dispersion(5, 20, 0.0);
        let full = Confidence::from_dispersion(40, 20, 0.0);
        let noisy = Confidence::from_dispersion(40, 20, 1.0);

        assert!((small.as_float() - 0.25).abs() < 1e-12);
        assert_eq!(full, Confidence::FULL);
        assert!((noisy.as_float() - 0.5).abs() < 1e-12);
        assert_eq!(Confidence::from_dispersion(40, 20, f64::INFINITY), Confidence::ZERO);
    }
}
