//! Adaptive MPG Estimation
//!
//! ## Overview
//!
//! A fuel-level sensor quantises to roughly half a percent, which on a
//! 150 gallon tank is most of a gallon. Economy computed over a few miles is
//! therefore noise. The estimator accumulates distance and fuel over a window
//! and only publishes when the window is large enough for the mode the truck
//! is driving in:
//!
//! ```text
//! Mode      Closes at
//! HIGHWAY   100 mi or 15 gal
//! MIXED      50 mi or 10 gal
//! CITY       25 mi or  5 gal
//! ```
//!
//! ## Step Handling
//!
//! - `Consumption` steps accumulate.
//! - `Refuel` and `TimeGap` discard the window: the level no longer tells
//!   us what was burned.
//! - `UnexplainedDrop` steps are skipped so stolen fuel never counts as
//!   burned fuel. The window survives and the theft scorer takes over.
//! - `ZeroInterval` steps carry nothing.
//!
//! ## Plausibility
//!
//! Published values are clamped to `[3.5, 12.0]` mpg. A clamped value is
//! flagged `implausible`, keeps its raw value for diagnostics and gets zero
//! confidence.

use serde::{Deserialize, Serialize};

use crate::config::MpgConfig;
use crate::confidence::Confidence;
use crate::mode::DriveMode;
use crate::step::{DistanceSource, FuelStep, StepClass};
use crate::time::Timestamp;

/// A published fuel-economy estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpgEstimate {
    /// Economy, clamped to the plausible range
    pub value: f64,
    /// Economy before clamping
    pub raw_value: f64,
    /// Confidence in `value`
    pub confidence: Confidence,
    /// Mode whose window produced the estimate
    pub mode: DriveMode,
    /// Distance in the window
    pub window_distance_mi: f64,
    /// Fuel in the window
    pub window_fuel_gal: f64,
    /// Steps in the window
    pub sample_count: u32,
    /// Most recent distance source in the window
    pub distance_source: DistanceSource,
    /// Whether the raw value fell outside the plausible range
    pub implausible: bool,
    /// Time of the sample that closed the window
    pub timestamp: Timestamp,
}

/// Why a sample produced no estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoEstimateReason {
    /// The window is still filling
    InsufficientData {
        /// Distance so far
        distance_mi: f64,
        /// Fuel so far
        fuel_gal: f64,
        /// Distance at which the window closes
        target_distance_mi: f64,
        /// Fuel at which the window closes
        target_fuel_gal: f64,
    },
    /// The window closed with no measurable fuel
    ZeroFuel,
    /// A refuel discarded the window
    Refuel,
    /// An unexplained drop was excluded
    DropCandidate,
    /// A long gap discarded the window
    TimeGap,
}

/// Outcome of feeding one step to the estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MpgOutcome {
    /// A window closed and produced an estimate
    Estimate(MpgEstimate),
    /// No estimate this sample
    NoEstimate(NoEstimateReason),
}

impl MpgOutcome {
    /// The estimate, if one was produced
    pub fn estimate(&self) -> Option<&MpgEstimate> {
        match self {
            Self::Estimate(estimate) => Some(estimate),
            Self::NoEstimate(_) => None,
        }
    }

    /// The published value, if an estimate was produced
    pub fn value(&self) -> Option<f64> {
        self.estimate().map(|e| e.value)
    }
}

/// Per-vehicle accumulation window
///
/// Per-step consumption rates (gal/mi) are tracked with Welford's algorithm
/// so the confidence term can use their coefficient of variation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpgWindow {
    distance_mi: f64,
    fuel_gal: f64,
    steps: u32,
    rate_count: u32,
    rate_mean: f64,
    rate_m2: f64,
    source: Option<DistanceSource>,
}

impl MpgWindow {
    /// Distance accumulated so far
    pub fn distance_mi(&self) -> f64 {
        self.distance_mi
    }

    /// Fuel accumulated so far
    pub fn fuel_gal(&self) -> f64 {
        self.fuel_gal
    }

    /// Steps accumulated so far
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Discard everything
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn accumulate(&mut self, step: &FuelStep, min_rate_distance_mi: f64) {
        self.distance_mi += step.distance_mi;
        self.fuel_gal += step.fuel_drop_gal;
        self.steps += 1;
        self.source = Some(step.distance_source);

        if step.distance_mi >= min_rate_distance_mi && step.distance_mi > 0.0 {
            let rate = step.fuel_drop_gal / step.distance_mi;
            self.rate_count += 1;
            let delta = rate - self.rate_mean;
            self.rate_mean += delta / self.rate_count as f64;
            self.rate_m2 += delta * (rate - self.rate_mean);
        }
    }

    fn rate_cv(&self) -> f64 {
        if self.rate_count < 2 || self.rate_mean.abs() < f64::EPSILON {
            return 0.0;
        }
        let variance = self.rate_m2 / (self.rate_count - 1) as f64;
        variance.max(0.0).sqrt() / self.rate_mean.abs()
    }
}

/// Mode-aware MPG estimator
#[derive(Debug, Clone)]
pub struct AdaptiveMpgEstimator {
    config: MpgConfig,
}

impl AdaptiveMpgEstimator {
    /// Create an estimator
    pub fn new(config: MpgConfig) -> Self {
        Self { config }
    }

    /// Feed one step, accumulating into `window` for the current `mode`
    pub fn observe(
        &self,
        window: &mut MpgWindow,
        step: &FuelStep,
        mode: DriveMode,
        timestamp: Timestamp,
    ) -> MpgOutcome {
        match step.class {
            StepClass::Refuel => {
                window.reset();
                return MpgOutcome::NoEstimate(NoEstimateReason::Refuel);
            }
            StepClass::TimeGap => {
                window.reset();
                return MpgOutcome::NoEstimate(NoEstimateReason::TimeGap);
            }
            StepClass::UnexplainedDrop => {
                return MpgOutcome::NoEstimate(NoEstimateReason::DropCandidate);
            }
            StepClass::ZeroInterval => {}
            StepClass::Consumption => {
                window.accumulate(step, self.config.min_rate_distance_mi);
            }
        }

        let target = self.config.window(mode);
        if window.distance_mi < target.distance_mi && window.fuel_gal < target.fuel_gal {
            return MpgOutcome::NoEstimate(NoEstimateReason::InsufficientData {
                distance_mi: window.distance_mi,
                fuel_gal: window.fuel_gal,
                target_distance_mi: target.distance_mi,
                target_fuel_gal: target.fuel_gal,
            });
        }

        let outcome = self.close(window, mode, timestamp);
        window.reset();
        outcome
    }

    fn close(&self, window: &MpgWindow, mode: DriveMode, timestamp: Timestamp) -> MpgOutcome {
        if window.fuel_gal <= self.config.zero_fuel_epsilon_gal {
            log::debug!(
                "closing {:.1} mi window with {:.3} gal: no estimate",
                window.distance_mi,
                window.fuel_gal
            );
            return MpgOutcome::NoEstimate(NoEstimateReason::ZeroFuel);
        }

        let raw_value = window.distance_mi / window.fuel_gal;
        let value = raw_value.clamp(self.config.plausible_min_mpg, self.config.plausible_max_mpg);
        let implausible = value != raw_value;
        let confidence = if implausible {
            log::warn!("implausible economy {:.2} mpg clamped to {:.2}", raw_value, value);
            Confidence::ZERO
        } else {
            Confidence::from_dispersion(
                window.steps,
                self.config.full_confidence_samples,
                window.rate_cv(),
            )
        };

        MpgOutcome::Estimate(MpgEstimate {
            value,
            raw_value,
            confidence,
            mode,
            window_distance_mi: window.distance_mi,
            window_fuel_gal: window.fuel_gal,
            sample_count: window.steps,
            distance_source: window.source.unwrap_or(DistanceSource::SpeedIntegration),
            implausible,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(distance_mi: f64, fuel_gal: f64, class: StepClass) -> FuelStep {
        FuelStep {
            dt_ms: 60_000,
            distance_mi,
            distance_source: DistanceSource::Odometer,
            fuel_drop_pct: fuel_gal / 150.0 * 100.0,
            fuel_drop_gal: fuel_gal,
            expected_max_pct: 0.0,
            class,
        }
    }

    fn estimator() -> AdaptiveMpgEstimator {
        AdaptiveMpgEstimator::new(MpgConfig::default())
    }

    #[test]
    fn test_publishes_when_mixed_window_fills() {
        let est = estimator();
        let mut window = MpgWindow::default();

        let mut outcome = None;
        for i in 0..50 {
            outcome = Some(est.observe(&mut window, &step(1.0, 0.15, StepClass::Consumption), DriveMode::Mixed, i));
        }

        let estimate = outcome.unwrap().estimate().cloned().unwrap();
        assert!((estimate.value - 1.0 / 0.15).abs() < 1e-9);
        assert!(!estimate.implausible);
        assert_eq!(estimate.sample_count, 50);
        // Identical steps: zero dispersion, saturated sample term
        assert_eq!(estimate.confidence, Confidence::FULL);
        assert_eq!(window.steps(), 0);
    }

    #[test]
    fn test_insufficient_data_reports_progress() {
        let est = estimator();
        let mut window = MpgWindow::default();
        let outcome = est.observe(&mut window, &step(10.0, 1.5, StepClass::Consumption), DriveMode::Highway, 0);

        assert_eq!(
            outcome,
            MpgOutcome::NoEstimate(NoEstimateReason::InsufficientData {
                distance_mi: 10.0,
                fuel_gal: 1.5,
                target_distance_mi: 100.0,
                target_fuel_gal: 15.0,
            })
        );
    }

    #[test]
    fn test_zero_fuel_window_has_no_estimate() {
        let est = estimator();
        let mut window = MpgWindow::default();
        let mut last = None;
        for i in 0..25 {
            last = Some(est.observe(&mut window, &step(1.0, 0.0, StepClass::Consumption), DriveMode::City, i));
        }
        assert_eq!(last, Some(MpgOutcome::NoEstimate(NoEstimateReason::ZeroFuel)));
    }

    #[test]
    fn test_refuel_and_gap_discard_window() {
        let est = estimator();
        let mut window = MpgWindow::default();
        est.observe(&mut window, &step(10.0, 1.0, StepClass::Consumption), DriveMode::Mixed, 0);

        let outcome = est.observe(&mut window, &step(0.0, -60.0, StepClass::Refuel), DriveMode::Mixed, 1);
        assert_eq!(outcome, MpgOutcome::NoEstimate(NoEstimateReason::Refuel));
        assert_eq!(window.distance_mi(), 0.0);

        est.observe(&mut window, &step(10.0, 1.0, StepClass::Consumption), DriveMode::Mixed, 2);
        let outcome = est.observe(&mut window, &step(0.0, 0.0, StepClass::TimeGap), DriveMode::Mixed, 3);
        assert_eq!(outcome, MpgOutcome::NoEstimate(NoEstimateReason::TimeGap));
        assert_eq!(window.fuel_gal(), 0.0);
    }

    #[test]
    fn test_unexplained_drop_is_excluded_but_window_survives() {
        let est = estimator();
        let mut window = MpgWindow::default();
        est.observe(&mut window, &step(10.0, 1.0, StepClass::Consumption), DriveMode::Mixed, 0);

        let outcome = est.observe(&mut window, &step(0.0, 30.0, StepClass::UnexplainedDrop), DriveMode::Mixed, 1);
        assert_eq!(outcome, MpgOutcome::NoEstimate(NoEstimateReason::DropCandidate));
        assert_eq!(window.fuel_gal(), 1.0);
        assert_eq!(window.distance_mi(), 10.0);
    }

    #[test]
    fn test_implausible_value_is_clamped_with_zero_confidence() {
        let est = estimator();
        let mut window = MpgWindow::default();
        let mut last = None;
        for i in 0..25 {
            // 25 mpg is not a truck
            last = Some(est.observe(&mut window, &step(1.0, 0.04, StepClass::Consumption), DriveMode::City, i));
        }

        let estimate = last.unwrap().estimate().cloned().unwrap();
        assert!(estimate.implausible);
        assert_eq!(estimate.value, 12.0);
        assert!((estimate.raw_value - 25.0).abs() < 1e-9);
        assert_eq!(estimate.confidence, Confidence::ZERO);
    }

    #[test]
    fn test_noisy_steps_lower_confidence() {
        let est = estimator();
        let mut window = MpgWindow::default();
        let mut last = None;
        for i in 0..50u64 {
            let fuel = if i % 2 == 0 { 0.05 } else { 0.25 };
            last = Some(est.observe(&mut window, &step(1.0, fuel, StepClass::Consumption), DriveMode::Mixed, i));
        }
        let estimate = last.unwrap().estimate().cloned().unwrap();
        assert!(estimate.confidence.as_float() < 0.7);
        assert!(estimate.confidence.as_float() > 0.0);
    }
}
