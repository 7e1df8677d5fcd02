//! A/B Comparison and Deploy Gates
//!
//! ## Overview
//!
//! [`compare`] feeds the same samples to a control and a treatment strategy
//! and aggregates how their outputs differ. [`EvaluateGates`] then checks
//! the aggregate against the configured [`DeployGates`]; the treatment may
//! replace the control only if every gate passes.
//!
//! ## Gates
//!
//! | Gate                      | Observed                                      | Passes when |
//! |---------------------------|-----------------------------------------------|-------------|
//! | MPG difference            | mean \|treatment − control\| MPG              | ≤ 0.5       |
//! | processing overhead       | % extra time per sample                       | ≤ 10        |
//! | variance improvement      | % lower mean filter variance                  | ≥ 15        |
//! | bias detection rate       | % of vehicles with a detected sensor bias     | ≥ 10        |
//! | theft agreement           | % of samples where the alarms agree           | ≥ 90        |
//! | theft confidence          | mean confidence of treatment alarms           | ≥ 0.7       |
//! | false-positive reduction  | % fewer alarms on vehicles without theft      | ≥ 20        |
//!
//! A gate whose statistic cannot be computed fails, with two exceptions: no
//! treatment alarms passes the confidence gate, and a control without false
//! positives passes the reduction gate if the treatment has none either.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use fuelguard_core::config::DeployGates;
use fuelguard_core::TelemetrySample;

use crate::output::EngineOutput;
use crate::strategy::FuelAnalytics;

/// Aggregate differences between two strategies over one sample set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonStats {
    /// Samples offered to both arms
    pub samples: usize,
    /// Treatment estimates paired with a control estimate
    pub mpg_pairs: usize,
    /// Mean |ΔMPG| over the pairs
    pub mean_abs_mpg_diff: Option<f64>,
    /// Mean filter variance of the control
    pub control_mean_variance: Option<f64>,
    /// Mean filter variance of the treatment
    pub treatment_mean_variance: Option<f64>,
    /// Vehicles seen by the treatment
    pub vehicles: usize,
    /// Vehicles for which the treatment detected a sensor bias
    pub bias_detected_vehicles: usize,
    /// Samples both arms accepted
    pub paired_samples: usize,
    /// Paired samples where the alarm state agrees
    pub theft_agreements: usize,
    /// Mean confidence of treatment alarms
    pub mean_theft_confidence: Option<f64>,
    /// Control alarms on vehicles without confirmed theft
    pub control_false_positives: usize,
    /// Treatment alarms on vehicles without confirmed theft
    pub treatment_false_positives: usize,
    /// Mean control processing time per sample
    pub control_ns_per_sample: f64,
    /// Mean treatment processing time per sample
    pub treatment_ns_per_sample: f64,
}

impl ComparisonStats {
    /// Share of vehicles with a detected bias, percent
    pub fn bias_detection_rate_pct(&self) -> Option<f64> {
        (self.vehicles > 0).then(|| self.bias_detected_vehicles as f64 / self.vehicles as f64 * 100.0)
    }

    /// Share of paired samples with agreeing alarms, percent
    pub fn theft_agreement_pct(&self) -> Option<f64> {
        (self.paired_samples > 0)
            .then(|| self.theft_agreements as f64 / self.paired_samples as f64 * 100.0)
    }

    /// Reduction of filter variance, percent of the control's
    pub fn variance_improvement_pct(&self) -> Option<f64> {
        match (self.control_mean_variance, self.treatment_mean_variance) {
            (Some(c), Some(t)) if c > 0.0 => Some((c - t) / c * 100.0),
            _ => None,
        }
    }

    /// Extra processing time, percent of the control's
    pub fn perf_degradation_pct(&self) -> Option<f64> {
        (self.control_ns_per_sample > 0.0).then(|| {
            (self.treatment_ns_per_sample - self.control_ns_per_sample) / self.control_ns_per_sample
                * 100.0
        })
    }

    /// Reduction of false positives, percent of the control's
    pub fn false_positive_reduction_pct(&self) -> Option<f64> {
        (self.control_false_positives > 0).then(|| {
            let c = self.control_false_positives as f64;
            (c - self.treatment_false_positives as f64) / c * 100.0
        })
    }
}

/// Running mean
#[derive(Debug, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Run both strategies over `samples` and aggregate their differences
///
/// `confirmed_theft_vehicles` names the vehicles with verified theft; alarms
/// on any other vehicle count as false positives.
pub fn compare(
    control: &mut dyn FuelAnalytics,
    treatment: &mut dyn FuelAnalytics,
    samples: &[TelemetrySample],
    confirmed_theft_vehicles: &BTreeSet<String>,
) -> ComparisonStats {
    let mut stats = ComparisonStats {
        samples: samples.len(),
        ..ComparisonStats::default()
    };

    let mut last_control_mpg: HashMap<String, f64> = HashMap::new();
    let mut mpg_diff = Mean::default();
    let mut control_variance = Mean::default();
    let mut treatment_variance = Mean::default();
    let mut confidence = Mean::default();
    let mut vehicles: HashSet<String> = HashSet::new();
    let mut biased: HashSet<String> = HashSet::new();
    let mut control_ns = 0u128;
    let mut treatment_ns = 0u128;

    for sample in samples {
        let start = Instant::now();
        let c = control.process(sample);
        control_ns += start.elapsed().as_nanos();

        let start = Instant::now();
        let t = treatment.process(sample);
        treatment_ns += start.elapsed().as_nanos();

        if let Ok(c) = &c {
            control_variance.add(c.fuel.variance);
            if let Some(value) = c.mpg_value() {
                last_control_mpg.insert(c.vehicle_id.clone(), value);
            }
            if c.is_theft_alarm() && !confirmed_theft_vehicles.contains(&c.vehicle_id) {
                stats.control_false_positives += 1;
            }
        }

        if let Ok(t) = &t {
            treatment_variance.add(t.fuel.variance);
            vehicles.insert(t.vehicle_id.clone());
            if t.fuel.sensor_bias_detected {
                biased.insert(t.vehicle_id.clone());
            }
            if let (Some(value), Some(reference)) = (t.mpg_value(), last_control_mpg.get(&t.vehicle_id)) {
                mpg_diff.add((value - reference).abs());
                stats.mpg_pairs += 1;
            }
            if t.is_theft_alarm() {
                if let Some(theft) = &t.theft {
                    confidence.add(theft.confidence.as_float());
                }
                if !confirmed_theft_vehicles.contains(&t.vehicle_id) {
                    stats.treatment_false_positives += 1;
                }
            }
        }

        if let (Ok(c), Ok(t)) = (&c, &t) {
            stats.paired_samples += 1;
            if alarm_agrees(c, t) {
                stats.theft_agreements += 1;
            }
        }
    }

    stats.mean_abs_mpg_diff = mpg_diff.value();
    stats.control_mean_variance = control_variance.value();
    stats.treatment_mean_variance = treatment_variance.value();
    stats.mean_theft_confidence = confidence.value();
    stats.vehicles = vehicles.len();
    stats.bias_detected_vehicles = biased.len();
    if !samples.is_empty() {
        stats.control_ns_per_sample = control_ns as f64 / samples.len() as f64;
        stats.treatment_ns_per_sample = treatment_ns as f64 / samples.len() as f64;
    }

    log::info!(
        "compared {} vs {} over {} samples: {} MPG pairs, {}/{} alarm agreement",
        control.name(),
        treatment.name(),
        stats.samples,
        stats.mpg_pairs,
        stats.theft_agreements,
        stats.paired_samples
    );
    stats
}

fn alarm_agrees(control: &EngineOutput, treatment: &EngineOutput) -> bool {
    control.is_theft_alarm() == treatment.is_theft_alarm()
}

/// Deploy gate identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Mean |ΔMPG| bound
    MpgDifference,
    /// Processing overhead bound
    ProcessingOverhead,
    /// Filter variance improvement
    VarianceImprovement,
    /// Sensor bias detection rate
    BiasDetectionRate,
    /// Theft alarm agreement
    TheftAgreement,
    /// Theft alarm confidence
    TheftConfidence,
    /// False-positive reduction
    FalsePositiveReduction,
}

/// Outcome of one gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheck {
    /// Which gate
    pub gate: Gate,
    /// Observed statistic; `None` when it could not be computed
    pub observed: Option<f64>,
    /// Configured threshold
    pub threshold: f64,
    /// Whether the gate passed
    pub passed: bool,
}

/// Outcome of every gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// One entry per gate
    pub checks: Vec<GateCheck>,
}

impl GateReport {
    /// Whether every gate passed
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Gates that failed
    pub fn failures(&self) -> impl Iterator<Item = &GateCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Check for one gate
    pub fn check(&self, gate: Gate) -> Option<&GateCheck> {
        self.checks.iter().find(|c| c.gate == gate)
    }
}

/// Evaluation of deploy gates against comparison statistics
pub trait EvaluateGates {
    /// Check every gate
    fn evaluate(&self, stats: &ComparisonStats) -> GateReport;
}

impl EvaluateGates for DeployGates {
    fn evaluate(&self, stats: &ComparisonStats) -> GateReport {
        let at_most = |gate, observed: Option<f64>, threshold: f64| GateCheck {
            gate,
            observed,
            threshold,
            passed: observed.map_or(false, |v| v <= threshold),
        };
        let at_least = |gate, observed: Option<f64>, threshold: f64| GateCheck {
            gate,
            observed,
            threshold,
            passed: observed.map_or(false, |v| v >= threshold),
        };

        let confidence = GateCheck {
            gate: Gate::TheftConfidence,
            observed: stats.mean_theft_confidence,
            threshold: self.theft_confidence_threshold,
            passed: stats
                .mean_theft_confidence
                .map_or(true, |v| v >= self.theft_confidence_threshold),
        };

        let false_positives = if stats.control_false_positives == 0 {
            GateCheck {
                gate: Gate::FalsePositiveReduction,
                observed: None,
                threshold: self.theft_false_positive_reduction_pct,
                passed: stats.treatment_false_positives == 0,
            }
        } else {
            at_least(
                Gate::FalsePositiveReduction,
                stats.false_positive_reduction_pct(),
                self.theft_false_positive_reduction_pct,
            )
        };

        let report = GateReport {
            checks: vec![
                at_most(Gate::MpgDifference, stats.mean_abs_mpg_diff, self.mpg_deploy_diff_threshold),
                at_most(
                    Gate::ProcessingOverhead,
                    stats.perf_degradation_pct(),
                    self.mpg_max_perf_degradation_pct,
                ),
                at_least(
                    Gate::VarianceImprovement,
                    stats.variance_improvement_pct(),
                    self.ekf_variance_improvement_pct,
                ),
                at_least(
                    Gate::BiasDetectionRate,
                    stats.bias_detection_rate_pct(),
                    self.ekf_bias_detection_rate_pct,
                ),
                at_least(Gate::TheftAgreement, stats.theft_agreement_pct(), self.theft_agreement_pct),
                confidence,
                false_positives,
            ],
        };

        for failure in report.failures() {
            log::info!(
                "deploy gate {:?} failed: observed {:?}, threshold {}",
                failure.gate,
                failure.observed,
                failure.threshold
            );
        }
        report
    }
}
