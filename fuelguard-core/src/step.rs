//! Analysis of the step between two consecutive samples
//!
//! Every algorithm downstream of ingestion looks at the same question: what
//! happened between the previous reading and this one? [`StepAnalyzer`]
//! answers it once per sample.
//!
//! Distance comes from the best available source:
//!
//! 1. Odometer delta, if non-negative and no larger than
//!    `dt × max_speed × slack`
//! 2. Haversine distance between GPS fixes
//! 3. Trapezoidal integration of road speed
//!
//! The level change is then compared against the most fuel the truck could
//! plausibly have burned over that distance and time (worst-case economy plus
//! idle burn while the engine runs), and the step is classified.

use serde::{Deserialize, Serialize};

use crate::config::StepConfig;
use crate::constants::vehicle::{MAX_SPEED_MPH, METERS_PER_MILE};
use crate::sample::Reading;
use crate::time::hours_between;

/// What happened between two samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepClass {
    /// Level fell no faster than driving explains
    Consumption,
    /// Two samples share a timestamp
    ZeroInterval,
    /// Level rose past the refuel threshold
    Refuel,
    /// Level fell well beyond expected consumption
    UnexplainedDrop,
    /// Interval too long to attribute consumption reliably
    TimeGap,
}

/// Where a distance figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceSource {
    /// Odometer delta
    Odometer,
    /// GPS great-circle distance
    Gps,
    /// Integrated road speed
    SpeedIntegration,
}

/// The step between two consecutive readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelStep {
    /// Interval length
    pub dt_ms: u64,
    /// Distance travelled
    pub distance_mi: f64,
    /// Source of `distance_mi`
    pub distance_source: DistanceSource,
    /// Level decrease in percent; negative when the level rose
    pub fuel_drop_pct: f64,
    /// Level decrease in gallons; negative when the level rose
    pub fuel_drop_gal: f64,
    /// Largest drop driving and idling can explain, in percent
    pub expected_max_pct: f64,
    /// Classification
    pub class: StepClass,
}

impl FuelStep {
    /// Drop beyond what driving explains, in percent (never negative)
    pub fn excess_drop_pct(&self) -> f64 {
        (self.fuel_drop_pct - self.expected_max_pct).max(0.0)
    }
}

/// Classifies consecutive-sample steps
#[derive(Debug, Clone)]
pub struct StepAnalyzer {
    config: StepConfig,
}

impl StepAnalyzer {
    /// Create an analyzer
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    /// Analyze the step from `prev` to `cur` for a tank of `tank_gal`
    pub fn analyze(&self, prev: &Reading, cur: &Reading, tank_gal: f64) -> FuelStep {
        let dt_ms = cur.timestamp.saturating_sub(prev.timestamp);
        let dt_h = hours_between(prev.timestamp, cur.timestamp);
        let (distance_mi, distance_source) = self.distance(prev, cur, dt_h);

        let fuel_drop_pct = prev.fuel_level_pct - cur.fuel_level_pct;
        let fuel_drop_gal = fuel_drop_pct / 100.0 * tank_gal;

        let engine_running = !(prev.ignition_off() && cur.ignition_off());
        let idle_gal = if engine_running {
            self.config.idle_allowance_gph * dt_h
        } else {
            0.0
        };
        let expected_gal = distance_mi / self.config.worst_case_mpg + idle_gal;
        let expected_max_pct = expected_gal / tank_gal * 100.0;

        let class = if dt_ms == 0 {
            StepClass::ZeroInterval
        } else if -fuel_drop_pct > self.config.refuel_threshold_pct {
            StepClass::Refuel
        } else if fuel_drop_pct - expected_max_pct > self.config.drop_noise_threshold_pct {
            StepClass::UnexplainedDrop
        } else if dt_ms > self.config.max_gap_ms {
            StepClass::TimeGap
        } else {
            StepClass::Consumption
        };

        FuelStep {
            dt_ms,
            distance_mi,
            distance_source,
            fuel_drop_pct,
            fuel_drop_gal,
            expected_max_pct,
            class,
        }
    }

    fn distance(&self, prev: &Reading, cur: &Reading, dt_h: f64) -> (f64, DistanceSource) {
        if let (Some(a), Some(b)) = (prev.odometer_mi, cur.odometer_mi) {
            let delta = b - a;
            let max_delta = dt_h * MAX_SPEED_MPH * self.config.odometer_slack;
            if delta >= 0.0 && delta <= max_delta {
                return (delta, DistanceSource::Odometer);
            }
            log::debug!(
                "discarding odometer delta {:.2} mi (limit {:.2} mi)",
                delta,
                max_delta
            );
        }

        if let (Some(a), Some(b)) = (prev.gps, cur.gps) {
            return (a.distance_m(&b) / METERS_PER_MILE, DistanceSource::Gps);
        }

        let avg_speed = (prev.speed_mph + cur.speed_mph) / 2.0;
        (avg_speed * dt_h, DistanceSource::SpeedIntegration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::GpsFix;

    fn reading(ts: u64, level: f64, speed: f64) -> Reading {
        Reading {
            timestamp: ts,
            fuel_level_pct: level,
            speed_mph: speed,
            rpm: None,
            odometer_mi: None,
            gps: None,
            ignition_on: Some(true),
            fuel_rate_gph: None,
        }
    }

    fn analyzer() -> StepAnalyzer {
        StepAnalyzer::new(StepConfig::default())
    }

    #[test]
    fn test_prefers_plausible_odometer() {
        let mut a = reading(0, 50.0, 60.0);
        let mut b = reading(60_000, 49.9, 60.0);
        a.odometer_mi = Some(1_000.0);
        b.odometer_mi = Some(1_001.0);

        let step = analyzer().analyze(&a, &b, 150.0);
        assert_eq!(step.distance_source, DistanceSource::Odometer);
        assert!((step.distance_mi - 1.0).abs() < 1e-9);
        assert_eq!(step.class, StepClass::Consumption);
    }

    #[test]
    fn test_rejects_odometer_jump_and_falls_back_to_gps() {
        let mut a = reading(0, 50.0, 60.0);
        let mut b = reading(60_000, 49.9, 60.0);
        a.odometer_mi = Some(1_000.0);
        b.odometer_mi = Some(1_500.0);
        a.gps = Some(GpsFix { lat: 40.0, lon: -90.0 });
        b.gps = Some(GpsFix { lat: 40.0145, lon: -90.0 });

        let step = analyzer().analyze(&a, &b, 150.0);
        assert_eq!(step.distance_source, DistanceSource::Gps);
        assert!((step.distance_mi - 1.0).abs() < 0.02, "{}", step.distance_mi);
    }

    #[test]
    fn test_falls_back_to_speed_integration() {
        let a = reading(0, 50.0, 50.0);
        let b = reading(3_600_000 / 60, 49.9, 70.0);
        let step = analyzer().analyze(&a, &b, 150.0);
        assert_eq!(step.distance_source, DistanceSource::SpeedIntegration);
        assert!((step.distance_mi - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_classifies_refuel() {
        let step = analyzer().analyze(&reading(0, 20.0, 0.0), &reading(60_000, 80.0, 0.0), 150.0);
        assert_eq!(step.class, StepClass::Refuel);
        assert!(step.fuel_drop_gal < 0.0);
    }

    #[test]
    fn test_classifies_unexplained_drop_while_parked() {
        let mut a = reading(0, 80.0, 0.0);
        let mut b = reading(15_000, 75.0, 0.0);
        a.ignition_on = Some(false);
        b.ignition_on = Some(false);

        let step = analyzer().analyze(&a, &b, 150.0);
        assert_eq!(step.expected_max_pct, 0.0);
        assert_eq!(step.class, StepClass::UnexplainedDrop);
        assert!((step.excess_drop_pct() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_normal_highway_burn_is_consumption() {
        // 62 mph for 15 s burns ~0.037 gal, well under the worst case
        let step = analyzer().analyze(&reading(0, 60.0, 62.0), &reading(15_000, 59.97, 62.0), 150.0);
        assert_eq!(step.class, StepClass::Consumption);
    }

    #[test]
    fn test_time_gap_and_zero_interval() {
        let gap = analyzer().analyze(&reading(0, 60.0, 0.0), &reading(45 * 60_000, 60.0, 0.0), 150.0);
        assert_eq!(gap.class, StepClass::TimeGap);

        let same = analyzer().analyze(&reading(5, 60.0, 0.0), &reading(5, 60.0, 0.0), 150.0);
        assert_eq!(same.class, StepClass::ZeroInterval);
    }
}
