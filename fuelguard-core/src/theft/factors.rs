//! Theft scoring factors
//!
//! Each factor maps one piece of evidence onto `[0, 1]`, where 1 means "this
//! looks like theft". A factor whose input is missing (no GPS fix, no
//! ignition channel, too little history) is *not computable* and is left out
//! of the composite entirely rather than counted as zero.

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use crate::config::FactorWeights;
use crate::confidence::Confidence;
use crate::constants::theft::{
    DAY_RISK, FACTOR_COUNT, IGNITION_IDLE_SCORE, IGNITION_OFF_SCORE, NIGHT_RISK, TWILIGHT_RISK,
};
use crate::sample::Reading;

/// Evidence considered by the theft scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TheftFactor {
    /// Net drop size beyond expected consumption
    DropMagnitude,
    /// How fast the level fell
    DropRate,
    /// Engine off (or idling) while the level fell
    Ignition,
    /// Truck stayed put while the level fell
    GpsStationarity,
    /// Local hour of the drop
    TimeOfDay,
    /// Drain rate against the vehicle's own consumption history
    BaselineDeviation,
    /// How surprised the fuel filter was
    KalmanResidual,
}

impl TheftFactor {
    /// All factors in breakdown order
    pub const ALL: [TheftFactor; FACTOR_COUNT] = [
        TheftFactor::DropMagnitude,
        TheftFactor::DropRate,
        TheftFactor::Ignition,
        TheftFactor::GpsStationarity,
        TheftFactor::TimeOfDay,
        TheftFactor::BaselineDeviation,
        TheftFactor::KalmanResidual,
    ];

    /// Stable snake_case name
    pub const fn name(&self) -> &'static str {
        match self {
            TheftFactor::DropMagnitude => "drop_magnitude",
            TheftFactor::DropRate => "drop_rate",
            TheftFactor::Ignition => "ignition",
            TheftFactor::GpsStationarity => "gps_stationarity",
            TheftFactor::TimeOfDay => "time_of_day",
            TheftFactor::BaselineDeviation => "baseline_deviation",
            TheftFactor::KalmanResidual => "kalman_residual",
        }
    }

    const fn index(&self) -> usize {
        match self {
            TheftFactor::DropMagnitude => 0,
            TheftFactor::DropRate => 1,
            TheftFactor::Ignition => 2,
            TheftFactor::GpsStationarity => 3,
            TheftFactor::TimeOfDay => 4,
            TheftFactor::BaselineDeviation => 5,
            TheftFactor::KalmanResidual => 6,
        }
    }
}

/// One computable factor in a score breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorValue {
    /// Which factor
    pub factor: TheftFactor,
    /// Normalised value in [0, 1]
    pub value: f64,
    /// Configured weight
    pub weight: f64,
}

/// Computable factors of one score, at most one per factor
pub type FactorBreakdown = HVec<FactorValue, FACTOR_COUNT>;

/// Weighted combination of the computable factors
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeScore {
    /// Weighted mean over computable factors
    pub composite: f64,
    /// Share of factors that were computable
    pub confidence: Confidence,
    /// The computable factors
    pub breakdown: FactorBreakdown,
}

/// Factor values for one drop episode
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FactorSet {
    values: [Option<f64>; FACTOR_COUNT],
}

impl FactorSet {
    /// All factors not computable
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a factor, clamping to [0, 1]; NaN leaves it not computable
    pub fn set(&mut self, factor: TheftFactor, value: f64) {
        self.values[factor.index()] = if value.is_nan() {
            None
        } else {
            Some(value.clamp(0.0, 1.0))
        };
    }

    /// Set a factor if a value is available
    pub fn set_opt(&mut self, factor: TheftFactor, value: Option<f64>) {
        match value {
            Some(v) => self.set(factor, v),
            None => self.values[factor.index()] = None,
        }
    }

    /// A factor's value, if computable
    pub fn get(&self, factor: TheftFactor) -> Option<f64> {
        self.values[factor.index()]
    }

    /// Number of computable factors
    pub fn computable(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Weighted mean over the computable factors
    ///
    /// Weights of missing factors are redistributed proportionally, so the
    /// composite stays in [0, 1] and stays comparable between trucks with
    /// and without GPS.
    pub fn combine(&self, weights: &FactorWeights) -> CompositeScore {
        let mut breakdown = FactorBreakdown::new();
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for factor in TheftFactor::ALL {
            if let Some(value) = self.get(factor) {
                let weight = weights.get(factor);
                weighted += weight * value;
                total_weight += weight;
                // Capacity equals the factor count
                let _ = breakdown.push(FactorValue { factor, value, weight });
            }
        }

        let composite = if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        CompositeScore {
            composite,
            confidence: Confidence::from_coverage(self.computable(), FACTOR_COUNT),
            breakdown,
        }
    }
}

/// Linear ramp: 0 at or below `floor`, 1 at or above `ceiling`
pub fn ramp(value: f64, floor: f64, ceiling: f64) -> f64 {
    if ceiling <= floor {
        return if value >= ceiling { 1.0 } else { 0.0 };
    }
    ((value - floor) / (ceiling - floor)).clamp(0.0, 1.0)
}

/// Risk associated with the local hour of a drop
pub fn time_of_day_risk(hour: u32) -> f64 {
    match hour {
        22..=23 | 0..=4 => NIGHT_RISK,
        5..=6 | 19..=21 => TWILIGHT_RISK,
        _ => DAY_RISK,
    }
}

/// Ignition evidence from one reading; `None` without an ignition channel
pub fn ignition_score(reading: &Reading, moving_speed_mph: f64) -> Option<f64> {
    match reading.ignition_on? {
        false => Some(IGNITION_OFF_SCORE),
        true if reading.speed_mph < moving_speed_mph => Some(IGNITION_IDLE_SCORE),
        true => Some(0.0),
    }
}
