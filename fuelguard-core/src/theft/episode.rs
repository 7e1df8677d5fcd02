//! Drop episodes and the consumption baseline
//!
//! An episode opens on the first unexplained drop and accumulates evidence
//! until the level settles, recovers or the observation window runs out.
//! The baseline is a running mean and variance of the vehicle's normal
//! drain rate (Welford), learned only outside episodes.

use serde::{Deserialize, Serialize};

use crate::fusion::FuelFilterOutput;
use crate::sample::Reading;
use crate::step::FuelStep;
use crate::time::{minutes_between, Timestamp};

use super::factors::ignition_score;

/// Running statistics of normal drain rate, in %/min
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionBaseline {
    count: u64,
    mean: f64,
    m2: f64,
}

impl ConsumptionBaseline {
    /// Add one observed drain rate
    pub fn observe(&mut self, rate_pct_per_min: f64) {
        if !rate_pct_per_min.is_finite() {
            return;
        }
        self.count += 1;
        let delta = rate_pct_per_min - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (rate_pct_per_min - self.mean);
    }

    /// Observations so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean drain rate
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation, once two observations exist
    pub fn std_dev(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        Some((self.m2 / (self.count - 1) as f64).max(0.0).sqrt())
    }

    /// z-score of a rate, once `min_observations` exist
    pub fn z_score(&self, rate_pct_per_min: f64, min_observations: u64, std_floor: f64) -> Option<f64> {
        if self.count < min_observations.max(2) {
            return None;
        }
        let std = self.std_dev()?.max(std_floor);
        Some((rate_pct_per_min - self.mean) / std)
    }
}

/// Evidence gathered while a drop is under observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropEpisode {
    /// Last reading before the drop
    pub start: Reading,
    /// Most recent reading in the episode
    pub latest: Reading,
    /// Lowest level seen
    pub min_level_pct: f64,
    /// When the lowest level was seen
    pub min_level_at: Timestamp,
    /// Consumption driving and idling explain over the episode, percent
    pub expected_pct: f64,
    /// Consecutive samples without further drop
    pub settled_samples: u32,
    /// Sum of per-sample ignition scores
    pub ignition_sum: f64,
    /// Samples with an ignition channel
    pub ignition_samples: u32,
    /// Largest GPS displacement from the start position
    pub max_displacement_m: Option<f64>,
    /// Largest |normalised residual| of the fuel filter
    pub max_residual_sigma: f64,
    /// Whether the filter flagged a sensor bias during the episode
    pub bias_flagged: bool,
    /// Samples in the episode
    pub samples: u32,
}

impl DropEpisode {
    /// Open an episode at the step from `start` to `cur`
    pub fn open(
        start: Reading,
        cur: &Reading,
        step: &FuelStep,
        filter: &FuelFilterOutput,
        moving_speed_mph: f64,
    ) -> Self {
        let mut episode = Self {
            start,
            latest: start,
            min_level_pct: start.fuel_level_pct,
            min_level_at: start.timestamp,
            expected_pct: 0.0,
            settled_samples: 0,
            ignition_sum: 0.0,
            ignition_samples: 0,
            max_displacement_m: None,
            max_residual_sigma: 0.0,
            bias_flagged: false,
            samples: 0,
        };
        episode.extend(cur, step, filter, 0.0, moving_speed_mph);
        episode
    }

    /// Add the next reading
    pub fn extend(
        &mut self,
        cur: &Reading,
        step: &FuelStep,
        filter: &FuelFilterOutput,
        settle_noise_pct: f64,
        moving_speed_mph: f64,
    ) {
        self.samples += 1;
        self.latest = *cur;
        self.expected_pct += step.expected_max_pct.max(0.0);

        if cur.fuel_level_pct < self.min_level_pct - settle_noise_pct {
            self.settled_samples = 0;
        } else {
            self.settled_samples += 1;
        }
        if cur.fuel_level_pct < self.min_level_pct {
            self.min_level_pct = cur.fuel_level_pct;
            self.min_level_at = cur.timestamp;
        }

        if let Some(score) = ignition_score(cur, moving_speed_mph) {
            self.ignition_sum += score;
            self.ignition_samples += 1;
        }

        if let (Some(a), Some(b)) = (self.start.gps, cur.gps) {
            let d = a.distance_m(&b);
            self.max_displacement_m = Some(self.max_displacement_m.map_or(d, |m| m.max(d)));
        }

        self.max_residual_sigma = self.max_residual_sigma.max(filter.normalized_residual.abs());
        self.bias_flagged |= filter.sensor_bias_detected;
    }

    /// Level lost from the start to the lowest point
    pub fn gross_drop_pct(&self) -> f64 {
        (self.start.fuel_level_pct - self.min_level_pct).max(0.0)
    }

    /// Gross drop minus what driving explains
    pub fn net_drop_pct(&self) -> f64 {
        (self.gross_drop_pct() - self.expected_pct).max(0.0)
    }

    /// Time from the start to the lowest point
    pub fn drop_duration_ms(&self) -> u64 {
        self.min_level_at.saturating_sub(self.start.timestamp)
    }

    /// Time from the start to the latest reading
    pub fn elapsed_ms(&self) -> u64 {
        self.latest.timestamp.saturating_sub(self.start.timestamp)
    }

    /// Net drain rate over the drop, %/min
    pub fn drain_rate_pct_per_min(&self) -> f64 {
        let minutes = minutes_between(self.start.timestamp, self.min_level_at);
        if minutes > 0.0 {
            self.net_drop_pct() / minutes
        } else {
            0.0
        }
    }

    /// Mean ignition score, if any reading had an ignition channel
    pub fn ignition_mean(&self) -> Option<f64> {
        (self.ignition_samples > 0).then(|| self.ignition_sum / self.ignition_samples as f64)
    }

    /// Whether the level has climbed back by at least `fraction` of the drop
    pub fn recovered(&self, fraction: f64) -> bool {
        let gross = self.gross_drop_pct();
        gross > 0.0 && self.latest.fuel_level_pct - self.min_level_pct >= fraction * gross
    }
}
