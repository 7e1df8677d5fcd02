//! Multi-Factor Fuel Theft Scoring
//!
//! ## Overview
//!
//! A single large drop proves little: float senders slosh, tanks cross-feed
//! and telematics units glitch. The scorer therefore treats an unexplained
//! drop as the start of an *episode*, keeps observing until the level
//! settles, and only then combines seven independent pieces of evidence
//! into a verdict.
//!
//! ## Episode State Machine
//!
//! ```text
//!            unexplained drop
//!   NORMAL ───────────────────→ DROP_CANDIDATE ──┐ (interim scores)
//!     ↑                              │  ↑________│
//!     │   settled / window elapsed   │
//!     │   / recovered                ↓
//!     └──────────────  THEFT_SUSPECTED | FALSE_ALARM_RESOLVED | IMPLAUSIBLE
//! ```
//!
//! ## Factors
//!
//! | Factor              | Score                                           | Weight |
//! |---------------------|-------------------------------------------------|--------|
//! | drop magnitude      | ramp(net drop, 2%, 20%)                         | 0.20   |
//! | drop rate           | net rate / 5 %/min                              | 0.10   |
//! | ignition            | off 1.0, idling 0.5, driving 0.0                | 0.20   |
//! | GPS stationarity    | 1 - displacement / 200 m                        | 0.20   |
//! | time of day         | night 1.0, twilight 0.5, day 0.2                | 0.05   |
//! | baseline deviation  | ramp(z, 2, 6) over the vehicle's own drain rate | 0.10   |
//! | Kalman residual     | ramp(σ, 3, 10), halved under a sensor bias      | 0.15   |
//!
//! Factors without input are left out and the remaining weights are
//! renormalised. Confidence is the share of computable factors.
//!
//! ## Verdict
//!
//! 1. The level climbed back by half the drop: **IMPLAUSIBLE** (glitch)
//! 2. The truck was running and moving through the drop: **IMPLAUSIBLE**
//! 3. Composite above 0.7 with at least three factors: **THEFT_SUSPECTED**
//! 4. Otherwise: **FALSE_ALARM_RESOLVED**

use serde::{Deserialize, Serialize};

use crate::config::TheftConfig;
use crate::confidence::Confidence;
use crate::fusion::FuelFilterOutput;
use crate::sample::Reading;
use crate::step::{FuelStep, StepClass};
use crate::time::{local_hour, minutes_between, Timestamp};

pub mod episode;
pub mod factors;

pub use episode::{ConsumptionBaseline, DropEpisode};
pub use factors::{
    ramp, time_of_day_risk, CompositeScore, FactorBreakdown, FactorSet, FactorValue, TheftFactor,
};

/// Outcome class of a theft score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TheftClassification {
    /// No drop under observation
    Normal,
    /// Interim score of a drop still under observation
    DropCandidate,
    /// Settled drop that looks like theft
    TheftSuspected,
    /// Settled drop that does not look like theft
    FalseAlarmResolved,
    /// Drop that cannot be real fuel loss
    Implausible,
}

impl TheftClassification {
    /// Whether this class ends an episode
    pub fn is_verdict(&self) -> bool {
        matches!(
            self,
            Self::TheftSuspected | Self::FalseAlarmResolved | Self::Implausible
        )
    }
}

/// Theft score for one sample of a drop episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheftScore {
    /// Weighted composite in [0, 1]
    pub composite: f64,
    /// Computable factors with their values and weights
    pub factor_breakdown: FactorBreakdown,
    /// Share of factors that were computable
    pub confidence: Confidence,
    /// Interim or final class
    pub classification: TheftClassification,
    /// Whether the drop was judged implausible
    pub implausible: bool,
    /// Net drop beyond expected consumption, percent
    pub drop_pct: f64,
    /// Time from the start of the drop to its lowest point
    pub drop_duration_ms: u64,
    /// Time of the sample that produced this score
    pub timestamp: Timestamp,
}

/// Coarse phase of a vehicle's theft tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TheftPhase {
    /// Nothing under observation
    Normal,
    /// A drop is under observation
    DropCandidate,
}

/// Per-vehicle theft tracking state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TheftTracker {
    episode: Option<DropEpisode>,
    baseline: ConsumptionBaseline,
}

impl TheftTracker {
    /// Start with a learned consumption baseline
    pub fn with_baseline(baseline: ConsumptionBaseline) -> Self {
        Self {
            episode: None,
            baseline,
        }
    }

    /// Current phase
    pub fn phase(&self) -> TheftPhase {
        match self.episode {
            Some(_) => TheftPhase::DropCandidate,
            None => TheftPhase::Normal,
        }
    }

    /// Episode under observation
    pub fn episode(&self) -> Option<&DropEpisode> {
        self.episode.as_ref()
    }

    /// Learned consumption baseline
    pub fn baseline(&self) -> &ConsumptionBaseline {
        &self.baseline
    }

    /// Replace the consumption baseline, e.g. after a late baseline load
    pub fn adopt_baseline(&mut self, baseline: ConsumptionBaseline) {
        self.baseline = baseline;
    }
}

/// Episode-based multi-factor theft scorer
#[derive(Debug, Clone)]
pub struct MultiFactorTheftScorer {
    config: TheftConfig,
    utc_offset_minutes: i32,
}

impl MultiFactorTheftScorer {
    /// Create a scorer; the offset places drops in fleet local time
    pub fn new(config: TheftConfig, utc_offset_minutes: i32) -> Self {
        Self {
            config,
            utc_offset_minutes,
        }
    }

    /// Feed the step from `prev` to `cur`
    ///
    /// Returns a score while a drop is under observation (interim) and on the
    /// sample that resolves it (verdict); `None` otherwise.
    pub fn observe(
        &self,
        tracker: &mut TheftTracker,
        prev: &Reading,
        cur: &Reading,
        step: &FuelStep,
        filter: &FuelFilterOutput,
    ) -> Option<TheftScore> {
        let episode = match tracker.episode.as_mut() {
            Some(episode) => {
                episode.extend(
                    cur,
                    step,
                    filter,
                    self.config.settle_noise_pct,
                    self.config.moving_speed_mph,
                );
                *episode
            }
            None => {
                if step.class != StepClass::UnexplainedDrop {
                    self.learn(tracker, step, prev, cur);
                    return None;
                }
                let episode = DropEpisode::open(*prev, cur, step, filter, self.config.moving_speed_mph);
                log::debug!(
                    "drop candidate opened: {:.1}% -> {:.1}%",
                    prev.fuel_level_pct,
                    cur.fuel_level_pct
                );
                tracker.episode = Some(episode);
                episode
            }
        };

        let recovered = episode.recovered(self.config.recovery_fraction);
        let resolved = recovered
            || episode.settled_samples >= self.config.settle_samples
            || episode.elapsed_ms() >= self.config.observation_window_ms;

        let set = self.factors(&episode, &tracker.baseline);
        let combined = set.combine(&self.config.weights);
        let classification = if resolved {
            tracker.episode = None;
            self.verdict(&combined, &set, recovered)
        } else {
            TheftClassification::DropCandidate
        };

        let score = TheftScore {
            composite: combined.composite,
            factor_breakdown: combined.breakdown,
            confidence: combined.confidence,
            classification,
            implausible: classification == TheftClassification::Implausible,
            drop_pct: episode.net_drop_pct(),
            drop_duration_ms: episode.drop_duration_ms(),
            timestamp: cur.timestamp,
        };

        match classification {
            TheftClassification::TheftSuspected => log::warn!(
                "fuel theft suspected: {:.1}% over {} s, composite {:.2}, confidence {:.2}",
                score.drop_pct,
                score.drop_duration_ms / 1_000,
                score.composite,
                score.confidence.as_float()
            ),
            TheftClassification::Implausible => log::info!(
                "implausible fuel drop of {:.1}% dismissed{}",
                episode.gross_drop_pct(),
                if recovered { " (level recovered)" } else { "" }
            ),
            TheftClassification::FalseAlarmResolved => log::debug!(
                "drop of {:.1}% resolved as false alarm (composite {:.2})",
                score.drop_pct,
                score.composite
            ),
            _ => {}
        }

        Some(score)
    }

    /// Evaluate every factor for an episode
    pub fn factors(&self, episode: &DropEpisode, baseline: &ConsumptionBaseline) -> FactorSet {
        let c = &self.config;
        let mut set = FactorSet::new();

        set.set(
            TheftFactor::DropMagnitude,
            ramp(episode.net_drop_pct(), c.min_drop_pct, c.full_scale_drop_pct),
        );

        let rate = episode.drain_rate_pct_per_min();
        if episode.drop_duration_ms() > 0 {
            set.set(TheftFactor::DropRate, rate / c.full_scale_rate_pct_per_min);
        }

        set.set_opt(TheftFactor::Ignition, episode.ignition_mean());

        set.set_opt(
            TheftFactor::GpsStationarity,
            episode
                .max_displacement_m
                .map(|d| 1.0 - ramp(d, 0.0, c.stationary_displacement_m)),
        );

        set.set_opt(
            TheftFactor::TimeOfDay,
            local_hour(episode.start.timestamp, self.utc_offset_minutes).map(time_of_day_risk),
        );

        set.set_opt(
            TheftFactor::BaselineDeviation,
            baseline
                .z_score(rate, c.min_baseline_observations, c.baseline_std_floor)
                .map(|z| ramp(z, c.baseline_z_floor, c.baseline_z_ceiling)),
        );

        let mut kalman = ramp(
            episode.max_residual_sigma,
            c.residual_floor_sigma,
            c.residual_ceiling_sigma,
        );
        if episode.bias_flagged {
            kalman *= c.bias_residual_discount;
        }
        set.set(TheftFactor::KalmanResidual, kalman);

        set
    }

    fn verdict(&self, combined: &CompositeScore, set: &FactorSet, recovered: bool) -> TheftClassification {
        let c = &self.config;
        if recovered {
            return TheftClassification::Implausible;
        }

        let running_and_moving = matches!(
            (set.get(TheftFactor::Ignition), set.get(TheftFactor::GpsStationarity)),
            (Some(ignition), gps) if ignition <= c.implausible_motion_ceiling
                && gps.map_or(true, |g| g <= c.implausible_motion_ceiling)
        );
        if running_and_moving {
            return TheftClassification::Implausible;
        }

        if combined.composite > c.suspicion_threshold
            && combined.confidence.as_float() + 1e-9 >= c.min_confidence
        {
            TheftClassification::TheftSuspected
        } else {
            TheftClassification::FalseAlarmResolved
        }
    }

    fn learn(&self, tracker: &mut TheftTracker, step: &FuelStep, prev: &Reading, cur: &Reading) {
        if step.class != StepClass::Consumption {
            return;
        }
        let minutes = minutes_between(prev.timestamp, cur.timestamp);
        if minutes > 0.0 {
            tracker.baseline.observe(step.fuel_drop_pct / minutes);
        }
    }
}
