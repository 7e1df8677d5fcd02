//! Driving-Mode Classification
//!
//! ## Overview
//!
//! Fuel economy depends heavily on how a truck is driven, so the MPG
//! estimator sizes its accumulation window by driving mode. The classifier
//! looks at the most recent samples and proposes a mode:
//!
//! ```text
//! HIGHWAY  avg speed ≥ 50 mph  and  stop fraction ≤ 0.10
//! CITY     avg speed ≤ 25 mph  and  stop fraction ≥ 0.15
//! MIXED    anything else
//! ```
//!
//! ## Robustness
//!
//! Two mechanisms keep a single bad sample from flipping the mode:
//!
//! 1. The average speed is trimmed: once the window holds at least five
//!    samples, the single fastest and slowest samples are dropped.
//! 2. Hysteresis: a proposed mode must win several consecutive evaluations
//!    before it replaces the current one. A proposal equal to the current
//!    mode clears any pending switch.
//!
//! Until the window holds `min_samples` readings the classifier keeps the
//! current mode, which starts as MIXED.

use serde::{Deserialize, Serialize};

use crate::buffer::CircularBuffer;
use crate::config::ClassifierConfig;
use crate::sample::Reading;

/// Samples needed before the extremes are trimmed from the speed average
const TRIM_MIN_SAMPLES: usize = 5;

/// Driving regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriveMode {
    /// Sustained high speed with few stops
    Highway,
    /// Low speed with frequent stops
    City,
    /// Everything in between
    #[default]
    Mixed,
}

/// Summary of the classifier window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrivingStats {
    /// Trimmed mean speed
    pub avg_speed_mph: f64,
    /// Share of samples below the stop speed
    pub stop_fraction: f64,
    /// Samples in the window
    pub samples: usize,
}

/// Per-vehicle hysteresis state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeTracker {
    current: DriveMode,
    pending: Option<DriveMode>,
    pending_count: u32,
}

impl ModeTracker {
    /// Start in a given mode, e.g. one restored from a baseline snapshot
    pub fn starting_in(mode: DriveMode) -> Self {
        Self {
            current: mode,
            pending: None,
            pending_count: 0,
        }
    }

    /// Currently published mode
    pub fn current(&self) -> DriveMode {
        self.current
    }

    /// Candidate waiting for confirmation, with its agreement count
    pub fn pending(&self) -> Option<(DriveMode, u32)> {
        self.pending.map(|mode| (mode, self.pending_count))
    }
}

/// Result of one classifier evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeDecision {
    /// Published mode after hysteresis
    pub mode: DriveMode,
    /// Raw proposal for this window, if the window was large enough
    pub candidate: Option<DriveMode>,
    /// Whether this evaluation switched the published mode
    pub changed: bool,
}

/// Window-based driving-mode classifier with hysteresis
#[derive(Debug, Clone)]
pub struct ModeClassifier {
    config: ClassifierConfig,
}

impl ModeClassifier {
    /// Create a classifier
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Window statistics over the most recent readings
    ///
    /// Returns `None` while fewer than `min_samples` readings are available.
    pub fn stats<const N: usize>(&self, history: &CircularBuffer<Reading, N>) -> Option<DrivingStats> {
        let window = history.recent(self.config.window_samples);
        let samples = window.len();
        if samples < self.config.min_samples {
            return None;
        }

        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut stops = 0usize;
        for reading in window {
            let speed = reading.speed_mph;
            sum += speed;
            min = min.min(speed);
            max = max.max(speed);
            if reading.is_stopped(self.config.stop_speed_mph) {
                stops += 1;
            }
        }

        let avg_speed_mph = if samples >= TRIM_MIN_SAMPLES {
            (sum - min - max) / (samples - 2) as f64
        } else {
            sum / samples as f64
        };

        Some(DrivingStats {
            avg_speed_mph,
            stop_fraction: stops as f64 / samples as f64,
            samples,
        })
    }

    /// Raw mode for a set of window statistics, without hysteresis
    pub fn classify(&self, stats: &DrivingStats) -> DriveMode {
        let c = &self.config;
        if stats.avg_speed_mph >= c.highway_speed_mph
            && stats.stop_fraction <= c.highway_max_stop_fraction
        {
            DriveMode::Highway
        } else if stats.avg_speed_mph <= c.city_speed_mph
            && stats.stop_fraction >= c.city_min_stop_fraction
        {
            DriveMode::City
        } else {
            DriveMode::Mixed
        }
    }

    /// Evaluate the window and advance the hysteresis state
    pub fn evaluate<const N: usize>(
        &self,
        history: &CircularBuffer<Reading, N>,
        tracker: &mut ModeTracker,
    ) -> ModeDecision {
        let candidate = self.stats(history).map(|stats| self.classify(&stats));
        let changed = match candidate {
            Some(mode) => self.apply(tracker, mode),
            None => false,
        };

        ModeDecision {
            mode: tracker.current,
            candidate,
            changed,
        }
    }

    fn apply(&self, tracker: &mut ModeTracker, candidate: DriveMode) -> bool {
        if candidate == tracker.current {
            tracker.pending = None;
            tracker.pending_count = 0;
            return false;
        }

        if tracker.pending == Some(candidate) {
            tracker.pending_count += 1;
        } else {
            tracker.pending = Some(candidate);
            tracker.pending_count = 1;
        }

        if tracker.pending_count >= self.config.hysteresis_evaluations {
            tracker.current = candidate;
            tracker.pending = None;
            tracker.pending_count = 0;
            return true;
        }
        false
    }
}
