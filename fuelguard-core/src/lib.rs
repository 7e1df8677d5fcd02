//! Fuel telemetry analytics for fleet vehicles
//!
//! Turns noisy per-vehicle telemetry (fuel level, speed, RPM, odometer,
//! GPS, ignition, ECU fuel rate) into three outputs:
//!
//! - a drive-mode aware MPG estimate with confidence
//! - a filtered fuel level with sensor bias tracking
//! - a multi-factor theft score for unexplained drops
//!
//! Algorithms here are stateless processors holding configuration. Every
//! per-vehicle quantity lives in a small state struct owned by the caller,
//! so one processor can serve a whole fleet from many threads.
//!
//! ```no_run
//! use fuelguard_core::{
//!     AdaptiveMpgEstimator, EngineConfig, MpgWindow, StepAnalyzer, TelemetrySample, DriveMode,
//! };
//!
//! let config = EngineConfig::default();
//! let steps = StepAnalyzer::new(config.step.clone());
//! let mpg = AdaptiveMpgEstimator::new(config.mpg.clone());
//! let mut window = MpgWindow::default();
//!
//! let a = TelemetrySample::new("truck-7", 0, 80.0, 62.0).reading();
//! let b = TelemetrySample::new("truck-7", 60_000, 79.9, 62.0).reading();
//! let step = steps.analyze(&a, &b, 150.0);
//! let outcome = mpg.observe(&mut window, &step, DriveMode::Highway, b.timestamp);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod confidence;
pub mod config;
pub mod constants;
pub mod errors;
pub mod fusion;
pub mod mode;
pub mod mpg;
pub mod sample;
pub mod step;
pub mod theft;
pub mod time;

// Public API
pub use buffer::CircularBuffer;
pub use confidence::Confidence;
pub use config::{AlgorithmKind, EngineConfig};
pub use errors::{ConfigError, SampleError, SampleResult};
pub use fusion::{
    ExtendedKalmanFuelFilter, FilterCheckpoint, FilterInput, FilterState, FuelFilterOutput,
    FuelLevelFilter, ScalarKalmanFilter, ScalarState,
};
pub use mode::{DriveMode, ModeClassifier, ModeTracker};
pub use mpg::{AdaptiveMpgEstimator, MpgEstimate, MpgOutcome, MpgWindow, NoEstimateReason};
pub use sample::{GpsFix, Reading, TelemetrySample};
pub use step::{FuelStep, StepAnalyzer, StepClass};
pub use theft::{
    ConsumptionBaseline, MultiFactorTheftScorer, TheftClassification, TheftFactor, TheftScore,
    TheftTracker,
};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
