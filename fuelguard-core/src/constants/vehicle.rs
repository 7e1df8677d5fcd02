//! Vehicle Constants
//!
//! Physical limits and operating characteristics of Class 8 trucks, plus
//! the thresholds used to split driving into HIGHWAY, CITY and MIXED.

use super::MS_PER_MINUTE;

// ===== SENSOR RANGES =====

/// Maximum plausible road speed.
///
/// Governed trucks top out well below this; anything above is a
/// telematics glitch rather than a real reading.
///
/// Source: FMCSA fleet speed-limiter studies, with headroom
pub const MAX_SPEED_MPH: f64 = 120.0;

/// Maximum plausible engine speed.
///
/// Source: Diesel redline (~2,500 rpm) with generous headroom for
/// gasoline units and bad CAN scaling
pub const MAX_RPM: f64 = 8_000.0;

/// Maximum plausible instantaneous fuel rate.
///
/// Source: J1939 SPN 183 range for heavy-duty engines
pub const MAX_FUEL_RATE_GPH: f64 = 60.0;

/// Fuel level bounds in percent of tank.
pub const FUEL_LEVEL_MIN_PCT: f64 = 0.0;
pub const FUEL_LEVEL_MAX_PCT: f64 = 100.0;

/// Mean Earth radius used by the haversine distance.
///
/// Source: IUGG mean radius
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per statute mile.
pub const METERS_PER_MILE: f64 = 1_609.344;

// ===== TANK AND CONSUMPTION =====

/// Default usable tank capacity when no per-vehicle override is configured.
///
/// Source: Typical dual-saddle tank configuration on line-haul tractors
pub const DEFAULT_TANK_CAPACITY_GAL: f64 = 150.0;

/// Fuel burned per hour at idle.
///
/// Source: DOE idle reduction data for heavy-duty diesel (0.6-1.0 gph)
pub const IDLE_FUEL_RATE_GPH: f64 = 0.8;

/// Odometer deltas larger than `dt * MAX_SPEED_MPH * slack` are rejected.
pub const ODOMETER_SLACK_FACTOR: f64 = 1.25;

// ===== PLAUSIBLE ECONOMY =====

/// Lowest fuel economy a loaded truck can plausibly achieve.
///
/// Source: Field data, heavy-haul in mountain terrain
pub const MPG_PLAUSIBLE_MIN: f64 = 3.5;

/// Highest fuel economy a truck can plausibly achieve.
///
/// Source: Field data, empty aerodynamic tractor on flat highway
pub const MPG_PLAUSIBLE_MAX: f64 = 12.0;

// ===== STEP CLASSIFICATION =====

/// A fuel rise larger than this between two samples is a refuel.
pub const REFUEL_THRESHOLD_PCT: f64 = 5.0;

/// Level drops exceeding expected consumption by more than this are
/// unexplained. Sits above typical slosh and quantisation noise.
pub const DROP_NOISE_THRESHOLD_PCT: f64 = 1.5;

/// Gaps longer than this break accumulation windows.
pub const MAX_SAMPLE_GAP_MS: u64 = 30 * MS_PER_MINUTE;

// ===== DRIVING MODE =====

/// Speed below which a sample counts as a stop.
pub const STOP_SPEED_MPH: f64 = 3.0;

/// Average speed at or above which a window may be HIGHWAY.
pub const HIGHWAY_SPEED_MPH: f64 = 50.0;

/// Average speed at or below which a window may be CITY.
pub const CITY_SPEED_MPH: f64 = 25.0;

/// HIGHWAY tolerates at most this share of stopped samples.
///
/// One stopped sample in a full window (1/20) stays under the limit.
pub const HIGHWAY_MAX_STOP_FRACTION: f64 = 0.10;

/// CITY requires at least this share of stopped samples.
pub const CITY_MIN_STOP_FRACTION: f64 = 0.15;

/// Number of recent samples the classifier looks at.
pub const CLASSIFIER_WINDOW_SAMPLES: usize = 20;

/// The classifier holds the current mode until it has this many samples.
pub const CLASSIFIER_MIN_SAMPLES: usize = 4;

/// Consecutive agreeing evaluations required before the mode switches.
pub const HYSTERESIS_EVALUATIONS: u32 = 3;

// ===== MPG WINDOWS =====

/// HIGHWAY windows close after this much distance or fuel.
pub const HIGHWAY_WINDOW_MI: f64 = 100.0;
pub const HIGHWAY_WINDOW_GAL: f64 = 15.0;

/// MIXED windows close after this much distance or fuel.
pub const MIXED_WINDOW_MI: f64 = 50.0;
pub const MIXED_WINDOW_GAL: f64 = 10.0;

/// CITY windows close after this much distance or fuel.
pub const CITY_WINDOW_MI: f64 = 25.0;
pub const CITY_WINDOW_GAL: f64 = 5.0;

/// Windows with less fuel than this produce no estimate.
pub const ZERO_FUEL_EPSILON_GAL: f64 = 0.05;

/// Sample count at which the sample-size term of MPG confidence saturates.
pub const FULL_CONFIDENCE_SAMPLES: u32 = 20;

/// Steps shorter than this are too short to contribute a per-step rate.
pub const MIN_RATE_DISTANCE_MI: f64 = 0.01;

// ===== BUFFERS =====

/// Per-vehicle history depth. Must cover the classifier window.
pub const HISTORY_CAPACITY: usize = 64;
