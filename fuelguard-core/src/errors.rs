//! Error Types for Telemetry Ingestion and Configuration
//!
//! ## Design Philosophy
//!
//! Errors are split by who can act on them:
//!
//! 1. **Sample errors** are the caller's problem. A rejected sample leaves
//!    every piece of vehicle state untouched, so the caller may fix the
//!    record and resubmit, or drop it.
//!
//! 2. **Configuration errors** surface once, at construction. An engine that
//!    was built successfully never fails because of its configuration.
//!
//! Numerical trouble inside the filter is *not* an error at this level: the
//! filter recovers by resetting and reports the reset on its output (see
//! [`crate::fusion::FusionError`] for the internal taxonomy).
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use fuelguard_core::{SampleError, TelemetrySample};
//!
//! let sample = TelemetrySample::new("truck-7", 1_000, 140.0, 55.0);
//! match sample.validate() {
//!     Ok(()) => {}
//!     Err(SampleError::OutOfRange { field, .. }) => {
//!         // Sensor or transport fault; quarantine the record
//!         assert_eq!(field, "fuel_level_pct");
//!     }
//!     Err(_) => {}
//! }
//! ```

use thiserror::Error;

use crate::time::Timestamp;

/// Result type for sample ingestion
pub type SampleResult<T> = Result<T, SampleError>;

/// Reasons a telemetry sample is rejected before any state changes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    /// The sample carries no vehicle identifier
    #[error("sample has an empty vehicle id")]
    EmptyVehicleId,

    /// A numeric field is NaN or infinite
    #[error("field `{field}` is not a finite number")]
    NonFinite {
        /// Name of the offending field
        field: &'static str,
    },

    /// A numeric field lies outside its physical range
    #[error("field `{field}` value {value} outside range [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field
        field: &'static str,
        /// The value that failed validation
        value: f64,
        /// Minimum acceptable value
        min: f64,
        /// Maximum acceptable value
        max: f64,
    },

    /// The sample is older than one already applied for the same vehicle
    #[error("sample at {got} ms is older than the last applied sample at {last} ms")]
    OutOfOrder {
        /// Timestamp of the last applied sample
        last: Timestamp,
        /// Timestamp of the rejected sample
        got: Timestamp,
    },

    /// The sample was routed to state belonging to another vehicle
    #[error("sample for `{got}` applied to state of `{expected}`")]
    VehicleMismatch {
        /// Vehicle the state belongs to
        expected: String,
        /// Vehicle named by the sample
        got: String,
    },
}

/// Configuration problems detected at construction time
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Theft factor weights must sum to one
    #[error("theft factor weights sum to {sum}, expected 1.0")]
    WeightsDoNotSumToOne {
        /// Actual weight sum
        sum: f64,
    },

    /// A theft factor weight is negative
    #[error("theft factor `{factor}` has a negative weight")]
    NegativeWeight {
        /// Factor name
        factor: &'static str,
    },

    /// A parameter is non-finite, non-positive or otherwise unusable
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the parameter
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },

    /// The configuration document could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }
}
