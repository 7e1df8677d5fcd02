//! Telemetry samples and their validation
//!
//! A [`TelemetrySample`] is one record as it arrives from the telematics
//! gateway. After validation the engine strips the vehicle id and keeps a
//! compact [`Reading`] in per-vehicle history.
//!
//! Optional channels (rpm, odometer, GPS, ignition, fuel rate) are genuinely
//! optional: older units report only level and speed, and every algorithm
//! degrades gracefully when a channel is missing. A GPS fix needs both
//! coordinates; a lone latitude or longitude is treated as no fix.

use serde::{Deserialize, Serialize};

use crate::constants::vehicle::{
    EARTH_RADIUS_M, FUEL_LEVEL_MAX_PCT, FUEL_LEVEL_MIN_PCT, MAX_FUEL_RATE_GPH, MAX_RPM,
    MAX_SPEED_MPH,
};
use crate::errors::{SampleError, SampleResult};
use crate::time::Timestamp;

/// One telemetry record for one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Fleet-unique vehicle identifier
    pub vehicle_id: String,
    /// Sample time, ms since the Unix epoch
    pub timestamp: Timestamp,
    /// Fuel level in percent of tank
    pub fuel_level_pct: f64,
    /// Road speed
    pub speed_mph: f64,
    /// Engine speed
    #[serde(default)]
    pub rpm: Option<f64>,
    /// Cumulative odometer
    #[serde(default)]
    pub odometer_mi: Option<f64>,
    /// GPS latitude in degrees
    #[serde(default)]
    pub gps_lat: Option<f64>,
    /// GPS longitude in degrees
    #[serde(default)]
    pub gps_lon: Option<f64>,
    /// Ignition state
    #[serde(default)]
    pub ignition_on: Option<bool>,
    /// Instantaneous fuel rate reported by the ECU
    #[serde(default)]
    pub fuel_rate_gph: Option<f64>,
}

impl TelemetrySample {
    /// Create a sample with only the mandatory channels
    pub fn new(
        vehicle_id: impl Into<String>,
        timestamp: Timestamp,
        fuel_level_pct: f64,
        speed_mph: f64,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            fuel_level_pct,
            speed_mph,
            rpm: None,
            odometer_mi: None,
            gps_lat: None,
            gps_lon: None,
            ignition_on: None,
            fuel_rate_gph: None,
        }
    }

    /// Set engine speed
    pub fn with_rpm(mut self, rpm: f64) -> Self {
        self.rpm = Some(rpm);
        self
    }

    /// Set odometer
    pub fn with_odometer(mut self, odometer_mi: f64) -> Self {
        self.odometer_mi = Some(odometer_mi);
        self
    }

    /// Set GPS position
    pub fn with_gps(mut self, lat: f64, lon: f64) -> Self {
        self.gps_lat = Some(lat);
        self.gps_lon = Some(lon);
        self
    }

    /// Set ignition state
    pub fn with_ignition(mut self, on: bool) -> Self {
        self.ignition_on = Some(on);
        self
    }

    /// Set ECU fuel rate
    pub fn with_fuel_rate(mut self, gph: f64) -> Self {
        self.fuel_rate_gph = Some(gph);
        self
    }

    /// GPS fix, if both coordinates are present
    pub fn gps(&self) -> Option<GpsFix> {
        match (self.gps_lat, self.gps_lon) {
            (Some(lat), Some(lon)) => Some(GpsFix { lat, lon }),
            _ => None,
        }
    }

    /// Check every field against its physical range
    ///
    /// Validation never looks at vehicle history; ordering is checked by the
    /// processor that owns the state.
    pub fn validate(&self) -> SampleResult<()> {
        if self.vehicle_id.trim().is_empty() {
            return Err(SampleError::EmptyVehicleId);
        }

        check_range("fuel_level_pct", self.fuel_level_pct, FUEL_LEVEL_MIN_PCT, FUEL_LEVEL_MAX_PCT)?;
        check_range("speed_mph", self.speed_mph, 0.0, MAX_SPEED_MPH)?;

        if let Some(rpm) = self.rpm {
            check_range("rpm", rpm, 0.0, MAX_RPM)?;
        }
        if let Some(odometer) = self.odometer_mi {
            check_range("odometer_mi", odometer, 0.0, f64::MAX)?;
        }
        if let Some(lat) = self.gps_lat {
            check_range("gps_lat", lat, -90.0, 90.0)?;
        }
        if let Some(lon) = self.gps_lon {
            check_range("gps_lon", lon, -180.0, 180.0)?;
        }
        if let Some(rate) = self.fuel_rate_gph {
            check_range("fuel_rate_gph", rate, 0.0, MAX_FUEL_RATE_GPH)?;
        }

        Ok(())
    }

    /// Compact copy of the measurement channels
    pub fn reading(&self) -> Reading {
        Reading {
            timestamp: self.timestamp,
            fuel_level_pct: self.fuel_level_pct,
            speed_mph: self.speed_mph,
            rpm: self.rpm,
            odometer_mi: self.odometer_mi,
            gps: self.gps(),
            ignition_on: self.ignition_on,
            fuel_rate_gph: self.fuel_rate_gph,
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> SampleResult<()> {
    if !value.is_finite() {
        return Err(SampleError::NonFinite { field });
    }
    if value < min || value > max {
        return Err(SampleError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

/// A GPS position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

impl GpsFix {
    /// Great-circle distance in metres (haversine)
    pub fn distance_m(&self, other: &GpsFix) -> f64 {
        let phi1 = self.lat.to_radians();
        let phi2 = other.lat.to_radians();
        let dphi = (other.lat - self.lat).to_radians();
        let dlambda = (other.lon - self.lon).to_radians();

        let a = (dphi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

/// A validated sample without its vehicle id, as kept in history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Sample time
    pub timestamp: Timestamp,
    /// Fuel level in percent of tank
    pub fuel_level_pct: f64,
    /// Road speed
    pub speed_mph: f64,
    /// Engine speed
    pub rpm: Option<f64>,
    /// Cumulative odometer
    pub odometer_mi: Option<f64>,
    /// GPS position
    pub gps: Option<GpsFix>,
    /// Ignition state
    pub ignition_on: Option<bool>,
    /// ECU fuel rate
    pub fuel_rate_gph: Option<f64>,
}

impl Reading {
    /// Whether the ignition is reported off (unknown is not off)
    pub fn ignition_off(&self) -> bool {
        self.ignition_on == Some(false)
    }

    /// Whether the truck is slower than `threshold_mph`
    pub fn is_stopped(&self, threshold_mph: f64) -> bool {
        self.speed_mph < threshold_mph
    }
}
