//! Engine configuration
//!
//! One [`EngineConfig`] enumerates every tunable of the engine. It
//! deserializes from JSON with every section optional (missing fields take
//! the defaults from [`crate::constants`]) and is checked once by
//! [`EngineConfig::validate`] before an engine is built.
//!
//! ```rust
//! use fuelguard_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(
//!     r#"{ "fleet": { "tank_capacity_gal": 200.0 }, "theft": { "suspicion_threshold": 0.8 } }"#,
//! ).unwrap();
//! assert_eq!(config.fleet.tank_capacity_gal, 200.0);
//! assert_eq!(config.classifier.window_samples, 20);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{fusion, gates, theft, vehicle};
use crate::errors::ConfigError;
use crate::mode::DriveMode;
use crate::theft::TheftFactor;
use crate::time::Timestamp;

/// Tolerance on the theft weight sum
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Which analytics strategy the engine factory builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Mode-aware MPG, two-state EKF, multi-factor theft scoring
    #[default]
    Adaptive,
    /// Fixed MPG window, scalar Kalman filter, single-threshold theft rule
    Legacy,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Strategy selection
    pub algorithm: AlgorithmKind,
    /// Fleet-wide vehicle parameters
    pub fleet: FleetConfig,
    /// Consecutive-sample analysis
    pub step: StepConfig,
    /// Driving-mode classifier
    pub classifier: ClassifierConfig,
    /// Adaptive MPG estimator
    pub mpg: MpgConfig,
    /// Extended Kalman fuel filter
    pub ekf: EkfConfig,
    /// Theft scorer
    pub theft: TheftConfig,
    /// Baseline collaborator handling
    pub baseline: BaselineConfig,
    /// Deployment gates for A/B comparison
    pub gates: DeployGates,
    /// Scalar filter and threshold rule of the legacy strategy
    pub legacy: LegacyConfig,
}

impl EngineConfig {
    /// Parse a JSON document and validate it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject configurations the algorithms cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fleet.validate()?;
        self.step.validate()?;
        self.classifier.validate()?;
        self.mpg.validate()?;
        self.ekf.validate()?;
        self.theft.validate()?;
        self.baseline.validate()?;
        self.legacy.validate()
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(field, "must be a positive finite number"));
    }
    Ok(())
}

fn require_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(field, "must be a non-negative finite number"));
    }
    Ok(())
}

fn require_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(field, "must lie in [0, 1]"));
    }
    Ok(())
}

/// Fleet-wide vehicle parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Tank capacity used when a vehicle has no override
    pub tank_capacity_gal: f64,
    /// Per-vehicle tank capacities
    pub tank_overrides: BTreeMap<String, f64>,
    /// Offset of fleet local time from UTC, for the time-of-day factor
    pub utc_offset_minutes: i32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            tank_capacity_gal: vehicle::DEFAULT_TANK_CAPACITY_GAL,
            tank_overrides: BTreeMap::new(),
            utc_offset_minutes: 0,
        }
    }
}

impl FleetConfig {
    /// Tank capacity for one vehicle
    pub fn tank_capacity(&self, vehicle_id: &str) -> f64 {
        self.tank_overrides
            .get(vehicle_id)
            .copied()
            .unwrap_or(self.tank_capacity_gal)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("fleet.tank_capacity_gal", self.tank_capacity_gal)?;
        for capacity in self.tank_overrides.values() {
            require_positive("fleet.tank_overrides", *capacity)?;
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::invalid("fleet.utc_offset_minutes", "must be within ±24 h"));
        }
        Ok(())
    }
}

/// Thresholds for classifying the step between consecutive samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Level rise that counts as a refuel
    pub refuel_threshold_pct: f64,
    /// Drop beyond expected consumption that counts as unexplained
    pub drop_noise_threshold_pct: f64,
    /// Interval beyond which a step is a time gap
    pub max_gap_ms: Timestamp,
    /// Idle burn included in expected consumption while the engine runs
    pub idle_allowance_gph: f64,
    /// Worst-case economy used for expected consumption
    pub worst_case_mpg: f64,
    /// Slack on the maximum plausible odometer delta
    pub odometer_slack: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            refuel_threshold_pct: vehicle::REFUEL_THRESHOLD_PCT,
            drop_noise_threshold_pct: vehicle::DROP_NOISE_THRESHOLD_PCT,
            max_gap_ms: vehicle::MAX_SAMPLE_GAP_MS,
            idle_allowance_gph: vehicle::IDLE_FUEL_RATE_GPH,
            worst_case_mpg: vehicle::MPG_PLAUSIBLE_MIN,
            odometer_slack: vehicle::ODOMETER_SLACK_FACTOR,
        }
    }
}

impl StepConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("step.refuel_threshold_pct", self.refuel_threshold_pct)?;
        require_positive("step.drop_noise_threshold_pct", self.drop_noise_threshold_pct)?;
        if self.max_gap_ms == 0 {
            return Err(ConfigError::invalid("step.max_gap_ms", "must be positive"));
        }
        require_non_negative("step.idle_allowance_gph", self.idle_allowance_gph)?;
        require_positive("step.worst_case_mpg", self.worst_case_mpg)?;
        if !(self.odometer_slack >= 1.0) {
            return Err(ConfigError::invalid("step.odometer_slack", "must be at least 1.0"));
        }
        Ok(())
    }
}

/// Driving-mode classifier parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Recent samples considered per evaluation
    pub window_samples: usize,
    /// Samples required before the classifier leaves its current mode
    pub min_samples: usize,
    /// Minimum average speed for HIGHWAY
    pub highway_speed_mph: f64,
    /// Maximum average speed for CITY
    pub city_speed_mph: f64,
    /// Speed below which a sample is a stop
    pub stop_speed_mph: f64,
    /// Maximum stop fraction for HIGHWAY
    pub highway_max_stop_fraction: f64,
    /// Minimum stop fraction for CITY
    pub city_min_stop_fraction: f64,
    /// Consecutive agreeing evaluations before switching
    pub hysteresis_evaluations: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            window_samples: vehicle::CLASSIFIER_WINDOW_SAMPLES,
            min_samples: vehicle::CLASSIFIER_MIN_SAMPLES,
            highway_speed_mph: vehicle::HIGHWAY_SPEED_MPH,
            city_speed_mph: vehicle::CITY_SPEED_MPH,
            stop_speed_mph: vehicle::STOP_SPEED_MPH,
            highway_max_stop_fraction: vehicle::HIGHWAY_MAX_STOP_FRACTION,
            city_min_stop_fraction: vehicle::CITY_MIN_STOP_FRACTION,
            hysteresis_evaluations: vehicle::HYSTERESIS_EVALUATIONS,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_samples == 0 || self.window_samples > vehicle::HISTORY_CAPACITY {
            return Err(ConfigError::invalid(
                "classifier.window_samples",
                "must be between 1 and the history capacity",
            ));
        }
        if self.min_samples == 0 || self.min_samples > self.window_samples {
            return Err(ConfigError::invalid(
                "classifier.min_samples",
                "must be between 1 and window_samples",
            ));
        }
        require_positive("classifier.highway_speed_mph", self.highway_speed_mph)?;
        require_positive("classifier.city_speed_mph", self.city_speed_mph)?;
        if self.city_speed_mph >= self.highway_speed_mph {
            return Err(ConfigError::invalid(
                "classifier.city_speed_mph",
                "must be below highway_speed_mph",
            ));
        }
        require_non_negative("classifier.stop_speed_mph", self.stop_speed_mph)?;
        require_fraction("classifier.highway_max_stop_fraction", self.highway_max_stop_fraction)?;
        require_fraction("classifier.city_min_stop_fraction", self.city_min_stop_fraction)?;
        if self.hysteresis_evaluations == 0 {
            return Err(ConfigError::invalid(
                "classifier.hysteresis_evaluations",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Distance and fuel at which an accumulation window closes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeWindow {
    /// Distance target
    pub distance_mi: f64,
    /// Fuel target
    pub fuel_gal: f64,
}

/// Adaptive MPG estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpgConfig {
    /// Window for HIGHWAY
    pub highway: ModeWindow,
    /// Window for MIXED
    pub mixed: ModeWindow,
    /// Window for CITY
    pub city: ModeWindow,
    /// Lower plausibility bound
    pub plausible_min_mpg: f64,
    /// Upper plausibility bound
    pub plausible_max_mpg: f64,
    /// Windows with less fuel than this yield no estimate
    pub zero_fuel_epsilon_gal: f64,
    /// Samples at which the size term of confidence saturates
    pub full_confidence_samples: u32,
    /// Steps shorter than this do not contribute a per-step rate
    pub min_rate_distance_mi: f64,
}

impl Default for MpgConfig {
    fn default() -> Self {
        Self {
            highway: ModeWindow {
                distance_mi: vehicle::HIGHWAY_WINDOW_MI,
                fuel_gal: vehicle::HIGHWAY_WINDOW_GAL,
            },
            mixed: ModeWindow {
                distance_mi: vehicle::MIXED_WINDOW_MI,
                fuel_gal: vehicle::MIXED_WINDOW_GAL,
            },
            city: ModeWindow {
                distance_mi: vehicle::CITY_WINDOW_MI,
                fuel_gal: vehicle::CITY_WINDOW_GAL,
            },
            plausible_min_mpg: vehicle::MPG_PLAUSIBLE_MIN,
            plausible_max_mpg: vehicle::MPG_PLAUSIBLE_MAX,
            zero_fuel_epsilon_gal: vehicle::ZERO_FUEL_EPSILON_GAL,
            full_confidence_samples: vehicle::FULL_CONFIDENCE_SAMPLES,
            min_rate_distance_mi: vehicle::MIN_RATE_DISTANCE_MI,
        }
    }
}

impl MpgConfig {
    /// Window targets for a driving mode
    pub fn window(&self, mode: DriveMode) -> ModeWindow {
        match mode {
            DriveMode::Highway => self.highway,
            DriveMode::Mixed => self.mixed,
            DriveMode::City => self.city,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for window in [self.highway, self.mixed, self.city] {
            require_positive("mpg.window.distance_mi", window.distance_mi)?;
            require_positive("mpg.window.fuel_gal", window.fuel_gal)?;
        }
        require_positive("mpg.plausible_min_mpg", self.plausible_min_mpg)?;
        if !(self.plausible_max_mpg > self.plausible_min_mpg) {
            return Err(ConfigError::invalid(
                "mpg.plausible_max_mpg",
                "must exceed plausible_min_mpg",
            ));
        }
        require_positive("mpg.zero_fuel_epsilon_gal", self.zero_fuel_epsilon_gal)?;
        require_non_negative("mpg.min_rate_distance_mi", self.min_rate_distance_mi)
    }
}

/// Fuel-level sensor technology, which sets the measurement noise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorGrade {
    /// Ultrasonic level sensor
    Ultrasonic,
    /// Capacitive probe
    Capacitive,
    /// Resistive float sender
    Float,
    /// Explicit variance in %²
    Variance(f64),
}

impl SensorGrade {
    /// Measurement variance in %²
    pub fn noise_variance(&self) -> f64 {
        match self {
            Self::Ultrasonic => fusion::ULTRASONIC_NOISE_VAR,
            Self::Capacitive => fusion::CAPACITIVE_NOISE_VAR,
            Self::Float => fusion::FLOAT_NOISE_VAR,
            Self::Variance(v) => *v,
        }
    }
}

/// Physics-based consumption model used by the EKF prediction step
///
/// ```text
/// burn_gph = (idle + speed·v + drag·v² + rpm·(rpm/1000)²) × (1 + load·level/100)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumptionModel {
    /// Idle burn with the engine running
    pub idle_gph: f64,
    /// Linear speed term
    pub speed_coeff: f64,
    /// Quadratic speed term
    pub drag_coeff: f64,
    /// Quadratic engine-speed term
    pub rpm_coeff: f64,
    /// Fuel-weight load term
    pub load_coeff: f64,
}

impl Default for ConsumptionModel {
    fn default() -> Self {
        Self {
            idle_gph: fusion::MODEL_IDLE_GPH,
            speed_coeff: fusion::MODEL_SPEED_COEFF,
            drag_coeff: fusion::MODEL_DRAG_COEFF,
            rpm_coeff: fusion::MODEL_RPM_COEFF,
            load_coeff: fusion::MODEL_LOAD_COEFF,
        }
    }
}

/// Extended Kalman fuel filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfConfig {
    /// Measurement variance for vehicles without a sensor grade
    pub measurement_noise_var: f64,
    /// Per-vehicle sensor grades
    pub sensor_grades: BTreeMap<String, SensorGrade>,
    /// Level random walk, %²/min
    pub level_process_noise: f64,
    /// Bias random walk, %²/min
    pub bias_process_noise: f64,
    /// Relative uncertainty of the predicted level change
    pub rate_uncertainty: f64,
    /// Level variance after initialisation or reset
    pub initial_level_var: f64,
    /// Bias variance after initialisation or reset
    pub initial_bias_var: f64,
    /// Innovation gate for discontinuities, in σ
    pub jump_gate_sigma: f64,
    /// EMA factor of the bias detector
    pub bias_smoothing_alpha: f64,
    /// Bias magnitude reported as a sensor bias
    pub bias_threshold_pct: f64,
    /// Consecutive updates needed to raise or clear the bias flag
    pub bias_sustain_updates: u32,
    /// Share of the threshold the bias must fall below to clear the flag
    pub bias_clear_fraction: f64,
    /// Lower covariance determinant limit
    pub min_covariance_det: f64,
    /// Upper covariance determinant limit
    pub max_covariance_det: f64,
    /// Gap after which the level is re-anchored to the measurement
    pub reanchor_after_ms: Timestamp,
    /// Consumption model for prediction
    pub consumption: ConsumptionModel,
}

impl Default for EkfConfig {
    fn default() -> Self {
        Self {
            measurement_noise_var: fusion::DEFAULT_MEASUREMENT_NOISE_VAR,
            sensor_grades: BTreeMap::new(),
            level_process_noise: fusion::LEVEL_PROCESS_NOISE_PER_MIN,
            bias_process_noise: fusion::BIAS_PROCESS_NOISE_PER_MIN,
            rate_uncertainty: fusion::RATE_UNCERTAINTY,
            initial_level_var: fusion::INITIAL_LEVEL_VAR,
            initial_bias_var: fusion::INITIAL_BIAS_VAR,
            jump_gate_sigma: fusion::JUMP_GATE_SIGMA,
            bias_smoothing_alpha: fusion::BIAS_SMOOTHING_ALPHA,
            bias_threshold_pct: fusion::BIAS_THRESHOLD_PCT,
            bias_sustain_updates: fusion::BIAS_SUSTAIN_UPDATES,
            bias_clear_fraction: fusion::BIAS_CLEAR_FRACTION,
            min_covariance_det: fusion::MIN_COVARIANCE_DET,
            max_covariance_det: fusion::MAX_COVARIANCE_DET,
            reanchor_after_ms: fusion::REANCHOR_GAP_MS,
            consumption: ConsumptionModel::default(),
        }
    }
}

impl EkfConfig {
    /// Measurement variance for one vehicle
    pub fn measurement_noise(&self, vehicle_id: &str) -> f64 {
        self.sensor_grades
            .get(vehicle_id)
            .map(SensorGrade::noise_variance)
            .unwrap_or(self.measurement_noise_var)
    }

    /// Builder: set the fleet-wide measurement variance
    pub fn with_measurement_noise(mut self, variance: f64) -> Self {
        self.measurement_noise_var = variance;
        self
    }

    /// Builder: set level and bias process noise
    pub fn with_process_noise(mut self, level: f64, bias: f64) -> Self {
        self.level_process_noise = level;
        self.bias_process_noise = bias;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("ekf.measurement_noise_var", self.measurement_noise_var)?;
        for grade in self.sensor_grades.values() {
            require_positive("ekf.sensor_grades", grade.noise_variance())?;
        }
        require_positive("ekf.level_process_noise", self.level_process_noise)?;
        require_positive("ekf.bias_process_noise", self.bias_process_noise)?;
        require_non_negative("ekf.rate_uncertainty", self.rate_uncertainty)?;
        require_positive("ekf.initial_level_var", self.initial_level_var)?;
        require_positive("ekf.initial_bias_var", self.initial_bias_var)?;
        require_positive("ekf.jump_gate_sigma", self.jump_gate_sigma)?;
        if !(self.bias_smoothing_alpha > 0.0 && self.bias_smoothing_alpha <= 1.0) {
            return Err(ConfigError::invalid("ekf.bias_smoothing_alpha", "must lie in (0, 1]"));
        }
        require_positive("ekf.bias_threshold_pct", self.bias_threshold_pct)?;
        if self.bias_sustain_updates == 0 {
            return Err(ConfigError::invalid("ekf.bias_sustain_updates", "must be at least 1"));
        }
        require_fraction("ekf.bias_clear_fraction", self.bias_clear_fraction)?;
        require_positive("ekf.min_covariance_det", self.min_covariance_det)?;
        if !(self.max_covariance_det > self.min_covariance_det) {
            return Err(ConfigError::invalid(
                "ekf.max_covariance_det",
                "must exceed min_covariance_det",
            ));
        }
        if self.reanchor_after_ms == 0 {
            return Err(ConfigError::invalid("ekf.reanchor_after_ms", "must be positive"));
        }
        let model = &self.consumption;
        for (field, value) in [
            ("ekf.consumption.idle_gph", model.idle_gph),
            ("ekf.consumption.speed_coeff", model.speed_coeff),
            ("ekf.consumption.drag_coeff", model.drag_coeff),
            ("ekf.consumption.rpm_coeff", model.rpm_coeff),
            ("ekf.consumption.load_coeff", model.load_coeff),
        ] {
            require_non_negative(field, value)?;
        }
        Ok(())
    }
}

/// Weight of each theft factor in the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    /// Net drop size
    pub drop_magnitude: f64,
    /// Drain rate
    pub drop_rate: f64,
    /// Ignition state during the drop
    pub ignition: f64,
    /// GPS displacement during the drop
    pub gps: f64,
    /// Local time of day
    pub time_of_day: f64,
    /// Deviation from the vehicle's consumption baseline
    pub baseline: f64,
    /// Kalman innovation
    pub kalman: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            drop_magnitude: theft::WEIGHT_DROP_MAGNITUDE,
            drop_rate: theft::WEIGHT_DROP_RATE,
            ignition: theft::WEIGHT_IGNITION,
            gps: theft::WEIGHT_GPS,
            time_of_day: theft::WEIGHT_TIME_OF_DAY,
            baseline: theft::WEIGHT_BASELINE,
            kalman: theft::WEIGHT_KALMAN,
        }
    }
}

impl FactorWeights {
    /// Weight of one factor
    pub fn get(&self, factor: TheftFactor) -> f64 {
        match factor {
            TheftFactor::DropMagnitude => self.drop_magnitude,
            TheftFactor::DropRate => self.drop_rate,
            TheftFactor::Ignition => self.ignition,
            TheftFactor::GpsStationarity => self.gps,
            TheftFactor::TimeOfDay => self.time_of_day,
            TheftFactor::BaselineDeviation => self.baseline,
            TheftFactor::KalmanResidual => self.kalman,
        }
    }

    /// Sum of all weights
    pub fn sum(&self) -> f64 {
        TheftFactor::ALL.iter().map(|f| self.get(*f)).sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for factor in TheftFactor::ALL {
            let weight = self.get(factor);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::NegativeWeight { factor: factor.name() });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightsDoNotSumToOne { sum });
        }
        Ok(())
    }
}

/// Theft scorer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TheftConfig {
    /// Factor weights, summing to 1
    pub weights: FactorWeights,
    /// Composite above which a settled episode is theft-suspected
    pub suspicion_threshold: f64,
    /// Minimum factor coverage for a theft verdict
    pub min_confidence: f64,
    /// Settled samples that end an episode
    pub settle_samples: u32,
    /// Level movement counted as settled
    pub settle_noise_pct: f64,
    /// Maximum episode length
    pub observation_window_ms: Timestamp,
    /// Share of the gross drop whose return marks a glitch
    pub recovery_fraction: f64,
    /// Drop magnitude ramp floor
    pub min_drop_pct: f64,
    /// Drop magnitude ramp ceiling
    pub full_scale_drop_pct: f64,
    /// Drain rate ramp ceiling, %/min
    pub full_scale_rate_pct_per_min: f64,
    /// Displacement at which the GPS factor reaches zero
    pub stationary_displacement_m: f64,
    /// Kalman residual ramp floor, σ
    pub residual_floor_sigma: f64,
    /// Kalman residual ramp ceiling, σ
    pub residual_ceiling_sigma: f64,
    /// Kalman factor multiplier while a sensor bias is flagged
    pub bias_residual_discount: f64,
    /// Baseline z-score ramp floor
    pub baseline_z_floor: f64,
    /// Baseline z-score ramp ceiling
    pub baseline_z_ceiling: f64,
    /// Observations before the baseline factor is computable
    pub min_baseline_observations: u64,
    /// Standard deviation floor of the consumption baseline, %/min
    pub baseline_std_floor: f64,
    /// Speed at or above which the truck counts as moving
    pub moving_speed_mph: f64,
    /// Ignition and GPS factors at or below this mark the drop implausible
    pub implausible_motion_ceiling: f64,
}

impl Default for TheftConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            suspicion_threshold: theft::SUSPICION_THRESHOLD,
            min_confidence: theft::MIN_FACTOR_CONFIDENCE,
            settle_samples: theft::SETTLE_SAMPLES,
            settle_noise_pct: theft::SETTLE_NOISE_PCT,
            observation_window_ms: theft::OBSERVATION_WINDOW_MS,
            recovery_fraction: theft::RECOVERY_FRACTION,
            min_drop_pct: theft::MIN_DROP_PCT,
            full_scale_drop_pct: theft::FULL_SCALE_DROP_PCT,
            full_scale_rate_pct_per_min: theft::FULL_SCALE_RATE_PCT_PER_MIN,
            stationary_displacement_m: theft::STATIONARY_DISPLACEMENT_M,
            residual_floor_sigma: theft::RESIDUAL_FLOOR_SIGMA,
            residual_ceiling_sigma: theft::RESIDUAL_CEILING_SIGMA,
            bias_residual_discount: theft::BIAS_RESIDUAL_DISCOUNT,
            baseline_z_floor: theft::BASELINE_Z_FLOOR,
            baseline_z_ceiling: theft::BASELINE_Z_CEILING,
            min_baseline_observations: theft::MIN_BASELINE_OBSERVATIONS,
            baseline_std_floor: theft::BASELINE_STD_FLOOR,
            moving_speed_mph: vehicle::STOP_SPEED_MPH,
            implausible_motion_ceiling: theft::IMPLAUSIBLE_MOTION_CEILING,
        }
    }
}

impl TheftConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        require_fraction("theft.suspicion_threshold", self.suspicion_threshold)?;
        require_fraction("theft.min_confidence", self.min_confidence)?;
        if self.settle_samples == 0 {
            return Err(ConfigError::invalid("theft.settle_samples", "must be at least 1"));
        }
        require_non_negative("theft.settle_noise_pct", self.settle_noise_pct)?;
        if self.observation_window_ms == 0 {
            return Err(ConfigError::invalid("theft.observation_window_ms", "must be positive"));
        }
        require_fraction("theft.recovery_fraction", self.recovery_fraction)?;
        require_non_negative("theft.min_drop_pct", self.min_drop_pct)?;
        if !(self.full_scale_drop_pct > self.min_drop_pct) {
            return Err(ConfigError::invalid(
                "theft.full_scale_drop_pct",
                "must exceed min_drop_pct",
            ));
        }
        require_positive("theft.full_scale_rate_pct_per_min", self.full_scale_rate_pct_per_min)?;
        require_positive("theft.stationary_displacement_m", self.stationary_displacement_m)?;
        if !(self.residual_ceiling_sigma > self.residual_floor_sigma) {
            return Err(ConfigError::invalid(
                "theft.residual_ceiling_sigma",
                "must exceed residual_floor_sigma",
            ));
        }
        require_fraction("theft.bias_residual_discount", self.bias_residual_discount)?;
        if !(self.baseline_z_ceiling > self.baseline_z_floor) {
            return Err(ConfigError::invalid(
                "theft.baseline_z_ceiling",
                "must exceed baseline_z_floor",
            ));
        }
        require_positive("theft.baseline_std_floor", self.baseline_std_floor)?;
        require_non_negative("theft.moving_speed_mph", self.moving_speed_mph)?;
        require_fraction("theft.implausible_motion_ceiling", self.implausible_motion_ceiling)
    }
}

/// Baseline collaborator handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Budget for a single load or save
    pub timeout_ms: u64,
    /// Wait before retrying a failed load
    pub retry_interval_ms: u64,
    /// Sample-time interval between snapshot saves
    pub snapshot_interval_ms: u64,
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open
    pub cooldown_ms: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 250,              // Well inside a 1 s ingest budget
            retry_interval_ms: 60_000,    // One minute between load retries
            snapshot_interval_ms: 900_000, // Snapshot every 15 minutes of data
            failure_threshold: 3,         // Three strikes
            cooldown_ms: 30_000,          // 30 s before probing again
        }
    }
}

impl BaselineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("baseline.timeout_ms", "must be positive"));
        }
        if self.snapshot_interval_ms == 0 {
            return Err(ConfigError::invalid("baseline.snapshot_interval_ms", "must be positive"));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("baseline.failure_threshold", "must be at least 1"));
        }
        Ok(())
    }
}

/// Thresholds a treatment strategy must meet against the control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployGates {
    /// Maximum mean |ΔMPG| between the arms
    pub mpg_deploy_diff_threshold: f64,
    /// Maximum processing overhead, percent
    pub mpg_max_perf_degradation_pct: f64,
    /// Minimum filter-variance reduction, percent
    pub ekf_variance_improvement_pct: f64,
    /// Minimum share of vehicles with a detected bias, percent
    pub ekf_bias_detection_rate_pct: f64,
    /// Minimum per-sample theft-alarm agreement, percent
    pub theft_agreement_pct: f64,
    /// Minimum mean confidence of theft verdicts
    pub theft_confidence_threshold: f64,
    /// Minimum false-positive reduction, percent
    pub theft_false_positive_reduction_pct: f64,
}

impl Default for DeployGates {
    fn default() -> Self {
        Self {
            mpg_deploy_diff_threshold: gates::MPG_DEPLOY_DIFF_THRESHOLD,
            mpg_max_perf_degradation_pct: gates::MPG_MAX_PERF_DEGRADATION_PCT,
            ekf_variance_improvement_pct: gates::EKF_VARIANCE_IMPROVEMENT_PCT,
            ekf_bias_detection_rate_pct: gates::EKF_BIAS_DETECTION_RATE_PCT,
            theft_agreement_pct: gates::THEFT_AGREEMENT_PCT,
            theft_confidence_threshold: gates::THEFT_CONFIDENCE_THRESHOLD,
            theft_false_positive_reduction_pct: gates::THEFT_FALSE_POSITIVE_REDUCTION_PCT,
        }
    }
}

/// Parameters of the legacy strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    /// Scalar filter random walk, %²/min
    pub process_noise: f64,
    /// Scalar filter measurement variance
    pub measurement_noise_var: f64,
    /// Cumulative stationary drop that raises a theft alarm
    pub theft_drop_pct: f64,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.01,
            measurement_noise_var: 1.0,
            theft_drop_pct: 10.0,
        }
    }
}

impl LegacyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("legacy.process_noise", self.process_noise)?;
        require_positive("legacy.measurement_noise_var", self.measurement_noise_var)?;
        require_positive("legacy.theft_drop_pct", self.theft_drop_pct)
    }
}
