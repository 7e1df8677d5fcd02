//! Shared fixtures for core integration tests
//!
//! - Deterministic random numbers
//! - Trip generators producing telemetry for typical duty cycles
//! - A minimal stage runner wiring the processors together

#![allow(dead_code)]

use fuelguard_core::{
    AdaptiveMpgEstimator, CircularBuffer, DriveMode, EngineConfig, ExtendedKalmanFuelFilter,
    FilterInput, FilterState, FuelFilterOutput, ModeClassifier, ModeTracker, MpgOutcome, MpgWindow,
    MultiFactorTheftScorer, Reading, StepAnalyzer, TelemetrySample, TheftScore, TheftTracker,
};

/// 2024-01-01T01:30:00Z
pub const NIGHT_START: u64 = 1_704_072_600_000;

/// 2024-01-01T13:00:00Z
pub const AFTERNOON_START: u64 = 1_704_114_000_000;

/// Tank size used by every fixture
pub const TANK_GAL: f64 = 150.0;

pub const VEHICLE: &str = "truck-042";

/// Xorshift generator, deterministic across runs
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u32() >> 8) as f64 / 16_777_216.0
    }

    pub fn gen_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}

/// Builds telemetry one sample at a time, tracking odometer and position
pub struct TripBuilder {
    pub timestamp: u64,
    pub level_pct: f64,
    pub odometer_mi: f64,
    pub lat: f64,
    pub lon: f64,
    samples: Vec<TelemetrySample>,
}

impl TripBuilder {
    pub fn new(start: u64, level_pct: f64) -> Self {
        Self {
            timestamp: start,
            level_pct,
            odometer_mi: 120_000.0,
            lat: 41.85,
            lon: -87.65,
            samples: Vec::new(),
        }
    }

    fn emit(&mut self, speed_mph: f64, ignition: bool) {
        let sample = TelemetrySample::new(VEHICLE, self.timestamp, self.level_pct, speed_mph)
            .with_odometer(self.odometer_mi)
            .with_gps(self.lat, self.lon)
            .with_ignition(ignition)
            .with_rpm(if ignition { 600.0 + speed_mph * 20.0 } else { 0.0 });
        self.samples.push(sample);
    }

    /// First sample of the trip
    pub fn start(mut self, speed_mph: f64, ignition: bool) -> Self {
        self.emit(speed_mph, ignition);
        self
    }

    /// Drive due north at constant speed and economy, one sample per interval
    pub fn cruise(mut self, samples: usize, interval_ms: u64, speed_mph: f64, mpg: f64) -> Self {
        let hours = interval_ms as f64 / 3_600_000.0;
        for _ in 0..samples {
            let miles = speed_mph * hours;
            self.timestamp += interval_ms;
            self.odometer_mi += miles;
            // ~69 miles per degree of latitude
            self.lat += miles / 69.0;
            self.level_pct -= miles / mpg / TANK_GAL * 100.0;
            self.emit(speed_mph, true);
        }
        self
    }

    /// Stand still, level unchanged
    pub fn park(mut self, samples: usize, interval_ms: u64, ignition: bool) -> Self {
        for _ in 0..samples {
            self.timestamp += interval_ms;
            self.emit(0.0, ignition);
        }
        self
    }

    /// Lose `pct_per_sample` of the tank per sample while standing still
    pub fn siphon(mut self, samples: usize, interval_ms: u64, pct_per_sample: f64) -> Self {
        for _ in 0..samples {
            self.timestamp += interval_ms;
            self.level_pct -= pct_per_sample;
            self.emit(0.0, false);
        }
        self
    }

    /// Jump the reported level without any other change
    pub fn level_jump(mut self, delta_pct: f64) -> Self {
        self.level_pct += delta_pct;
        self
    }

    pub fn build(self) -> Vec<TelemetrySample> {
        self.samples
    }
}

/// Outputs of one pass through the stages
pub struct StageOutput {
    pub mode: DriveMode,
    pub mpg: Option<MpgOutcome>,
    pub fuel: FuelFilterOutput,
    pub theft: Option<TheftScore>,
}

/// Processors plus one vehicle's state
pub struct Stages {
    steps: StepAnalyzer,
    classifier: ModeClassifier,
    mpg: AdaptiveMpgEstimator,
    filter: ExtendedKalmanFuelFilter,
    theft: MultiFactorTheftScorer,
    noise_var: f64,
    pub history: CircularBuffer<Reading, 64>,
    pub mode: ModeTracker,
    pub window: MpgWindow,
    pub filter_state: FilterState,
    pub theft_state: TheftTracker,
}

impl Stages {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            steps: StepAnalyzer::new(config.step.clone()),
            classifier: ModeClassifier::new(config.classifier.clone()),
            mpg: AdaptiveMpgEstimator::new(config.mpg.clone()),
            filter: ExtendedKalmanFuelFilter::new(config.ekf.clone()),
            theft: MultiFactorTheftScorer::new(config.theft.clone(), config.fleet.utc_offset_minutes),
            noise_var: config.ekf.measurement_noise_var,
            history: CircularBuffer::new(),
            mode: ModeTracker::default(),
            window: MpgWindow::default(),
            filter_state: FilterState::default(),
            theft_state: TheftTracker::default(),
        }
    }

    pub fn feed(&mut self, sample: &TelemetrySample) -> StageOutput {
        let cur = sample.reading();
        let prev = self.history.last().copied();
        self.history.push(cur);

        let mode = self.classifier.evaluate(&self.history, &mut self.mode).mode;
        let fuel = self.filter.step(
            &mut self.filter_state,
            &FilterInput {
                timestamp: cur.timestamp,
                level_pct: cur.fuel_level_pct,
                speed_mph: cur.speed_mph,
                rpm: cur.rpm,
                ignition_on: cur.ignition_on,
                fuel_rate_gph: cur.fuel_rate_gph,
                tank_gal: TANK_GAL,
                measurement_noise_var: self.noise_var,
            },
        );

        let (mpg, theft) = match prev {
            Some(prev) => {
                let step = self.steps.analyze(&prev, &cur, TANK_GAL);
                let mpg = self.mpg.observe(&mut self.window, &step, mode, cur.timestamp);
                let theft = self.theft.observe(&mut self.theft_state, &prev, &cur, &step, &fuel);
                (Some(mpg), theft)
            }
            None => (None, None),
        };

        StageOutput {
            mode,
            mpg,
            fuel,
            theft,
        }
    }

    pub fn feed_all(&mut self, samples: &[TelemetrySample]) -> Vec<StageOutput> {
        samples.iter().map(|s| self.feed(s)).collect()
    }
}
