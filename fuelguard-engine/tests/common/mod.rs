//! Shared fixtures for engine integration tests
//!
//! - Trip generators for typical duty cycles
//! - Baseline store fakes: always failing, slow, scripted, cancelling
//! - Engine constructors wired to a manual clock

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fuelguard_core::{Clock, EngineConfig, ManualClock, TelemetrySample};
use fuelguard_engine::{
    BaselineError, BaselineStore, CancelToken, FuelEngine, InMemoryBaselineStore, VehicleSnapshot,
};

/// 2024-01-01T01:30:00Z
pub const NIGHT_START: u64 = 1_704_072_600_000;

/// 2024-01-01T13:00:00Z
pub const AFTERNOON_START: u64 = 1_704_114_000_000;

pub const TANK_GAL: f64 = 150.0;

/// Builds telemetry for one vehicle, tracking odometer and position
pub struct TripBuilder {
    vehicle: String,
    pub timestamp: u64,
    pub level_pct: f64,
    pub odometer_mi: f64,
    pub lat: f64,
    pub lon: f64,
    samples: Vec<TelemetrySample>,
}

impl TripBuilder {
    pub fn new(vehicle: &str, start: u64, level_pct: f64) -> Self {
        Self {
            vehicle: vehicle.to_string(),
            timestamp: start,
            level_pct,
            odometer_mi: 80_000.0,
            lat: 41.85,
            lon: -87.65,
            samples: Vec::new(),
        }
    }

    fn emit(&mut self, speed_mph: f64, ignition: bool) {
        let sample = TelemetrySample::new(self.vehicle.as_str(), self.timestamp, self.level_pct, speed_mph)
            .with_odometer(self.odometer_mi)
            .with_gps(self.lat, self.lon)
            .with_ignition(ignition);
        self.samples.push(sample);
    }

    pub fn start(mut self, speed_mph: f64, ignition: bool) -> Self {
        self.emit(speed_mph, ignition);
        self
    }

    pub fn cruise(mut self, samples: usize, interval_ms: u64, speed_mph: f64, mpg: f64) -> Self {
        let hours = interval_ms as f64 / 3_600_000.0;
        for _ in 0..samples {
            let miles = speed_mph * hours;
            self.timestamp += interval_ms;
            self.odometer_mi += miles;
            self.lat += miles / 69.0;
            self.level_pct -= miles / mpg / TANK_GAL * 100.0;
            self.emit(speed_mph, true);
        }
        self
    }

    pub fn park(mut self, samples: usize, interval_ms: u64, ignition: bool) -> Self {
        for _ in 0..samples {
            self.timestamp += interval_ms;
            self.emit(0.0, ignition);
        }
        self
    }

    pub fn siphon(mut self, samples: usize, interval_ms: u64, pct_per_sample: f64) -> Self {
        for _ in 0..samples {
            self.timestamp += interval_ms;
            self.level_pct -= pct_per_sample;
            self.emit(0.0, false);
        }
        self
    }

    /// Parked float sender swinging down and back up
    pub fn slosh(mut self, cycles: usize, interval_ms: u64, swing_pct: f64) -> Self {
        for _ in 0..cycles {
            self.timestamp += interval_ms;
            self.level_pct -= swing_pct;
            self.emit(0.0, false);
            self.timestamp += interval_ms;
            self.level_pct += swing_pct - 0.5;
            self.emit(0.0, false);
        }
        self
    }

    pub fn level_jump(mut self, delta_pct: f64) -> Self {
        self.level_pct += delta_pct;
        self
    }

    pub fn build(self) -> Vec<TelemetrySample> {
        self.samples
    }
}

/// Merge per-vehicle trips into one stream ordered by time
pub fn interleave(trips: Vec<Vec<TelemetrySample>>) -> Vec<TelemetrySample> {
    let mut all: Vec<_> = trips.into_iter().flatten().collect();
    all.sort_by_key(|s| s.timestamp);
    all
}

/// What a scripted store does on one call
#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Pass,
    Fail,
    Delay(u64),
}

/// Store whose calls follow a script, then pass through to memory
pub struct ScriptedStore {
    pub inner: InMemoryBaselineStore,
    clock: ManualClock,
    loads: Mutex<VecDeque<Behaviour>>,
    saves: Mutex<VecDeque<Behaviour>>,
    pub load_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    fallback: Behaviour,
}

impl ScriptedStore {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            inner: InMemoryBaselineStore::new(),
            clock,
            loads: Mutex::new(VecDeque::new()),
            saves: Mutex::new(VecDeque::new()),
            load_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
            fallback: Behaviour::Pass,
        }
    }

    /// Every unscripted call behaves like `behaviour`
    pub fn always(mut self, behaviour: Behaviour) -> Self {
        self.fallback = behaviour;
        self
    }

    pub fn script_loads(self, script: &[Behaviour]) -> Self {
        self.loads.lock().unwrap().extend(script.iter().copied());
        self
    }

    pub fn loads(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn act(&self, queue: &Mutex<VecDeque<Behaviour>>) -> Result<(), BaselineError> {
        let behaviour = queue.lock().unwrap().pop_front().unwrap_or(self.fallback);
        match behaviour {
            Behaviour::Pass => Ok(()),
            Behaviour::Fail => Err(BaselineError::Unavailable {
                reason: "connection refused".into(),
            }),
            Behaviour::Delay(ms) => {
                self.clock.advance(ms);
                Ok(())
            }
        }
    }
}

impl BaselineStore for ScriptedStore {
    fn load(&self, vehicle_id: &str, timeout: Duration) -> Result<Option<VehicleSnapshot>, BaselineError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.act(&self.loads)?;
        self.inner.load(vehicle_id, timeout)
    }

    fn save(&self, snapshot: &VehicleSnapshot, timeout: Duration) -> Result<(), BaselineError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.act(&self.saves)?;
        self.inner.save(snapshot, timeout)
    }
}

/// Store that cancels a replay as soon as a given vehicle is looked up
pub struct CancellingStore {
    pub trigger_vehicle: String,
    pub token: CancelToken,
}

impl BaselineStore for CancellingStore {
    fn load(&self, vehicle_id: &str, _: Duration) -> Result<Option<VehicleSnapshot>, BaselineError> {
        if vehicle_id == self.trigger_vehicle {
            self.token.cancel();
        }
        Ok(None)
    }

    fn save(&self, _: &VehicleSnapshot, _: Duration) -> Result<(), BaselineError> {
        Ok(())
    }
}

pub fn engine_with(store: Arc<dyn BaselineStore>, clock: ManualClock) -> FuelEngine {
    FuelEngine::new(EngineConfig::default(), store, Arc::new(clock)).unwrap()
}

/// Feed samples, advancing the clock to keep pace with sample time
pub fn feed_paced(
    engine: &mut FuelEngine,
    clock: &ManualClock,
    samples: &[TelemetrySample],
) -> Vec<fuelguard_engine::EngineOutput> {
    let origin = samples.first().map(|s| s.timestamp).unwrap_or(0);
    let base = clock.now_ms();
    samples
        .iter()
        .map(|s| {
            clock.set(base + (s.timestamp - origin));
            engine.process(s).unwrap()
        })
        .collect()
}
