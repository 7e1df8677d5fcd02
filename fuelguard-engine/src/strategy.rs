//! Interchangeable analytics strategies
//!
//! Both strategies take the same samples and produce the same
//! [`EngineOutput`], so a caller can run them side by side and diff the
//! results. Which one a deployment runs is a configuration choice.

use std::sync::Arc;

use fuelguard_core::config::AlgorithmKind;
use fuelguard_core::errors::ConfigError;
use fuelguard_core::{Clock, EngineConfig, SampleResult, TelemetrySample};

use crate::baseline::BaselineStore;
use crate::engine::FuelEngine;
use crate::legacy::LegacyEngine;
use crate::output::EngineOutput;
use crate::replay::{CancelToken, ReplayOutcome};

/// Common contract of the fuel analytics strategies
pub trait FuelAnalytics: Send {
    /// Short strategy name for logs and reports
    fn name(&self) -> &'static str;

    /// Apply one sample
    fn process(&mut self, sample: &TelemetrySample) -> SampleResult<EngineOutput>;

    /// Apply a batch with all-or-nothing commit
    fn replay(&mut self, samples: &[TelemetrySample], cancel: &CancelToken) -> ReplayOutcome;
}

impl FuelAnalytics for FuelEngine {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn process(&mut self, sample: &TelemetrySample) -> SampleResult<EngineOutput> {
        FuelEngine::process(self, sample)
    }

    fn replay(&mut self, samples: &[TelemetrySample], cancel: &CancelToken) -> ReplayOutcome {
        FuelEngine::replay(self, samples, cancel)
    }
}

impl FuelAnalytics for LegacyEngine {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn process(&mut self, sample: &TelemetrySample) -> SampleResult<EngineOutput> {
        LegacyEngine::process(self, sample)
    }

    fn replay(&mut self, samples: &[TelemetrySample], cancel: &CancelToken) -> ReplayOutcome {
        LegacyEngine::replay(self, samples, cancel)
    }
}

/// Build the strategy selected by `config.algorithm`
pub fn build_analytics(
    config: EngineConfig,
    store: Arc<dyn BaselineStore>,
    clock: Arc<dyn Clock>,
) -> Result<Box<dyn FuelAnalytics>, ConfigError> {
    let analytics: Box<dyn FuelAnalytics> = match config.algorithm {
        AlgorithmKind::Adaptive => Box::new(FuelEngine::new(config, store, clock)?),
        AlgorithmKind::Legacy => Box::new(LegacyEngine::new(config)?),
    };
    log::info!("built {} fuel analytics", analytics.name());
    Ok(analytics)
}
