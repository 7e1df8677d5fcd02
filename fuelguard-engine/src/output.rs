//! Per-sample engine output

use serde::{Deserialize, Serialize};

use fuelguard_core::{
    DriveMode, FuelFilterOutput, MpgOutcome, StepClass, TheftClassification, TheftScore, Timestamp,
};

use crate::baseline::BaselineError;

/// Everything the engine computed for one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    /// Vehicle the sample belongs to
    pub vehicle_id: String,
    /// Sample time
    pub timestamp: Timestamp,
    /// Drive mode in force after this sample
    pub mode: DriveMode,
    /// Economy estimate or the reason there is none
    pub mpg: MpgOutcome,
    /// Filtered fuel level
    pub fuel: FuelFilterOutput,
    /// Theft score while a drop is under observation or being resolved
    pub theft: Option<TheftScore>,
    /// Class of the step from the previous sample; `None` on the first
    pub step_class: Option<StepClass>,
    /// Running without a persisted baseline
    pub degraded: bool,
    /// Baseline failure encountered while handling this sample
    pub baseline_error: Option<BaselineError>,
}

impl EngineOutput {
    /// Whether this output raises a theft alarm
    pub fn is_theft_alarm(&self) -> bool {
        self.theft
            .as_ref()
            .map_or(false, |t| t.classification == TheftClassification::TheftSuspected)
    }

    /// Published MPG value, if any
    pub fn mpg_value(&self) -> Option<f64> {
        self.mpg.value()
    }
}
