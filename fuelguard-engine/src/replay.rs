//! Cancellable batch replay with all-or-nothing commit
//!
//! Replay works on copies of the per-vehicle states it touches. Cancellation
//! is checked between samples; a cancelled run throws the copies away, a
//! completed run swaps them in together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fuelguard_core::{SampleError, TelemetrySample};

use crate::output::EngineOutput;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of a replay run
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// Every sample was applied and the states were committed
    Completed {
        /// Outputs of accepted samples, in input order
        outputs: Vec<EngineOutput>,
        /// Rejected samples by input index
        rejected: Vec<(usize, SampleError)>,
    },
    /// Cancelled; nothing was committed
    Cancelled {
        /// Samples handled before cancellation
        processed: usize,
    },
}

impl ReplayOutcome {
    /// Whether the run was committed
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Outputs of a completed run
    pub fn outputs(&self) -> &[EngineOutput] {
        match self {
            Self::Completed { outputs, .. } => outputs,
            Self::Cancelled { .. } => &[],
        }
    }
}

/// Drive a replay over `committed`, committing only on completion
///
/// `open` creates the state of a vehicle not yet in `committed`, along with
/// any error raised while doing so; `apply` processes one sample against a
/// working copy and receives that error with the vehicle's first sample.
pub(crate) fn run<S, E, O, A>(
    committed: &mut HashMap<String, S>,
    samples: &[TelemetrySample],
    cancel: &CancelToken,
    mut open: O,
    mut apply: A,
) -> ReplayOutcome
where
    S: Clone,
    O: FnMut(&str) -> (S, Option<E>),
    A: FnMut(&mut S, &TelemetrySample, Option<E>) -> Result<EngineOutput, SampleError>,
{
    let mut working: HashMap<String, S> = HashMap::new();
    let mut outputs = Vec::with_capacity(samples.len());
    let mut rejected = Vec::new();

    for (index, sample) in samples.iter().enumerate() {
        if cancel.is_cancelled() {
            log::info!("replay cancelled after {} of {} samples", index, samples.len());
            return ReplayOutcome::Cancelled { processed: index };
        }

        if let Err(err) = sample.validate() {
            rejected.push((index, err));
            continue;
        }

        let mut open_error = None;
        let state = working
            .entry(sample.vehicle_id.clone())
            .or_insert_with(|| match committed.get(&sample.vehicle_id) {
                Some(state) => state.clone(),
                None => {
                    let (state, err) = open(&sample.vehicle_id);
                    open_error = err;
                    state
                }
            });

        match apply(state, sample, open_error) {
            Ok(output) => outputs.push(output),
            Err(err) => rejected.push((index, err)),
        }
    }

    if cancel.is_cancelled() {
        log::info!("replay cancelled after all {} samples; discarding", samples.len());
        return ReplayOutcome::Cancelled {
            processed: samples.len(),
        };
    }

    log::info!(
        "replay committed {} vehicles ({} samples, {} rejected)",
        working.len(),
        outputs.len(),
        rejected.len()
    );
    committed.extend(working);
    ReplayOutcome::Completed { outputs, rejected }
}
