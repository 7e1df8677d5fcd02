//! Time handling for telemetry processing
//!
//! Sample timestamps drive every algorithm; the wall clock is only consulted
//! for collaborator health (timeouts and circuit-breaker cooldowns). Both are
//! expressed as milliseconds since the Unix epoch.
//!
//! The clock is a trait so tests and replays can run on simulated time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Timelike};

use crate::constants::{MS_PER_HOUR, MS_PER_MINUTE};

/// Timestamp in milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Current time in milliseconds
    fn now_ms(&self) -> Timestamp;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Manually driven clock for testing and replay
///
/// Clones share the same underlying time, so a test can hold one handle and
/// advance it while the engine reads another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, timestamp: Timestamp) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    /// Move time forward
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Elapsed time between two timestamps in hours (0 if `later` is earlier)
pub fn hours_between(earlier: Timestamp, later: Timestamp) -> f64 {
    later.saturating_sub(earlier) as f64 / MS_PER_HOUR as f64
}

/// Elapsed time between two timestamps in minutes (0 if `later` is earlier)
pub fn minutes_between(earlier: Timestamp, later: Timestamp) -> f64 {
    later.saturating_sub(earlier) as f64 / MS_PER_MINUTE as f64
}

/// Local hour of day (0-23) for a timestamp at a fixed UTC offset
///
/// Returns `None` for timestamps chrono cannot represent or offsets beyond
/// ±24 h.
pub fn local_hour(timestamp: Timestamp, utc_offset_minutes: i32) -> Option<u32> {
    let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
    let millis = i64::try_from(timestamp).ok()?;
    let utc = DateTime::from_timestamp_millis(millis)?;
    Some(utc.with_timezone(&offset).hour())
}
