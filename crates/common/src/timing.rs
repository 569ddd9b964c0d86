//! Stopwatch for render stages.
//!
//! Stage durations are telemetry only. They end up in the persisted result
//! record and in log lines, never in control flow.

use std::time::{Duration, Instant};

/// Monotonic stopwatch started when a stage begins.
#[derive(Debug, Clone, Copy)]
pub struct StageTimer {
    started: Instant,
}

impl StageTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fractional seconds, as stored in `StageTimings`.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Whole milliseconds, for log fields.
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed().as_millis()
    }
}
