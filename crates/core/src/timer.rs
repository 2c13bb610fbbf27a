//! Frame clock for time-driven animation.

use std::time::{Duration, Instant};

/// Monotonic clock whose origin is the first frame that asks for the time.
///
/// The renderer owns one of these instead of keeping a static start time, so
/// the origin has an explicit lifecycle and tests can feed in their own
/// elapsed values.
#[derive(Debug, Default)]
pub struct FrameClock {
    start: Option<Instant>,
}

impl FrameClock {
    /// Create a clock that has not started yet.
    pub fn new() -> Self {
        Self { start: None }
    }

    /// Returns true once the first frame has captured the origin.
    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    /// Time since the first call, capturing the origin on that first call.
    pub fn elapsed(&mut self) -> Duration {
        let now = Instant::now();
        let start = *self.start.get_or_insert(now);
        now - start
    }

    /// Seconds since the first frame, as used by the uniform update.
    pub fn elapsed_secs(&mut self) -> f32 {
        self.elapsed().as_secs_f32()
    }
}
