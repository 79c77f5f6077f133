//! Monotonic time sources for frame timestamps.

use std::time::{Duration, Instant};

/// Source of monotonic frame timestamps.
pub trait Clock {
    /// Current monotonic time.
    fn now(&mut self) -> Duration;
}

/// Wall-clock monotonic time, measured from when the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock: every reading advances by a fixed step.
///
/// Used wherever a trace must be byte-for-byte reproducible.
#[derive(Debug, Clone, Copy)]
pub struct SteppedClock {
    next: Duration,
    step: Duration,
}

impl SteppedClock {
    pub fn new(start: Duration, step: Duration) -> Self {
        Self { next: start, step }
    }
}

impl Clock for SteppedClock {
    fn now(&mut self) -> Duration {
        let now = self.next;
        self.next = self.next.saturating_add(self.step);
        now
    }
}
