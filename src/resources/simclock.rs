//! Simulation time source.
//!
//! Time is measured in [`SimTime`] units (milliseconds since the clock was
//! started). The registry stamps new entities with [`Clock::now`] and actions
//! advance entities to "now" through the same clock, so every participant
//! agrees on the present.
//!
//! [`SystemClock`] follows the wall clock through a monotonic `Instant`.
//! [`ManualClock`] only moves when told to and is what tests use.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Simulation instant in milliseconds.
pub type SimTime = u64;

/// A monotonic source of simulation time.
pub trait Clock: Send + Sync {
    fn now(&self) -> SimTime;
}

/// Milliseconds elapsed since construction, optionally scaled.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
    time_scale: f64,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            time_scale: 1.0,
        }
    }

    /// Run simulation time faster (> 1.0) or slower (< 1.0) than wall time.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> SimTime {
        let elapsed = self.started.elapsed().as_secs_f64() * 1000.0 * self.time_scale;
        elapsed as SimTime
    }
}

/// Clock that only moves when told to. Never goes backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: SimTime) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move the clock to `at`; earlier values are ignored.
    pub fn set(&self, at: SimTime) {
        self.now.fetch_max(at, Ordering::SeqCst);
    }

    /// Move the clock forward by `delta` and return the new time.
    pub fn advance_by(&self, delta: SimTime) -> SimTime {
        self.now.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SimTime {
        self.now.load(Ordering::SeqCst)
    }
}
