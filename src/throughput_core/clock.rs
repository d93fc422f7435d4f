//! Injected time sources
//!
//! Every time read in the core goes through a [`Clock`]. Timestamps are
//! expressed as a [`Duration`] since the clock's own origin, so production
//! code and tests share the same arithmetic.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source shared by windows, the correlator and the ticker
pub trait Clock: Send + Sync {
    /// Time elapsed since this clock's origin
    fn now(&self) -> Duration;
}

/// Wall-clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for tests and replays
///
/// Starts at zero and only moves when told to. `set` may move it backwards,
/// which is how clock regression is exercised.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: Duration) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs_f64(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    pub fn set(&self, to: Duration) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
