//! Tick boundary bookkeeping shared by rolling windows and the ticker

use std::time::Duration;

/// Tracks how many whole ticks have passed since construction
///
/// `catch_up` is the only mutator: it moves `last_tick` forward by whole
/// multiples of `tick_len` and reports how many boundaries were crossed.
/// A `now` earlier than `last_tick` (clock regression) crosses nothing.
#[derive(Debug, Clone)]
pub struct TickTracker {
    tick_len: Duration,
    start: Duration,
    last_tick: Duration,
    ticks_elapsed: u64,
}

impl TickTracker {
    /// # Panics
    /// Panics if `tick_len` is zero.
    pub fn new(tick_len: Duration, now: Duration) -> Self {
        assert!(!tick_len.is_zero(), "tick length must be non-zero");
        Self {
            tick_len,
            start: now,
            last_tick: now,
            ticks_elapsed: 0,
        }
    }

    /// Advance past every boundary at or before `now`, returning the count
    pub fn catch_up(&mut self, now: Duration) -> u64 {
        let Some(elapsed) = now.checked_sub(self.last_tick) else {
            return 0;
        };

        let crossed = (elapsed.as_nanos() / self.tick_len.as_nanos()) as u64;
        if crossed > 0 {
            self.last_tick += scale(self.tick_len, crossed);
            self.ticks_elapsed += crossed;
        }
        crossed
    }

    pub fn tick_len(&self) -> Duration {
        self.tick_len
    }

    pub fn start(&self) -> Duration {
        self.start
    }

    /// Boundary of the most recent tick that has been caught up to
    pub fn last_tick(&self) -> Duration {
        self.last_tick
    }

    pub fn ticks_elapsed(&self) -> u64 {
        self.ticks_elapsed
    }
}

/// `d * n` without the `u32` limit of `Duration`'s `Mul`
pub(crate) fn scale(d: Duration, n: u64) -> Duration {
    let total = d.as_nanos().saturating_mul(n as u128);
    let secs = (total / 1_000_000_000).min(u64::MAX as u128) as u64;
    Duration::new(secs, (total % 1_000_000_000) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_up_counts_whole_ticks() {
        let mut ticks = TickTracker::new(Duration::from_secs(1), Duration::ZERO);

        assert_eq!(ticks.catch_up(Duration::from_millis(999)), 0);
        assert_eq!(ticks.catch_up(Duration::from_millis(1000)), 1);
        assert_eq!(ticks.catch_up(Duration::from_millis(4500)), 3);
        assert_eq!(ticks.ticks_elapsed(), 4);
        assert_eq!(ticks.last_tick(), Duration::from_secs(4));
    }

    #[test]
    fn test_clock_regression_crosses_nothing() {
        let mut ticks = TickTracker::new(Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(ticks.catch_up(Duration::from_secs(5)), 0);
        assert_eq!(ticks.last_tick(), Duration::from_secs(10));
        assert_eq!(ticks.catch_up(Duration::from_secs(12)), 2);
    }

    #[test]
    fn test_fractional_tick_length() {
        let mut ticks = TickTracker::new(Duration::from_millis(250), Duration::ZERO);

        assert_eq!(ticks.catch_up(Duration::from_secs(1)), 4);
        assert_eq!(ticks.catch_up(Duration::from_millis(1600)), 2);
        assert_eq!(ticks.last_tick(), Duration::from_millis(1500));
    }

    #[test]
    fn test_scale_past_u32() {
        let d = scale(Duration::from_secs(1), 5_000_000_000);
        assert_eq!(d, Duration::from_secs(5_000_000_000));
    }
}
