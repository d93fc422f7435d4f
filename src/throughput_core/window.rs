//! Time-driven rolling window of per-tick counters
//!
//! A [`RollingWindow`] is a circular buffer of `bin_count` bins, each covering
//! one `seconds_per_bin` interval. Time advances lazily: every reading or
//! mutating method first reconciles the clock, rotating the current-bin
//! pointer once per elapsed tick and zeroing the bins it lands on. A window
//! that sees no calls for an hour is therefore exactly as correct as one that
//! is polled every millisecond.

use super::clock::Clock;
use super::tick::TickTracker;
use std::fmt::Debug;
use std::iter::Sum;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

/// Values a window bin can hold
///
/// Counts use `u64`. Latency sums use `f64` seconds, so sub-second latencies
/// accumulate without truncation (error is f64 rounding, ~1e-16 relative per add).
pub trait BinValue: Copy + Default + Debug + PartialEq + AddAssign + Sum + Send + Sync {
    fn to_f64(self) -> f64;

    /// Whether the value may be added to a bin
    fn is_addable(&self) -> bool {
        true
    }
}

impl BinValue for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl BinValue for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn is_addable(&self) -> bool {
        self.is_finite() && *self >= 0.0
    }
}

pub struct RollingWindow<T: BinValue> {
    bins: Vec<T>,
    current: usize,
    ticks: TickTracker,
    clock: Arc<dyn Clock>,
}

impl<T: BinValue> RollingWindow<T> {
    /// # Panics
    /// Panics if `bin_count` or `seconds_per_bin` is zero.
    pub fn new(bin_count: usize, seconds_per_bin: Duration, clock: Arc<dyn Clock>) -> Self {
        assert!(bin_count > 0, "rolling window needs at least one bin");
        let now = clock.now();
        Self {
            bins: vec![T::default(); bin_count],
            current: 0,
            ticks: TickTracker::new(seconds_per_bin, now),
            clock,
        }
    }

    /// Rotate past every tick boundary that has elapsed, returning how many
    ///
    /// Only the first `bin_count` rotations need zeroing; beyond that every
    /// bin is already clear and the pointer just keeps moving.
    pub fn advance_if_due(&mut self) -> u64 {
        let crossed = self.ticks.catch_up(self.clock.now());
        if crossed == 0 {
            return 0;
        }

        let n = self.bins.len();
        let to_clear = crossed.min(n as u64) as usize;
        for _ in 0..to_clear {
            self.current = (self.current + 1) % n;
            self.bins[self.current] = T::default();
        }

        let rest = ((crossed - to_clear as u64) % n as u64) as usize;
        self.current = (self.current + rest) % n;

        crossed
    }

    /// Add `n` to the current (still open) bin
    pub fn add(&mut self, n: T) {
        self.advance_if_due();
        if !n.is_addable() {
            log::debug!("Ignoring non-addable window value {:?}", n);
            return;
        }
        self.bins[self.current] += n;
    }

    /// Sum of the newest `ceil(k / seconds_per_bin)` bins, current bin included
    pub fn sum_over(&mut self, k: Duration) -> T {
        self.advance_if_due();
        let count = self.bins_for(k);
        self.newest(count).sum()
    }

    /// Mean per bin over the last `k`, clamped to the ticks actually elapsed
    ///
    /// A window alive for fewer than `k` seconds averages over its lifetime
    /// only. Returns 0.0 when no whole tick has elapsed yet.
    pub fn mean_over(&mut self, k: Duration) -> f64 {
        self.advance_if_due();
        let elapsed = usize::try_from(self.ticks.ticks_elapsed()).unwrap_or(usize::MAX);
        let count = self.bins_for(k).min(elapsed);
        if count == 0 {
            return 0.0;
        }
        let sum: T = self.newest(count).sum();
        sum.to_f64() / count as f64
    }

    /// All bins, oldest first
    pub fn ordered_bins(&mut self) -> Vec<T> {
        self.advance_if_due();
        let split = self.current + 1;
        self.bins[split..]
            .iter()
            .chain(self.bins[..split].iter())
            .copied()
            .collect()
    }

    /// Sum of every bin, i.e. the whole `capacity()` span
    pub fn total(&mut self) -> T {
        self.advance_if_due();
        self.bins.iter().copied().sum()
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn seconds_per_bin(&self) -> Duration {
        self.ticks.tick_len()
    }

    /// Time span covered by all bins together
    pub fn capacity(&self) -> Duration {
        super::tick::scale(self.ticks.tick_len(), self.bins.len() as u64)
    }

    pub fn ticks_elapsed(&self) -> u64 {
        self.ticks.ticks_elapsed()
    }

    pub fn start_time(&self) -> Duration {
        self.ticks.start()
    }

    pub fn last_tick_boundary(&self) -> Duration {
        self.ticks.last_tick()
    }

    /// Number of bins a horizon spans: ceil(k / seconds_per_bin), capped
    fn bins_for(&self, k: Duration) -> usize {
        let width = self.ticks.tick_len().as_nanos();
        let wanted = k.as_nanos().div_ceil(width);
        wanted.min(self.bins.len() as u128) as usize
    }

    /// The newest `count` bins, newest first
    fn newest(&self, count: usize) -> impl Iterator<Item = T> + '_ {
        let n = self.bins.len();
        (0..count).map(move |back| self.bins[(self.current + n - back) % n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throughput_core::clock::ManualClock;

    fn window(bins: usize, clock: &Arc<ManualClock>) -> RollingWindow<u64> {
        RollingWindow::new(bins, Duration::from_secs(1), clock.clone())
    }

    #[test]
    fn test_sum_without_time_passing() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(600, &clock);

        for n in [3, 0, 17, 1, 100] {
            w.add(n);
        }

        assert_eq!(w.sum_over(Duration::from_secs(1)), 121);
        assert_eq!(w.sum_over(Duration::from_secs(60)), 121);
        assert_eq!(w.sum_over(Duration::from_secs(6000)), 121);
        assert_eq!(w.total(), 121);
    }

    #[test]
    fn test_zero_horizon_sums_nothing() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(10, &clock);
        w.add(5);

        assert_eq!(w.sum_over(Duration::ZERO), 0);
        assert_eq!(w.mean_over(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_idle_ticks_zero_newest_bins() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(10, &clock);

        for _ in 0..10 {
            w.add(7);
            clock.advance(Duration::from_secs(1));
        }
        // 3 idle ticks on top of the one already elapsed above
        clock.advance(Duration::from_secs(3));

        let bins = w.ordered_bins();
        assert_eq!(bins.len(), 10);
        assert_eq!(&bins[6..], &[0, 0, 0, 0]);
        assert_eq!(&bins[..6], &[7, 7, 7, 7, 7, 7]);
    }

    #[test]
    fn test_long_gap_clears_every_bin() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(5, &clock);

        for _ in 0..5 {
            w.add(1);
            clock.advance(Duration::from_secs(1));
        }
        clock.advance(Duration::from_secs(3_600));

        assert_eq!(w.ordered_bins(), vec![0; 5]);
        assert_eq!(w.ticks_elapsed(), 3_605);

        w.add(9);
        assert_eq!(w.ordered_bins(), vec![0, 0, 0, 0, 9]);
    }

    #[test]
    fn test_gap_shorter_than_window_keeps_older_bins() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(5, &clock);

        w.add(4);
        clock.advance(Duration::from_secs(2));
        w.add(6);

        assert_eq!(w.ordered_bins(), vec![0, 0, 4, 0, 6]);
        assert_eq!(w.sum_over(Duration::from_secs(2)), 6);
        assert_eq!(w.sum_over(Duration::from_secs(3)), 10);
    }

    #[test]
    fn test_partial_horizon_rounds_up_to_whole_bins() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(10, &clock);

        w.add(1);
        clock.advance(Duration::from_secs(1));
        w.add(2);

        assert_eq!(w.sum_over(Duration::from_millis(500)), 2);
        assert_eq!(w.sum_over(Duration::from_millis(1500)), 3);
    }

    #[test]
    fn test_mean_clamps_to_lifetime() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(600, &clock);

        // Alive for 5 ticks, 10 per tick into the newest five bins
        for _ in 0..5 {
            clock.advance(Duration::from_secs(1));
            w.add(10);
        }

        assert_eq!(w.ticks_elapsed(), 5);
        assert_eq!(w.mean_over(Duration::from_secs(60)), 10.0);
        assert_eq!(w.mean_over(Duration::from_secs(600)), 10.0);
        assert_eq!(w.mean_over(Duration::from_secs(2)), 10.0);
    }

    #[test]
    fn test_mean_before_first_tick_is_zero() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(600, &clock);
        w.add(50);

        assert_eq!(w.mean_over(Duration::from_secs(60)), 0.0);
    }

    #[test]
    fn test_horizon_beyond_capacity_caps_out() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(4, &clock);

        for _ in 0..10 {
            w.add(2);
            clock.advance(Duration::from_secs(1));
        }
        w.add(2);

        assert_eq!(w.capacity(), Duration::from_secs(4));
        assert_eq!(w.sum_over(Duration::from_secs(100)), 8);
        assert_eq!(w.mean_over(Duration::from_secs(100)), 2.0);
    }

    #[test]
    fn test_saturated_window_steady_rate() {
        let clock = Arc::new(ManualClock::new());
        let mut w = window(600, &clock);

        for second in 0..700 {
            clock.set(Duration::from_secs(second));
            w.add(10);
        }

        assert_eq!(w.sum_over(Duration::from_secs(60)), 600);
        assert_eq!(w.sum_over(Duration::from_secs(600)), 6_000);
        assert_eq!(w.mean_over(Duration::from_secs(60)), 10.0);
    }

    #[test]
    fn test_clock_regression_does_not_rotate() {
        let clock = Arc::new(ManualClock::starting_at(Duration::from_secs(100)));
        let mut w = window(5, &clock);

        w.add(1);
        clock.set(Duration::from_secs(50));
        w.add(1);

        assert_eq!(w.advance_if_due(), 0);
        assert_eq!(w.ordered_bins(), vec![0, 0, 0, 0, 2]);
    }

    #[test]
    fn test_fractional_bins_keep_sub_second_values() {
        let clock = Arc::new(ManualClock::new());
        let mut w: RollingWindow<f64> =
            RollingWindow::new(60, Duration::from_secs(1), clock.clone());

        w.add(0.001);
        w.add(0.002);
        w.add(f64::NAN);
        w.add(-1.0);

        let sum = w.sum_over(Duration::from_secs(10));
        assert!((sum - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_sub_second_bins() {
        let clock = Arc::new(ManualClock::new());
        let mut w: RollingWindow<u64> =
            RollingWindow::new(8, Duration::from_millis(250), clock.clone());

        for _ in 0..8 {
            w.add(1);
            clock.advance(Duration::from_millis(250));
        }
        w.add(1);

        // One second spans four quarter-second bins
        assert_eq!(w.sum_over(Duration::from_secs(1)), 4);
        assert_eq!(w.seconds_per_bin(), Duration::from_millis(250));
        assert_eq!(w.capacity(), Duration::from_secs(2));
    }
}
