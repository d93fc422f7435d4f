//! Periodic callback driver
//!
//! The ticker is the only scheduling primitive. It polls the clock every
//! `poll_interval` and, for each tick boundary crossed since the last poll,
//! runs every registered handler once in registration order. A slow poll
//! therefore never swallows ticks: three missed boundaries mean three rounds.

use super::clock::Clock;
use super::tick::{scale, TickTracker};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Passed to every handler on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    /// 1-based tick number since the ticker was created
    pub tick: u64,
    /// Clock time of the boundary being handled
    pub boundary: Duration,
    /// Clock time of the poll that noticed it; may be well after `boundary`
    pub now: Duration,
}

pub trait TickHandler: Send {
    fn on_tick(&mut self, ctx: &TickContext);
}

impl<F> TickHandler for F
where
    F: FnMut(&TickContext) + Send,
{
    fn on_tick(&mut self, ctx: &TickContext) {
        self(ctx)
    }
}

pub struct Ticker {
    clock: Arc<dyn Clock>,
    ticks: TickTracker,
    handlers: Vec<Box<dyn TickHandler>>,
    poll_interval: Duration,
}

impl Ticker {
    /// Handlers are owned by this ticker alone; pass a fresh list per instance
    ///
    /// Polls every `tick_len / 10` unless overridden.
    pub fn new(
        clock: Arc<dyn Clock>,
        tick_len: Duration,
        handlers: Vec<Box<dyn TickHandler>>,
    ) -> Self {
        let now = clock.now();
        Self {
            ticks: TickTracker::new(tick_len, now),
            poll_interval: tick_len / 10,
            clock,
            handlers,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn push_handler(&mut self, handler: Box<dyn TickHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn tick_len(&self) -> Duration {
        self.ticks.tick_len()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run handlers once per boundary crossed since the last poll
    pub fn poll(&mut self) -> u64 {
        let now = self.clock.now();
        let previous_tick = self.ticks.ticks_elapsed();
        let previous_boundary = self.ticks.last_tick();

        let crossed = self.ticks.catch_up(now);
        if crossed > 1 {
            log::debug!("Ticker catching up on {} missed ticks", crossed);
        }

        for i in 1..=crossed {
            let ctx = TickContext {
                tick: previous_tick + i,
                boundary: previous_boundary + scale(self.ticks.tick_len(), i),
                now,
            };
            for handler in self.handlers.iter_mut() {
                handler.on_tick(&ctx);
            }
        }

        crossed
    }

    /// Poll until `shutdown` resolves
    pub async fn run_until<F: Future>(mut self, shutdown: F) {
        log::info!(
            "⏰ Ticker running (tick: {:?}, poll: {:?}, handlers: {})",
            self.ticks.tick_len(),
            self.poll_interval,
            self.handlers.len()
        );

        tokio::pin!(shutdown);
        loop {
            self.poll();

            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Ticker stopping");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    pub async fn run_forever(self) {
        self.run_until(std::future::pending::<()>()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throughput_core::clock::ManualClock;
    use std::sync::Mutex;

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<(&'static str, u64)>>>,
    ) -> Box<dyn TickHandler> {
        let log = log.clone();
        Box::new(move |ctx: &TickContext| log.lock().unwrap().push((name, ctx.tick)))
    }

    #[test]
    fn test_handlers_run_in_order_once_per_boundary() {
        let clock = Arc::new(ManualClock::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ticker = Ticker::new(
            clock.clone(),
            Duration::from_secs(1),
            vec![recorder("ingest", &log), recorder("report", &log)],
        );

        clock.advance(Duration::from_millis(500));
        assert_eq!(ticker.poll(), 0);

        clock.advance(Duration::from_millis(2600));
        assert_eq!(ticker.poll(), 3);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ("ingest", 1),
                ("report", 1),
                ("ingest", 2),
                ("report", 2),
                ("ingest", 3),
                ("report", 3),
            ]
        );
    }

    #[test]
    fn test_context_carries_boundary_times() {
        let clock = Arc::new(ManualClock::starting_at(Duration::from_secs(100)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut ticker = Ticker::new(
            clock.clone(),
            Duration::from_secs(2),
            vec![Box::new(move |ctx: &TickContext| sink.lock().unwrap().push(*ctx)) as Box<dyn TickHandler>],
        );

        clock.set(Duration::from_secs(105));
        ticker.poll();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].boundary, Duration::from_secs(102));
        assert_eq!(seen[1].boundary, Duration::from_secs(104));
        assert!(seen.iter().all(|ctx| ctx.now == Duration::from_secs(105)));
    }

    #[test]
    fn test_tickers_do_not_share_handlers() {
        let clock = Arc::new(ManualClock::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut first = Ticker::new(clock.clone(), Duration::from_secs(1), vec![recorder("a", &log)]);
        let second = Ticker::new(clock.clone(), Duration::from_secs(1), Vec::new());
        first.push_handler(recorder("b", &log));

        assert_eq!(first.handler_count(), 2);
        assert_eq!(second.handler_count(), 0);
    }

    #[test]
    fn test_default_poll_interval_is_tenth_of_tick() {
        let clock = Arc::new(ManualClock::new());
        let ticker = Ticker::new(clock, Duration::from_secs(1), Vec::new());
        assert_eq!(ticker.poll_interval(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_run_until_polls_before_stopping() {
        let clock = Arc::new(ManualClock::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let ticker = Ticker::new(clock.clone(), Duration::from_secs(1), vec![recorder("r", &log)]);

        clock.advance(Duration::from_secs(2));
        ticker.run_until(async {}).await;

        assert_eq!(*log.lock().unwrap(), vec![("r", 1), ("r", 2)]);
    }
}
