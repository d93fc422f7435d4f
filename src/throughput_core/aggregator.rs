//! Burst/ack throughput aggregator
//!
//! Owns the five rolling windows and the correlation table, and is the only
//! thing allowed to mutate them. Readers go through the derived-metric
//! accessors, which take horizon lists in seconds and return values in the
//! same order.

use super::clock::Clock;
use super::correlator::{AckMatch, BurstKey, EventCorrelator, EvictionSummary, PendingBurst};
use super::record::{RecordError, TraceEvent, TraceRecord};
use super::window::RollingWindow;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Window geometry and the optional outstanding-burst age limit
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSettings {
    pub bin_count: usize,
    pub seconds_per_bin: Duration,
    /// `None` keeps unacknowledged bursts until process exit
    pub outstanding_max_age: Option<Duration>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            bin_count: 600,
            seconds_per_bin: Duration::from_secs(1),
            outstanding_max_age: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AckOutcome {
    Matched(AckMatch),
    /// No outstanding burst under that key; expected after a restart
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    Burst { replaced: Option<PendingBurst> },
    Ack(AckOutcome),
}

/// Lifetime counters, kept for logging and the JSONL report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub bursts: u64,
    pub acks: u64,
    pub unmatched_acks: u64,
    pub malformed: u64,
    pub overwritten: u64,
    pub evicted: u64,
}

/// Every derived metric for one set of horizons
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSnapshot {
    pub horizons: Vec<u64>,
    pub points_per_second: Vec<f64>,
    pub bursts_per_second: Vec<f64>,
    pub acks_per_second: Vec<f64>,
    pub acked_points_per_second: Vec<f64>,
    pub mean_latency_secs: Vec<f64>,
    pub outstanding_counts: Vec<i64>,
    pub outstanding_points: u64,
    pub outstanding_bursts: usize,
    pub oldest_outstanding_secs: Option<f64>,
    pub ingest: IngestStats,
}

pub struct ThroughputAggregator {
    clock: Arc<dyn Clock>,
    points: RollingWindow<u64>,
    bursts: RollingWindow<u64>,
    acked_bursts: RollingWindow<u64>,
    acks_weighted_by_points: RollingWindow<u64>,
    latency_sum: RollingWindow<f64>,
    correlator: EventCorrelator,
    outstanding_max_age: Option<Duration>,
    stats: IngestStats,
}

impl ThroughputAggregator {
    pub fn new(settings: AggregatorSettings, clock: Arc<dyn Clock>) -> Self {
        let counts = || {
            RollingWindow::new(settings.bin_count, settings.seconds_per_bin, clock.clone())
        };

        Self {
            points: counts(),
            bursts: counts(),
            acked_bursts: counts(),
            acks_weighted_by_points: counts(),
            latency_sum: RollingWindow::new(
                settings.bin_count,
                settings.seconds_per_bin,
                clock.clone(),
            ),
            correlator: EventCorrelator::new(),
            outstanding_max_age: settings.outstanding_max_age,
            stats: IngestStats::default(),
            clock,
        }
    }

    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(AggregatorSettings::default(), clock)
    }

    /// Record a burst and count it; returns the entry it overwrote, if any
    pub fn process_burst(
        &mut self,
        identity: &str,
        message_id: &str,
        point_count: u64,
    ) -> Option<PendingBurst> {
        let key = BurstKey::new(identity, message_id);
        let now = self.clock.now();

        let replaced = self.correlator.record_burst(key, point_count, now);
        if let Some(old) = replaced {
            self.stats.overwritten += 1;
            log::debug!(
                "Burst {}/{} overwrote an unacked burst of {} points",
                identity,
                message_id,
                old.point_count
            );
        }

        self.bursts.add(1);
        self.points.add(point_count);
        self.stats.bursts += 1;
        replaced
    }

    /// Match an ack to its burst and fold in latency and acked points
    pub fn process_ack(&mut self, identity: &str, message_id: &str) -> AckOutcome {
        let key = BurstKey::new(identity, message_id);
        let now = self.clock.now();

        let Some(matched) = self.correlator.resolve_ack(&key, now) else {
            self.stats.unmatched_acks += 1;
            log::trace!("Ack for unknown burst {}, ignoring", key);
            return AckOutcome::Unmatched;
        };

        self.acks_weighted_by_points.add(matched.point_count);
        self.acked_bursts.add(1);
        self.latency_sum.add(matched.latency.as_secs_f64());
        self.stats.acks += 1;
        AckOutcome::Matched(matched)
    }

    /// Validate a parsed record and dispatch it
    ///
    /// Malformed records are logged and returned as errors without touching
    /// any window or the correlation table.
    pub fn ingest(&mut self, record: &TraceRecord) -> Result<IngestOutcome, RecordError> {
        let event = match record.validate() {
            Ok(event) => event,
            Err(e) => {
                self.stats.malformed += 1;
                log::warn!("{}. ignoring", e);
                return Err(e);
            }
        };

        Ok(match event {
            TraceEvent::Burst(burst) => IngestOutcome::Burst {
                replaced: self.process_burst(&burst.identity, &burst.message_id, burst.point_count),
            },
            TraceEvent::Ack(ack) => IngestOutcome::Ack(self.process_ack(&ack.identity, &ack.message_id)),
        })
    }

    /// Bursts started minus bursts acknowledged, per horizon
    ///
    /// A burst count, not a point count. Can go negative when acks arrive
    /// for bursts that started before the horizon.
    pub fn outstanding_counts(&mut self, horizons: &[u64]) -> Vec<i64> {
        horizons
            .iter()
            .map(|&h| {
                let k = Duration::from_secs(h);
                self.bursts.sum_over(k) as i64 - self.acked_bursts.sum_over(k) as i64
            })
            .collect()
    }

    /// Points in every burst still awaiting acknowledgement
    pub fn total_outstanding_points(&self) -> u64 {
        self.correlator.outstanding_point_total()
    }

    pub fn outstanding_bursts(&self) -> usize {
        self.correlator.outstanding_entry_count()
    }

    pub fn points_per_second(&mut self, horizons: &[u64]) -> Vec<f64> {
        means(&mut self.points, horizons)
    }

    pub fn bursts_per_second(&mut self, horizons: &[u64]) -> Vec<f64> {
        means(&mut self.bursts, horizons)
    }

    /// Acknowledged bursts per second
    pub fn acks_per_second(&mut self, horizons: &[u64]) -> Vec<f64> {
        means(&mut self.acked_bursts, horizons)
    }

    /// Points carried by acknowledged bursts, per second
    pub fn acked_points_per_second(&mut self, horizons: &[u64]) -> Vec<f64> {
        means(&mut self.acks_weighted_by_points, horizons)
    }

    /// Mean burst latency in seconds; 0 for horizons with no acks
    pub fn mean_latency(&mut self, horizons: &[u64]) -> Vec<f64> {
        horizons
            .iter()
            .map(|&h| {
                let k = Duration::from_secs(h);
                let acked = self.acked_bursts.sum_over(k);
                if acked == 0 {
                    0.0
                } else {
                    self.latency_sum.sum_over(k) / acked as f64
                }
            })
            .collect()
    }

    /// Apply the configured age limit to outstanding bursts
    pub fn evict_stale(&mut self) -> EvictionSummary {
        let Some(max_age) = self.outstanding_max_age else {
            return EvictionSummary::default();
        };

        let summary = self.correlator.evict_older_than(max_age, self.clock.now());
        if summary.bursts > 0 {
            self.stats.evicted += summary.bursts as u64;
            log::info!(
                "Evicted {} unacked bursts ({} points) older than {:?}",
                summary.bursts,
                summary.points,
                max_age
            );
        }
        summary
    }

    pub fn snapshot(&mut self, horizons: &[u64]) -> ThroughputSnapshot {
        let now = self.clock.now();
        ThroughputSnapshot {
            horizons: horizons.to_vec(),
            points_per_second: self.points_per_second(horizons),
            bursts_per_second: self.bursts_per_second(horizons),
            acks_per_second: self.acks_per_second(horizons),
            acked_points_per_second: self.acked_points_per_second(horizons),
            mean_latency_secs: self.mean_latency(horizons),
            outstanding_counts: self.outstanding_counts(horizons),
            outstanding_points: self.total_outstanding_points(),
            outstanding_bursts: self.outstanding_bursts(),
            oldest_outstanding_secs: self
                .correlator
                .oldest_outstanding_age(now)
                .map(|age| age.as_secs_f64()),
            ingest: self.stats,
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }
}

fn means(window: &mut RollingWindow<u64>, horizons: &[u64]) -> Vec<f64> {
    horizons
        .iter()
        .map(|&h| window.mean_over(Duration::from_secs(h)))
        .collect()
}
