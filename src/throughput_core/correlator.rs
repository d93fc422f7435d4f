//! Burst/ack correlation table
//!
//! Pairs each burst with its later acknowledgement by `(identity, message id)`
//! so latency can be measured and never-acknowledged bursts counted.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Correlation key for an in-flight burst
///
/// Kept as a pair rather than a concatenated string so that
/// `("ab", "c")` and `("a", "bc")` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BurstKey {
    pub identity: String,
    pub message_id: String,
}

impl BurstKey {
    pub fn new(identity: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            message_id: message_id.into(),
        }
    }
}

impl fmt::Display for BurstKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.identity, self.message_id)
    }
}

/// A burst awaiting acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBurst {
    pub recorded_at: Duration,
    pub point_count: u64,
}

/// Result of matching an ack against the table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckMatch {
    pub latency: Duration,
    pub point_count: u64,
}

/// What `evict_older_than` dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionSummary {
    pub bursts: usize,
    pub points: u64,
}

#[derive(Debug, Default)]
pub struct EventCorrelator {
    outstanding: HashMap<BurstKey, PendingBurst>,
    outstanding_points: u64,
}

impl EventCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a burst until it is acknowledged
    ///
    /// Last write wins: an outstanding entry under the same key is replaced
    /// and returned. Its ack pairing is lost.
    pub fn record_burst(
        &mut self,
        key: BurstKey,
        point_count: u64,
        timestamp: Duration,
    ) -> Option<PendingBurst> {
        let replaced = self.outstanding.insert(
            key,
            PendingBurst {
                recorded_at: timestamp,
                point_count,
            },
        );

        if let Some(old) = replaced {
            self.outstanding_points -= old.point_count;
        }
        self.outstanding_points += point_count;

        replaced
    }

    /// Remove the burst matching `key`, returning its latency and size
    ///
    /// `None` for keys that were never recorded (or already acked). A
    /// timestamp before the burst's (clock regression) yields zero latency.
    pub fn resolve_ack(&mut self, key: &BurstKey, timestamp: Duration) -> Option<AckMatch> {
        let pending = self.outstanding.remove(key)?;
        self.outstanding_points -= pending.point_count;

        Some(AckMatch {
            latency: timestamp.saturating_sub(pending.recorded_at),
            point_count: pending.point_count,
        })
    }

    pub fn outstanding_point_total(&self) -> u64 {
        self.outstanding_points
    }

    pub fn outstanding_entry_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn contains(&self, key: &BurstKey) -> bool {
        self.outstanding.contains_key(key)
    }

    /// Age of the longest-waiting burst
    pub fn oldest_outstanding_age(&self, now: Duration) -> Option<Duration> {
        self.outstanding
            .values()
            .map(|p| p.recorded_at)
            .min()
            .map(|oldest| now.saturating_sub(oldest))
    }

    /// Drop every burst that has waited at least `max_age`
    pub fn evict_older_than(&mut self, max_age: Duration, now: Duration) -> EvictionSummary {
        let mut summary = EvictionSummary::default();

        self.outstanding.retain(|_, pending| {
            let stale = now.saturating_sub(pending.recorded_at) >= max_age;
            if stale {
                summary.bursts += 1;
                summary.points += pending.point_count;
            }
            !stale
        });

        self.outstanding_points -= summary.points;
        summary
    }
}
