//! Throughput Core - burst/ack rolling-window aggregation
//!
//! Consumes parsed burst and acknowledgement records, pairs them by
//! `(identity, message id)`, and keeps per-tick counters over a trailing
//! window so throughput, latency and outstanding totals can be read for any
//! horizon up to the window's capacity.
//!
//! # Architecture
//!
//! ```text
//! TraceRecord → ThroughputAggregator::ingest
//!     ↓
//! EventCorrelator (burst ↔ ack pairing, latency)
//!     ↓
//! RollingWindow × 5 (points, bursts, acked bursts, acked points, latency)
//!     ↓
//! Ticker → drain input, evict, report (once per tick)
//! ```
//!
//! Windows advance lazily from the injected [`Clock`]; nothing runs in the
//! background.

pub mod aggregator;
pub mod clock;
pub mod correlator;
pub mod record;
pub mod tick;
pub mod ticker;
pub mod window;

pub use aggregator::{
    AckOutcome, AggregatorSettings, IngestOutcome, IngestStats, ThroughputAggregator,
    ThroughputSnapshot,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use correlator::{AckMatch, BurstKey, EventCorrelator, EvictionSummary, PendingBurst};
pub use record::{AckEvent, AckRecord, BurstEvent, BurstRecord, RecordError, TraceEvent, TraceRecord};
pub use tick::TickTracker;
pub use ticker::{TickContext, TickHandler, Ticker};
pub use window::{BinValue, RollingWindow};
