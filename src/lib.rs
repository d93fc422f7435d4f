//! # burstflow
//!
//! Broker throughput monitor: taps a `burstnetsink` debug trace, pairs each
//! data burst with its ingest acknowledgement, and reports rolling
//! throughput, latency and unacknowledged totals once per tick.
//!
//! ## Module Organization
//!
//! - `throughput_core` - rolling windows, correlation table, aggregator, ticker
//! - `trace` - trace-line parser, input readers, ingest tick handler
//! - `report` - table and JSONL reporters
//! - `config` - environment and CLI configuration

pub mod config;
pub mod report;
pub mod throughput_core;
pub mod trace;

pub use config::{ConfigError, ReportFormat, ThroughputConfig};
pub use throughput_core::{
    Clock, ManualClock, RollingWindow, SystemClock, ThroughputAggregator, ThroughputSnapshot,
    Ticker,
};
