//! Periodic throughput reports
//!
//! A [`ReportHandler`] snapshots the aggregator once per tick and hands the
//! snapshot to whichever [`ThroughputReport`] backend was configured.

pub mod jsonl_writer;
pub mod table;

pub use jsonl_writer::JsonlReporter;
pub use table::TableReporter;

use crate::config::ReportFormat;
use crate::throughput_core::{ThroughputAggregator, ThroughputSnapshot, TickContext, TickHandler};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Output backend for per-tick snapshots
pub trait ThroughputReport: Send {
    fn report(&mut self, tick: &TickContext, snapshot: &ThroughputSnapshot) -> io::Result<()>;

    /// Backend name for logging
    fn format_name(&self) -> &'static str;
}

/// Build the reporter for `format` writing to `out`
pub fn build_reporter(
    format: ReportFormat,
    out: Box<dyn Write + Send>,
) -> Box<dyn ThroughputReport> {
    match format {
        ReportFormat::Table => Box::new(TableReporter::new(out)),
        ReportFormat::Jsonl => Box::new(JsonlReporter::new(out)),
    }
}

pub struct ReportHandler {
    reporter: Box<dyn ThroughputReport>,
    aggregator: Arc<Mutex<ThroughputAggregator>>,
    horizons: Vec<u64>,
}

impl ReportHandler {
    pub fn new(
        reporter: Box<dyn ThroughputReport>,
        aggregator: Arc<Mutex<ThroughputAggregator>>,
        horizons: Vec<u64>,
    ) -> Self {
        Self {
            reporter,
            aggregator,
            horizons,
        }
    }
}

impl TickHandler for ReportHandler {
    fn on_tick(&mut self, ctx: &TickContext) {
        let snapshot = {
            let mut aggregator = self.aggregator.lock().unwrap_or_else(|e| e.into_inner());
            aggregator.snapshot(&self.horizons)
        };

        log::debug!(
            "Tick {}: {} unacked points across {} bursts",
            ctx.tick,
            snapshot.outstanding_points,
            snapshot.outstanding_bursts
        );

        if let Err(e) = self.reporter.report(ctx, &snapshot) {
            log::error!("❌ Failed to write {} report: {}", self.reporter.format_name(), e);
        }
    }
}
