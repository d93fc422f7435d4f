//! JSONL reporter - one serialized snapshot per tick

use super::ThroughputReport;
use crate::throughput_core::{ThroughputSnapshot, TickContext};
use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    timestamp: i64,
    tick: u64,
    #[serde(flatten)]
    snapshot: &'a ThroughputSnapshot,
}

pub struct JsonlReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonlReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ThroughputReport for JsonlReporter<W> {
    fn report(&mut self, tick: &TickContext, snapshot: &ThroughputSnapshot) -> io::Result<()> {
        let line = ReportLine {
            timestamp: Utc::now().timestamp(),
            tick: tick.tick,
            snapshot,
        };

        let json = serde_json::to_string(&line)?;
        writeln!(self.out, "{}", json)?;
        self.out.flush()
    }

    fn format_name(&self) -> &'static str {
        "jsonl"
    }
}
