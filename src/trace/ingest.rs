//! Tick handler that drains buffered trace lines into the aggregator

use super::parser::TraceParser;
use super::reader::LineDrain;
use crate::throughput_core::{TickContext, TickHandler, ThroughputAggregator};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub struct TraceIngestor {
    drain: LineDrain,
    parser: TraceParser,
    aggregator: Arc<Mutex<ThroughputAggregator>>,
    input_closed: Option<Arc<Notify>>,
    announced_close: bool,
}

impl TraceIngestor {
    pub fn new(drain: LineDrain, aggregator: Arc<Mutex<ThroughputAggregator>>) -> Self {
        Self {
            drain,
            parser: TraceParser::new(),
            aggregator,
            input_closed: None,
            announced_close: false,
        }
    }

    /// Signal `notify` once the input has ended and been fully drained
    pub fn notify_on_close(mut self, notify: Arc<Notify>) -> Self {
        self.input_closed = Some(notify);
        self
    }

    /// Parse and ingest everything currently buffered; returns record count
    pub fn ingest_available(&mut self) -> usize {
        let mut aggregator = self.aggregator.lock().unwrap_or_else(|e| e.into_inner());
        let parser = &mut self.parser;
        let mut records = 0;

        let lines = self.drain.drain(|line| {
            if let Some(record) = parser.push_line(&line) {
                records += 1;
                // Malformed records are logged inside ingest and dropped here
                let _ = aggregator.ingest(&record);
            }
        });

        if lines > 0 {
            log::debug!("Ingested {} lines ({} records)", lines, records);
        }
        records
    }
}

impl TickHandler for TraceIngestor {
    fn on_tick(&mut self, _ctx: &TickContext) {
        self.ingest_available();

        if self.drain.is_closed() && !self.announced_close {
            self.announced_close = true;
            if let Some(notify) = &self.input_closed {
                notify.notify_one();
            }
        }
    }
}
