//! Trace input: parsing `burstnetsink` debug output and feeding the aggregator

pub mod ingest;
pub mod parser;
pub mod reader;

pub use ingest::TraceIngestor;
pub use parser::TraceParser;
pub use reader::{spawn_line_reader, spawn_tail_reader, LineDrain, TraceTail};
