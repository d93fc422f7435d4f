//! Line parser for `burstnetsink -v -p` debug traces
//!
//! ```text
//! got ingestd ACK
//!     identity:   0x00e43c9880
//!     message id: 0xeb9a
//! received 5222 bytes
//!     identity:   0x00e43c9877
//!     message id: 0xf394
//!     compressed: 5214 bytes
//!     uncompressed:       61133 bytes
//!     points:             405
//! ```
//!
//! A header line opens a block; `key: value` lines fill it. A burst block is
//! complete at `points`, an ack block at `message id`. Fields are kept as
//! text; validation happens at ingest.

use crate::throughput_core::{AckRecord, BurstRecord, TraceRecord};

const BURST_HEADER: &str = "received ";
const ACK_HEADER: &str = "got ingestd ACK";

#[derive(Debug, Clone, Default)]
enum Block {
    #[default]
    Idle,
    Burst(BurstRecord),
    Ack(AckRecord),
}

#[derive(Debug, Default)]
pub struct TraceParser {
    block: Block,
    lines_seen: u64,
    records_emitted: u64,
}

impl TraceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns a record when this line completes a block
    pub fn push_line(&mut self, line: &str) -> Option<TraceRecord> {
        self.lines_seen += 1;
        let line = line.trim();

        let mut completed = None;
        if let Some((key, value)) = line.split_once(':') {
            completed = self.field(key.trim(), value.trim());
        }

        if line.contains(BURST_HEADER) {
            self.discard_partial();
            self.block = Block::Burst(BurstRecord {
                bytes: line.split_whitespace().nth(1).and_then(|b| b.parse().ok()),
                ..BurstRecord::default()
            });
        } else if line.contains(ACK_HEADER) {
            self.discard_partial();
            self.block = Block::Ack(AckRecord::default());
        }

        if completed.is_some() {
            self.records_emitted += 1;
        }
        completed
    }

    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }

    fn field(&mut self, key: &str, value: &str) -> Option<TraceRecord> {
        let value = Some(value.to_string());
        match &mut self.block {
            Block::Idle => None,
            Block::Burst(burst) => {
                match key {
                    "identity" => burst.identity = value,
                    "message id" => burst.message_id = value,
                    "points" => {
                        burst.points = value;
                        return match std::mem::take(&mut self.block) {
                            Block::Burst(burst) => Some(TraceRecord::Burst(burst)),
                            _ => None,
                        };
                    }
                    _ => {}
                }
                None
            }
            Block::Ack(ack) => {
                match key {
                    "identity" => ack.identity = value,
                    "message id" => {
                        ack.message_id = value;
                        return match std::mem::take(&mut self.block) {
                            Block::Ack(ack) => Some(TraceRecord::Ack(ack)),
                            _ => None,
                        };
                    }
                    _ => {}
                }
                None
            }
        }
    }

    fn discard_partial(&mut self) {
        if !matches!(self.block, Block::Idle) {
            log::debug!("Discarding incomplete trace block: {:?}", self.block);
        }
        self.block = Block::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
got ingestd ACK
    identity:   0x00e43c9880
    message id: 0xeb9a
received 5222 bytes
    identity:   0x00e43c9877
    message id: 0xf394
    compressed: 5214 bytes
    uncompressed:       61133 bytes
    points:             405
";

    fn parse_all(text: &str) -> Vec<TraceRecord> {
        let mut parser = TraceParser::new();
        text.lines().filter_map(|l| parser.push_line(l)).collect()
    }

    #[test]
    fn test_sample_trace() {
        let records = parse_all(SAMPLE);

        assert_eq!(
            records,
            vec![
                TraceRecord::Ack(AckRecord {
                    identity: Some("0x00e43c9880".to_string()),
                    message_id: Some("0xeb9a".to_string()),
                }),
                TraceRecord::Burst(BurstRecord {
                    identity: Some("0x00e43c9877".to_string()),
                    message_id: Some("0xf394".to_string()),
                    points: Some("405".to_string()),
                    bytes: Some(5222),
                }),
            ]
        );
    }

    #[test]
    fn test_noise_outside_blocks_is_ignored() {
        let text = "connecting to tcp://broker:5000\nstatus: ok\n\n".to_string() + SAMPLE;
        assert_eq!(parse_all(&text).len(), 2);
    }

    #[test]
    fn test_new_header_discards_incomplete_burst() {
        let text = "\
received 10 bytes
    identity:   0x01
got ingestd ACK
    identity:   0x02
    message id: 0x03
";
        let records = parse_all(text);
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], TraceRecord::Ack(_)));
    }

    #[test]
    fn test_missing_identity_still_emits_record() {
        let text = "\
received 10 bytes
    message id: 0x03
    points:     12
";
        let records = parse_all(text);
        assert_eq!(
            records,
            vec![TraceRecord::Burst(BurstRecord {
                identity: None,
                message_id: Some("0x03".to_string()),
                points: Some("12".to_string()),
                bytes: Some(10),
            })]
        );
        assert!(records[0].validate().is_err());
    }

    #[test]
    fn test_fields_after_completion_are_ignored() {
        let mut parser = TraceParser::new();
        for line in SAMPLE.lines() {
            parser.push_line(line);
        }

        assert!(parser.push_line("    points: 99").is_none());
        assert_eq!(parser.records_emitted(), 2);
        assert_eq!(parser.lines_seen(), 10);
    }
}
