//! Fixed-width text table, one row per tick
//!
//! ```text
//! #   mean points per second        mean acked points per second   ...
//! #  (600sec)   (60sec)    (1sec)     (600sec)   (60sec)    (1sec)   ...
//! # ----------------------------   ------------------------------   ...
//!    1180.25   1302.10   1405.00      1100.00   1290.50    990.00   ...
//! ```
//!
//! The three header lines are repeated every 20 rows.

use super::ThroughputReport;
use crate::throughput_core::{ThroughputSnapshot, TickContext};
use std::io::{self, Write};

const COLUMN: usize = 10;
const COLBREAK: &str = "   ";
const HEADER_EVERY: u64 = 20;

pub struct TableReporter<W: Write> {
    out: W,
    rows_written: u64,
}

impl<W: Write> TableReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(horizons: &[u64]) -> String {
        let group = COLUMN * horizons.len();
        let mut header = String::new();

        header.push('#');
        header.push_str(&center("mean points per second", group.saturating_sub(1)));
        header.push_str(COLBREAK);
        header.push_str(&center("mean acked points per second", group));
        header.push_str(COLBREAK);
        header.push_str(&center("mean burst latency (sec)", group));
        header.push_str(COLBREAK);
        header.push_str(&format!("{:>COLUMN$}\n", "unacked"));

        let labels: String = horizons
            .iter()
            .map(|secs| format!("{:>COLUMN$}", format!("({}sec)", secs)))
            .collect();
        header.push('#');
        header.push_str(labels.get(1..).unwrap_or_default());
        for _ in 0..2 {
            header.push_str(COLBREAK);
            header.push_str(&labels);
        }
        header.push_str(COLBREAK);
        header.push_str(&format!("{:>COLUMN$}\n", "points"));

        header.push_str("# ");
        header.push_str(&"-".repeat(group.saturating_sub(2)));
        for _ in 0..2 {
            header.push_str(COLBREAK);
            header.push_str(&"-".repeat(group));
        }
        header.push_str(COLBREAK);
        header.push_str(&"-".repeat(COLUMN));
        header.push('\n');

        header
    }

    fn row(snapshot: &ThroughputSnapshot) -> String {
        let group = |values: &[f64]| -> String {
            values.iter().map(|v| format!(" {:9.2}", v)).collect()
        };

        format!(
            "{}{COLBREAK}{}{COLBREAK}{}{COLBREAK}{:>COLUMN$}\n",
            group(&snapshot.points_per_second),
            group(&snapshot.acked_points_per_second),
            group(&snapshot.mean_latency_secs),
            snapshot.outstanding_points,
        )
    }
}

impl<W: Write + Send> ThroughputReport for TableReporter<W> {
    fn report(&mut self, _tick: &TickContext, snapshot: &ThroughputSnapshot) -> io::Result<()> {
        if self.rows_written % HEADER_EVERY == 0 {
            self.out.write_all(Self::header(&snapshot.horizons).as_bytes())?;
        }
        self.out.write_all(Self::row(snapshot).as_bytes())?;
        self.out.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    fn format_name(&self) -> &'static str {
        "table"
    }
}

fn center(text: &str, width: usize) -> String {
    format!("{:^width$}", text, width = width)
}
