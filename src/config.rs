//! Runtime configuration from environment variables and CLI flags
//!
//! Loaded after `dotenv`, with defaults for everything. Unparseable numeric
//! values fall back to their default with a warning; `validate` then rejects
//! combinations the aggregator cannot run with.

use crate::throughput_core::AggregatorSettings;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Jsonl,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Table => "table",
            ReportFormat::Jsonl => "jsonl",
        }
    }

}

impl FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(ReportFormat::Table),
            "jsonl" | "json" => Ok(ReportFormat::Jsonl),
            _ => Err(ConfigError::UnknownReportFormat(s.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("unknown report format '{0}' (expected 'table' or 'jsonl')")]
    UnknownReportFormat(String),

    #[error("missing value for {0}")]
    MissingArgValue(String),
}

/// Configuration for the broker throughput monitor
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputConfig {
    /// Bins per rolling window
    pub bin_count: usize,

    /// Tick length of every rolling window, in seconds
    pub seconds_per_bin: f64,

    /// Ticker interval (ingest + report), in seconds
    pub tick_secs: f64,

    /// The ticker polls the clock every `tick_secs / poll_divisor`
    pub poll_divisor: u32,

    /// Reporting horizons in seconds, reported in this order
    pub horizons: Vec<u64>,

    pub report_format: ReportFormat,

    /// Follow this trace file instead of reading stdin
    pub input_path: Option<PathBuf>,

    /// Read the followed file from the top rather than from its end
    pub input_from_start: bool,

    /// Capacity of the line channel between reader and ticker
    pub channel_buffer: usize,

    /// Drop unacknowledged bursts older than this; unset keeps them forever
    pub outstanding_max_age_secs: Option<f64>,

    /// Exit after stdin ends and its last lines are reported
    pub exit_on_eof: bool,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            bin_count: 600,
            seconds_per_bin: 1.0,
            tick_secs: 1.0,
            poll_divisor: 10,
            horizons: vec![600, 60, 1],
            report_format: ReportFormat::Table,
            input_path: None,
            input_from_start: false,
            channel_buffer: 10_000,
            outstanding_max_age_secs: None,
            exit_on_eof: false,
        }
    }
}

impl ThroughputConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BURSTFLOW_BIN_COUNT` (default: 600)
    /// - `BURSTFLOW_SECONDS_PER_BIN` (default: 1.0)
    /// - `BURSTFLOW_TICK_SECS` (default: 1.0)
    /// - `BURSTFLOW_POLL_DIVISOR` (default: 10)
    /// - `BURSTFLOW_HORIZONS` (default: 600,60,1)
    /// - `BURSTFLOW_REPORT_FORMAT` (default: table)
    /// - `BURSTFLOW_INPUT_PATH` (default: unset, read stdin)
    /// - `BURSTFLOW_INPUT_FROM_START` (default: false)
    /// - `BURSTFLOW_CHANNEL_BUFFER` (default: 10000)
    /// - `BURSTFLOW_OUTSTANDING_MAX_AGE_SECS` (default: unset)
    /// - `BURSTFLOW_EXIT_ON_EOF` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let report_format = match parsed("BURSTFLOW_REPORT_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.report_format,
        };

        let horizons = match parsed("BURSTFLOW_HORIZONS") {
            Some(raw) => parse_horizons(&raw)?,
            None => defaults.horizons,
        };

        Ok(Self {
            bin_count: number(&parsed, "BURSTFLOW_BIN_COUNT", defaults.bin_count),
            seconds_per_bin: number(&parsed, "BURSTFLOW_SECONDS_PER_BIN", defaults.seconds_per_bin),
            tick_secs: number(&parsed, "BURSTFLOW_TICK_SECS", defaults.tick_secs),
            poll_divisor: number(&parsed, "BURSTFLOW_POLL_DIVISOR", defaults.poll_divisor),
            horizons,
            report_format,
            input_path: parsed("BURSTFLOW_INPUT_PATH").map(PathBuf::from),
            input_from_start: number(&parsed, "BURSTFLOW_INPUT_FROM_START", defaults.input_from_start),
            channel_buffer: number(&parsed, "BURSTFLOW_CHANNEL_BUFFER", defaults.channel_buffer),
            outstanding_max_age_secs: optional_number(&parsed, "BURSTFLOW_OUTSTANDING_MAX_AGE_SECS"),
            exit_on_eof: number(&parsed, "BURSTFLOW_EXIT_ON_EOF", defaults.exit_on_eof),
        })
    }

    /// Apply `--format <table|jsonl>`, `--input <path>`, `--from-start`
    /// and `--exit-on-eof` on top of the environment
    pub fn apply_args<I>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--format" => {
                    let value = args.next().ok_or(ConfigError::MissingArgValue(arg.clone()))?;
                    self.report_format = value.parse()?;
                }
                "--input" => {
                    let value = args.next().ok_or(ConfigError::MissingArgValue(arg.clone()))?;
                    self.input_path = Some(PathBuf::from(value));
                }
                "--from-start" => self.input_from_start = true,
                "--exit-on-eof" => self.exit_on_eof = true,
                other => log::warn!("Ignoring unknown argument: {}", other),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_count == 0 {
            return Err(invalid("BURSTFLOW_BIN_COUNT", "must be at least 1"));
        }
        positive_secs("BURSTFLOW_SECONDS_PER_BIN", self.seconds_per_bin)?;
        positive_secs("BURSTFLOW_TICK_SECS", self.tick_secs)?;
        if self.poll_divisor == 0 {
            return Err(invalid("BURSTFLOW_POLL_DIVISOR", "must be at least 1"));
        }
        if self.horizons.is_empty() {
            return Err(invalid("BURSTFLOW_HORIZONS", "needs at least one horizon"));
        }
        if self.channel_buffer == 0 {
            return Err(invalid("BURSTFLOW_CHANNEL_BUFFER", "must be at least 1"));
        }
        if let Some(age) = self.outstanding_max_age_secs {
            positive_secs("BURSTFLOW_OUTSTANDING_MAX_AGE_SECS", age)?;
        }
        Ok(())
    }

    /// Window settings for the aggregator; call after `validate`
    pub fn aggregator_settings(&self) -> Result<AggregatorSettings, ConfigError> {
        Ok(AggregatorSettings {
            bin_count: self.bin_count,
            seconds_per_bin: positive_secs("BURSTFLOW_SECONDS_PER_BIN", self.seconds_per_bin)?,
            outstanding_max_age: self
                .outstanding_max_age_secs
                .map(|age| positive_secs("BURSTFLOW_OUTSTANDING_MAX_AGE_SECS", age))
                .transpose()?,
        })
    }

    /// Whether the monitor stops once input is exhausted
    ///
    /// Only stdin ends; a followed file is waited on forever, so
    /// `exit_on_eof` has no effect together with `input_path`.
    pub fn stops_at_eof(&self) -> bool {
        self.exit_on_eof && self.input_path.is_none()
    }

    pub fn tick_len(&self) -> Result<Duration, ConfigError> {
        positive_secs("BURSTFLOW_TICK_SECS", self.tick_secs)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        Ok(self.tick_len()? / self.poll_divisor.max(1))
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

fn positive_secs(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(invalid(name, format!("{} is not a positive number of seconds", secs))),
    }
}

fn parse_horizons(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|h| {
            h.parse::<u64>()
                .map_err(|_| invalid("BURSTFLOW_HORIZONS", format!("'{}' is not whole seconds", h)))
        })
        .collect()
}

/// Parse `name` or fall back to `default`, warning on garbage
fn number<T, F>(parsed: &F, name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
    F: Fn(&str) -> Option<String>,
{
    match parsed(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{}={} is invalid, using default {:?}", name, raw, default);
            default
        }),
        None => default,
    }
}

/// Like [`number`] for settings that default to unset
fn optional_number<T, F>(parsed: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = parsed(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("{}={} is invalid, leaving it unset", name, raw);
            None
        }
    }
}
