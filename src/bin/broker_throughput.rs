//! Broker Throughput Monitor
//!
//! Taps a broker's debug stream and prints rolling throughput once per tick.
//!
//! ## Usage
//!
//! ```bash
//! burstnetsink -v -p -b tcp://broker:5000 2>&1 | cargo run --release --bin broker_throughput
//! cargo run --release --bin broker_throughput -- --input trace.log --format jsonl
//! ```
//!
//! ## Flags
//!
//! - `--format <table|jsonl>` - report format (overrides BURSTFLOW_REPORT_FORMAT)
//! - `--input <path>` - follow a trace file instead of stdin
//! - `--from-start` - read the followed file from the top
//! - `--exit-on-eof` - stop once stdin ends and has been reported (ignored with `--input`)
//!
//! Every other setting comes from `BURSTFLOW_*` environment variables (see
//! `ThroughputConfig::from_env`). RUST_LOG controls logging (default: info),
//! which goes to stderr so stdout carries only the report.

use burstflow::report::{build_reporter, ReportHandler};
use burstflow::throughput_core::{TickContext, TickHandler};
use burstflow::trace::{spawn_line_reader, spawn_tail_reader, LineDrain, TraceIngestor, TraceTail};
use burstflow::{Clock, SystemClock, ThroughputAggregator, ThroughputConfig, Ticker};
use std::sync::{Arc, Mutex};
use tokio::io::BufReader;
use tokio::sync::{mpsc, Notify};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let mut config = ThroughputConfig::from_env()?;
    config.apply_args(std::env::args().skip(1))?;
    config.validate()?;

    let settings = config.aggregator_settings()?;
    let tick_len = config.tick_len()?;
    let poll_interval = config.poll_interval()?;

    log::info!("🚀 Starting broker throughput monitor");
    log::info!(
        "   Windows: {} bins × {:?}",
        settings.bin_count,
        settings.seconds_per_bin
    );
    log::info!("   Horizons: {:?}s", config.horizons);
    log::info!("   Tick: {:?} (poll every {:?})", tick_len, poll_interval);
    log::info!("   Report format: {}", config.report_format.as_str());
    match &settings.outstanding_max_age {
        Some(age) => log::info!("   Outstanding max age: {:?}", age),
        None => log::info!("   Outstanding max age: none (kept until acked)"),
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let aggregator = Arc::new(Mutex::new(ThroughputAggregator::new(settings.clone(), clock.clone())));

    // Reader task → bounded channel → drained on each tick
    let (tx, rx) = mpsc::channel::<String>(config.channel_buffer);
    let _reader = match &config.input_path {
        Some(path) => {
            let mut tail = TraceTail::new(path.clone()).from_start(config.input_from_start);
            tail.start().await?;
            spawn_tail_reader(tail, tx)
        }
        None => {
            log::info!("📖 Reading trace from stdin");
            spawn_line_reader(BufReader::new(tokio::io::stdin()), tx)
        }
    };

    let input_closed = Arc::new(Notify::new());
    let mut ingestor = TraceIngestor::new(LineDrain::new(rx), aggregator.clone());
    if config.stops_at_eof() {
        ingestor = ingestor.notify_on_close(input_closed.clone());
    } else if config.exit_on_eof {
        log::warn!("⚠️  --exit-on-eof ignored: a followed trace file has no end");
    }

    let mut handlers: Vec<Box<dyn TickHandler>> = Vec::new();
    handlers.push(Box::new(ingestor));
    if settings.outstanding_max_age.is_some() {
        let aggregator = aggregator.clone();
        handlers.push(Box::new(move |_ctx: &TickContext| {
            aggregator
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .evict_stale();
        }));
    }
    let reporter = build_reporter(config.report_format, Box::new(std::io::stdout()));
    handlers.push(Box::new(ReportHandler::new(
        reporter,
        aggregator.clone(),
        config.horizons.clone(),
    )));

    let ticker = Ticker::new(clock, tick_len, handlers).with_poll_interval(poll_interval);

    log::info!("✅ Monitor running");
    ticker
        .run_until(async {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        log::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    log::info!("Interrupted");
                }
                _ = input_closed.notified() => {
                    log::info!("Input finished");
                }
            }
        })
        .await;

    let stats = aggregator.lock().unwrap_or_else(|e| e.into_inner()).stats();
    log::info!(
        "📊 Totals: {} bursts, {} acks ({} unmatched), {} malformed, {} overwritten, {} evicted",
        stats.bursts,
        stats.acks,
        stats.unmatched_acks,
        stats.malformed,
        stats.overwritten,
        stats.evicted
    );

    Ok(())
}
