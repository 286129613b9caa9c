//! CLI Entry Point for ir-vlc
//!
//! Provides command-line interface for:
//! - Replaying a recorded raw event log through the receiver on virtual time
//! - Running the receiver live against the simulated beacon
//!
//! # Usage
//!
//! Replay a capture:
//! ```bash
//! ir-vlc replay recordings/ir_raw_20240101_120000.csv
//! ```
//!
//! Simulate a beacon sending two ids, with positional noise:
//! ```bash
//! ir-vlc simulate --id 0xA5 --id 0x3C --jitter 5
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ir_vlc::clock::{Clock, ManualClock, SystemClock};
use ir_vlc::config::{ReceiverConfig, DEFAULT_CONFIG_PATH};
use ir_vlc::logging::{self, OutputFormat, TracingConfig};
use ir_vlc::runner::{self, RunSummary};
use ir_vlc::source::{BeaconSimulator, ReplaySource};
use ir_vlc::storage::RecordingWriter;
use ir_vlc::{Receiver, TickReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ir-vlc")]
#[command(about = "Infrared beacon receiver with stability-gated decoding", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the bit duration in seconds
    #[arg(long, global = true)]
    bit_duration: Option<f64>,

    /// Override the stability radius in sensor units
    #[arg(long, global = true)]
    radius: Option<f64>,

    /// Print every raw axis event and point burst
    #[arg(long, global = true)]
    raw: bool,

    /// Override the recording output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a raw event log (ts,code,val) on a virtual clock
    Replay {
        /// Path to the raw CSV log
        log: PathBuf,

        /// Virtual polling period in milliseconds
        #[arg(long, default_value = "5")]
        tick_ms: u64,
    },

    /// Decode a simulated beacon in real time
    Simulate {
        /// Identifier to transmit, decimal or 0x-prefixed hex (repeatable)
        #[arg(long = "id", value_parser = parse_id, required = true)]
        ids: Vec<u8>,

        /// Positional noise in sensor units
        #[arg(long, default_value = "0")]
        jitter: u16,

        /// Polling period in milliseconds
        #[arg(long, default_value = "5")]
        tick_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let tracing_config = TracingConfig::from_receiver_config(&config)?.with_format(cli.log_format);
    logging::init(tracing_config)?;
    tracing::info!(name = %config.application.name, "receiver starting");

    let summary = match cli.command {
        Commands::Replay { log, tick_ms } => replay(&config, log, tick_ms)?,
        Commands::Simulate {
            ids,
            jitter,
            tick_ms,
        } => simulate(&config, &ids, jitter, tick_ms).await?,
    };

    save_recordings(&config, &summary)?;
    println!(
        "{} id(s) decoded over {} ticks",
        summary.decoded.len(),
        summary.ticks
    );
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ReceiverConfig> {
    let mut config = ReceiverConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(bit_duration) = cli.bit_duration {
        config.decoder.bit_duration_secs = bit_duration;
    }
    if let Some(radius) = cli.radius {
        config.stability.radius = radius;
    }
    if cli.raw {
        config.report.raw_mode = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.storage.output_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn replay(config: &ReceiverConfig, log: PathBuf, tick_ms: u64) -> Result<RunSummary> {
    let mut source = ReplaySource::from_path(&log)?;
    let clock = ManualClock::new();
    let mut receiver = Receiver::new(config, clock.now())?;

    let summary = runner::run_offline(
        &mut receiver,
        &mut source,
        &clock,
        Duration::from_millis(tick_ms.max(1)),
        print_report,
    )?;
    Ok(summary)
}

async fn simulate(
    config: &ReceiverConfig,
    ids: &[u8],
    jitter: u16,
    tick_ms: u64,
) -> Result<RunSummary> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let t0 = clock.now();
    let receiver = Receiver::new(config, t0)?;
    let beacon = BeaconSimulator::new(ids, config.bit_duration()?, t0)?
        .with_jitter(jitter, rand::random());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = runner::run_live(
        receiver,
        beacon,
        clock,
        Duration::from_millis(tick_ms.max(1)),
        shutdown_rx,
        print_report,
    )
    .await?;
    Ok(summary)
}

fn print_report(report: &TickReport) {
    for diagnostic in &report.diagnostics {
        println!("{diagnostic}");
    }
}

fn save_recordings(config: &ReceiverConfig, summary: &RunSummary) -> Result<()> {
    let writer = RecordingWriter::from_config(config);
    for recording in &summary.recordings {
        let files = writer.write(recording)?;
        for path in files.status.iter().chain(files.raw.iter()) {
            println!("Saved: {}", path.display());
        }
    }
    Ok(())
}

fn parse_id(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid id '{s}': {e}"))
}
