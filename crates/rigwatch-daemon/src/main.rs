//! rigwatch Daemon - Main entry point
//!
//! Polls every configured miner and prints one JSON snapshot per line.

mod config;
mod poller;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rigwatch")]
#[command(about = "Mining fleet telemetry poller")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rigwatch.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single polling round and exit
    #[arg(long)]
    once: bool,

    /// Comma-separated fields to collect (default: all)
    #[arg(short, long, value_delimiter = ',')]
    fields: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout carries only snapshots
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("rigwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;
    let backends = poller::build_backends(&config)?;

    info!(
        miners = backends.len(),
        interval_secs = config.poll.interval_secs,
        concurrency = config.poll.concurrency,
        "Configuration loaded"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.poll.interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let snapshots = poller::poll_round(&backends, &args.fields, config.poll.concurrency)
            .await
            .context("polling round failed")?;

        let mut stdout = std::io::stdout().lock();
        for snapshot in &snapshots {
            serde_json::to_writer(&mut stdout, snapshot)?;
            writeln!(stdout)?;
        }
        stdout.flush()?;
        drop(stdout);

        if args.once {
            break;
        }
    }

    Ok(())
}
