//! Pigtail replay/monitor binary.
//!
//! Drives the tracker without physical radios: observations come from a
//! JSONL file, stdin, or a synthetic generator, and the live catalog is
//! logged at a fixed cadence.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic radio environment
//! pigtail
//!
//! # Replay a capture
//! pigtail --jsonl capture.jsonl
//!
//! # Live pipe from a capture tool
//! capture --json | pigtail --stdin
//! ```
//!
//! `RUST_LOG` controls verbosity (default: info).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use pigtail::source::{
    JsonlSource, ObservationSource, SourceEvent, StdinSource, SyntheticSource,
};
use pigtail::{stationary_ratio, DeviceTracker, EntityKind};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pigtail")]
#[command(about = "Passive proximity monitor (replay harness)")]
#[command(version)]
struct CliArgs {
    /// Replay observations from a JSONL file
    #[arg(long, value_name = "FILE")]
    jsonl: Option<PathBuf>,

    /// Read observation JSONL from stdin
    #[arg(long)]
    stdin: bool,

    /// Watchlist file to load at startup and save on exit
    #[arg(long, value_name = "FILE", default_value = "watchlist.json")]
    watchlist: PathBuf,

    /// Directory to write watchlist JSON + KML into on exit
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Stop after this many seconds (0 = run until ctrl-c or EOF)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Rows to show per snapshot
    #[arg(long, default_value = "10")]
    rows: usize,

    /// Seed for the synthetic source
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Milliseconds between synthetic observations
    #[arg(long, default_value = "40")]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut tracker = DeviceTracker::new();
    tracker
        .begin_with_watchlist(&args.watchlist)
        .context("failed to start tracker")?;

    let source: Box<dyn ObservationSource> = if let Some(path) = &args.jsonl {
        Box::new(
            JsonlSource::open(path)
                .await
                .with_context(|| format!("cannot open {}", path.display()))?,
        )
    } else if args.stdin {
        Box::new(StdinSource::new())
    } else {
        Box::new(SyntheticSource::new(args.seed, args.tick_ms))
    };
    info!("observation source: {}", source.source_name());

    // Feed task: source -> queue, exactly like a radio callback would.
    let sender = tracker.sender();
    let feed = tokio::spawn(feed_observations(source, sender));

    // Report loop until EOF, ctrl-c, or the duration elapses.
    let mut report = tokio::time::interval(std::time::Duration::from_secs(2));
    let deadline = (args.duration > 0)
        .then(|| tokio::time::Instant::now() + std::time::Duration::from_secs(args.duration));

    loop {
        tokio::select! {
            _ = report.tick() => log_snapshot(&tracker, args.rows),
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = feed_done(&feed) => {
                info!("source exhausted");
                break;
            }
            _ = sleep_until_deadline(deadline) => {
                info!("duration elapsed");
                break;
            }
        }
    }

    log_snapshot(&tracker, args.rows);

    // Persist the watchlist (and KML alongside it when requested).
    if let Err(e) = tracker.write_watchlist_file(&args.watchlist) {
        warn!("watchlist save failed: {}", e);
    }
    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
        if let Err(e) = tracker.output_lists(dir) {
            warn!("list export failed: {}", e);
        }
    }

    feed.abort();
    tracker.shutdown().await;
    Ok(())
}

/// Drain the source into the observation queue. Queue-full drops are the
/// tracker's loss policy; the feed never waits for capacity.
async fn feed_observations(
    mut source: Box<dyn ObservationSource>,
    sender: pigtail::ObservationSender,
) {
    loop {
        match source.next_observation().await {
            Ok(SourceEvent::Observation(obs)) => {
                sender.send(obs);
            }
            Ok(SourceEvent::Eof) => break,
            Err(e) => {
                warn!("source error: {}", e);
                break;
            }
        }
    }
}

async fn feed_done(feed: &tokio::task::JoinHandle<()>) {
    while !feed.is_finished() {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(t) => tokio::time::sleep_until(t).await,
        None => std::future::pending().await,
    }
}

/// Log the top of the catalog: one line per entity, strongest signal of
/// interest first.
fn log_snapshot(tracker: &DeviceTracker, rows: usize) {
    let ratio = stationary_ratio(tracker.now_s(), tracker.last_env_tick_s());
    let views = tracker.build_snapshot(512, ratio);
    let stats = tracker.stats();

    info!(
        "catalog: {} entities | segment {} (moves {}) | processed {} | drops {}",
        views.len(),
        tracker.segment_id(),
        tracker.move_segments(),
        stats.processed,
        stats.queue_full_drops,
    );

    for v in views.iter().take(rows) {
        let label = match v.kind {
            EntityKind::WifiAp => v.ssid.to_string_lossy(),
            _ if v.tracker_type != pigtail::TrackerType::Unknown => {
                v.tracker_type.name().to_string()
            }
            _ => v.vendor.display_name().to_string(),
        };
        info!(
            "  {:>3} {:10} {} {:>4} dBm score {:>5.1} {:12} {}{}",
            v.index,
            v.kind.name(),
            v.addr,
            v.rssi,
            v.score,
            label,
            if v.is_watching() { "[watch] " } else { "" },
            if v.has_geo() { "[geo]" } else { "" },
        );
    }
}
