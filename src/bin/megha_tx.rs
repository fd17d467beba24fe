//! megha-tx daemon
//!
//! Streams filtered, segmented point-cloud datagrams from a sweep source to
//! a downstream receiver.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic device, defaults
//! megha-tx --target 127.0.0.1:9999
//!
//! # With a config file and CLI overrides
//! megha-tx --config megha-tx.toml --max-range 15.0 --crc
//! ```
//!
//! Environment variables (`MEGHA_TARGET`, `MEGHA_MIN_RANGE`, …) sit between
//! the config file and the CLI flags in precedence.

use clap::Parser;
use megha_stream::config::SenderConfig;
use megha_stream::sender::{FilterConfig, SweepPipeline, UdpTransmitter};
use megha_stream::stats::SenderStats;
use megha_stream::{checksum, devices, Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Delay between the shutdown flag flipping and driver teardown, so
/// in-flight callbacks observe the flag
const QUIESCE: Duration = Duration::from_millis(200);

/// Command line arguments
#[derive(Parser)]
#[command(name = "megha-tx")]
#[command(about = "Point-cloud UDP stream transmitter")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Destination endpoint, "host:port"
    #[arg(short, long, env = "MEGHA_TARGET")]
    target: Option<String>,

    /// Device type ("synthetic")
    #[arg(long, env = "MEGHA_DEVICE")]
    device: Option<String>,

    /// Opaque config path handed to the sensor SDK
    #[arg(long, env = "MEGHA_DRIVER_CONFIG")]
    driver_config: Option<String>,

    /// Minimum range gate in metres
    #[arg(long, env = "MEGHA_MIN_RANGE")]
    min_range: Option<f32>,

    /// Maximum range gate in metres
    #[arg(long, env = "MEGHA_MAX_RANGE")]
    max_range: Option<f32>,

    /// Keep every Nth raw point (1 = keep all)
    #[arg(long, env = "MEGHA_DOWNSAMPLE")]
    downsample: Option<u32>,

    /// Attach CRC-32 checksums to every datagram
    #[arg(long, env = "MEGHA_CRC32")]
    crc: bool,

    /// Verbose per-event logging
    #[arg(long, env = "MEGHA_DEBUG")]
    debug: bool,
}

impl Args {
    /// File config overridden by env/CLI values
    fn into_config(self) -> Result<SenderConfig> {
        let mut config = match &self.config {
            Some(path) => SenderConfig::load(path)?,
            None => SenderConfig::default(),
        };
        if let Some(target) = self.target {
            config.target = target;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(driver_config) = self.driver_config {
            config.driver_config = driver_config;
        }
        if let Some(min_range) = self.min_range {
            config.min_range = min_range;
        }
        if let Some(max_range) = self.max_range {
            config.max_range = max_range;
        }
        if let Some(downsample) = self.downsample {
            config.downsample = downsample;
        }
        if self.crc {
            config.checksum = true;
        }
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    // The wire format is little-endian with no byte swapping.
    if cfg!(target_endian = "big") {
        return Err(Error::BigEndianHost);
    }

    let config = args.into_config()?;
    config.validate()?;

    if config.checksum {
        checksum::self_test()?;
        log::info!("CRC-32 self-test passed");
    }

    log::info!(
        "megha-tx starting: device={}, target={}, range {}-{} m, downsample 1/{}, crc {}",
        config.device,
        config.target,
        config.min_range,
        config.max_range,
        config.downsample,
        if config.checksum { "on" } else { "off" }
    );

    let stats = Arc::new(SenderStats::default());
    let running = Arc::new(AtomicBool::new(true));

    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("error setting Ctrl-C handler: {}", e)))?;

    let transmitter = UdpTransmitter::new(
        &config.target,
        Duration::from_millis(config.send_timeout_ms),
        config.checksum,
        Arc::clone(&stats),
    )?;
    let mut pipeline = SweepPipeline::new(
        transmitter,
        FilterConfig {
            min_range: config.min_range,
            max_range: config.max_range,
            downsample: config.downsample,
        },
        Arc::clone(&stats),
        Arc::clone(&running),
    );

    let mut driver = devices::create_source(&config)?;
    driver.start(Box::new(move |sweep| pipeline.process(sweep)))?;

    log::info!("streaming started; press Ctrl-C to stop");

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    // Teardown order matters: the flag is already set, so callbacks return
    // without touching the socket; give in-flight ones a moment, stop the
    // driver (no further callbacks), and only then drop the pipeline, which
    // closes the socket.
    log::info!("shutting down");
    thread::sleep(QUIESCE);
    driver.stop()?;
    drop(driver);

    report(&stats);
    Ok(())
}

/// Final statistics report
fn report(stats: &SenderStats) {
    let tx_packets = stats.tx_packets.load(Ordering::Relaxed);
    let tx_points = stats.tx_points.load(Ordering::Relaxed);
    let tx_bytes = stats.tx_bytes.load(Ordering::Relaxed);
    let callbacks = stats.callbacks.load(Ordering::Relaxed);

    log::info!("transmission: {} pkts, {} pts, {} bytes", tx_packets, tx_points, tx_bytes);
    if callbacks > 0 {
        log::info!(
            "averages: {:.1} pts/pkt, {:.1} pts/callback over {} callbacks",
            if tx_packets > 0 {
                tx_points as f64 / tx_packets as f64
            } else {
                0.0
            },
            tx_points as f64 / callbacks as f64,
            callbacks
        );
    }
    log::info!(
        "segmentation: {} pkts, {} pts, {} dropped at capacity",
        stats.segmented_packets.load(Ordering::Relaxed),
        stats.points_segmented.load(Ordering::Relaxed),
        stats.points_dropped_cap.load(Ordering::Relaxed)
    );
    log::info!(
        "errors: {} dropped pkts, {} would-block, {} filtered pts, {} seq wraps",
        stats.dropped_packets.load(Ordering::Relaxed),
        stats.send_would_block.load(Ordering::Relaxed),
        stats.filtered_points.load(Ordering::Relaxed),
        stats.seq_wraps.load(Ordering::Relaxed)
    );
    log::info!(
        "timestamp fallback: {}",
        if stats.ts_fallback.load(Ordering::Relaxed) {
            "yes"
        } else {
            "no"
        }
    );
}
