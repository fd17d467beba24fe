//! megha-rx daemon
//!
//! Receives point-cloud datagrams, assembles time-windowed frames and hands
//! them to a consumer loop (logging here; a SLAM frontend in production).
//!
//! # Usage
//!
//! ```bash
//! # Defaults: bind 0.0.0.0:9999, 50 ms frames
//! megha-rx
//!
//! # With a config file and CLI overrides
//! megha-rx --config megha-rx.toml --frame-period 0.1
//! ```

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use megha_stream::config::ReceiverConfig;
use megha_stream::receiver::{Frame, FrameReceiver};
use megha_stream::stats::{FrameStats, ProtocolStats};
use megha_stream::{checksum, Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Log an aggregate line every this many frames
const FRAME_LOG_INTERVAL: u64 = 100;

/// Command line arguments
#[derive(Parser)]
#[command(name = "megha-rx")]
#[command(about = "Point-cloud UDP stream receiver and frame assembler")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Bind address, "host:port"
    #[arg(short, long, env = "MEGHA_BIND")]
    bind: Option<String>,

    /// Frame window length in seconds
    #[arg(long, env = "MEGHA_FRAME_PERIOD")]
    frame_period: Option<f64>,

    /// Capacity bound on points per frame
    #[arg(long, env = "MEGHA_MAX_FRAME_POINTS")]
    max_frame_points: Option<usize>,

    /// Skip CRC-32 verification even on checksummed datagrams
    #[arg(long, env = "MEGHA_NO_CRC_CHECK")]
    no_crc_check: bool,

    /// Verbose per-event logging
    #[arg(long, env = "MEGHA_DEBUG")]
    debug: bool,
}

impl Args {
    fn into_config(self) -> Result<ReceiverConfig> {
        let mut config = match &self.config {
            Some(path) => ReceiverConfig::load(path)?,
            None => ReceiverConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(frame_period) = self.frame_period {
            config.frame_period_s = frame_period;
        }
        if let Some(max_frame_points) = self.max_frame_points {
            config.max_frame_points = max_frame_points;
        }
        if self.no_crc_check {
            config.validate_checksum = false;
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
    let config = args.into_config()?;
    config.validate()?;

    if config.validate_checksum {
        checksum::self_test()?;
        log::info!("CRC-32 self-test passed");
    }

    let proto_stats = Arc::new(ProtocolStats::default());
    let frame_stats = Arc::new(FrameStats::default());
    let running = Arc::new(AtomicBool::new(true));

    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("error setting Ctrl-C handler: {}", e)))?;

    let (receiver, frames) = FrameReceiver::new(
        &config,
        Arc::clone(&running),
        Arc::clone(&proto_stats),
        Arc::clone(&frame_stats),
    )?;

    let handle = thread::Builder::new()
        .name("udp-receiver".to_string())
        .spawn(move || receiver.run())?;

    log::info!("receiving; press Ctrl-C to stop");

    let mut frame_count: u64 = 0;
    let mut point_total: u64 = 0;

    while running.load(Ordering::Relaxed) {
        match frames.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => {
                frame_count += 1;
                point_total += frame.point_count as u64;
                consume(&frame);
                if frame_count % FRAME_LOG_INTERVAL == 0 {
                    log::info!(
                        "{} frames so far ({} pts, avg {:.0} pts/frame)",
                        frame_count,
                        point_total,
                        point_total as f64 / frame_count as f64
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // The receiver thread flushes on its way out; drain the final frame(s).
    while let Ok(frame) = frames.recv_timeout(Duration::from_millis(300)) {
        frame_count += 1;
        point_total += frame.point_count as u64;
        consume(&frame);
    }

    handle
        .join()
        .map_err(|_| Error::Other("receiver thread panicked".to_string()))?;

    log::info!("protocol: {}", proto_stats.summary());
    log::info!("frames: {}", frame_stats.summary());
    log::info!("consumed {} frames, {} points", frame_count, point_total);
    Ok(())
}

/// Frame delivery point; a SLAM frontend would hook in here
fn consume(frame: &Frame) {
    log::debug!(
        "frame: {} pts, {} pkts, {:.3} s, seq {}-{}, start {} ns",
        frame.point_count,
        frame.pkt_count,
        frame.duration_s(),
        frame.seq_first,
        frame.seq_last,
        frame.start_ts_ns
    );
}
