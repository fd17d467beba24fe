//! Receiver pipeline: datagram validation and frame assembly
//!
//! A single [`FrameReceiver`] thread owns the bound socket and the frame
//! builder. Each datagram is validated in place ([`crate::wire::decode`]
//! borrows the receive buffer), malformed ones are counted and discarded,
//! and closed frames go out a bounded channel to the consumer:
//!
//! ```text
//! UDP socket ─▶ wire::decode ─▶ FrameBuilder ─▶ crossbeam channel ─▶ consumer
//! ```
//!
//! Parse failures never surface above the codec — the per-kind counters in
//! [`crate::stats::ProtocolStats`] are the only trace they leave.

pub mod frame;

pub use frame::{Frame, FrameBuilder, FrameBuilderConfig};

use crate::config::ReceiverConfig;
use crate::error::Result;
use crate::stats::{FrameStats, ProtocolStats};
use crate::wire;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Receive buffer size; comfortably above the 1400-byte payload bound so
/// oversized junk datagrams are measured (and rejected) at their real length
const MAX_DATAGRAM_SIZE: usize = 2048;

/// Frame channel capacity: small so a stalled consumer sheds frames instead
/// of buffering stale ones
const FRAME_CHANNEL_CAPACITY: usize = 4;

/// Socket read timeout between shutdown-flag checks
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// UDP receiver thread: validates datagrams and emits frames
pub struct FrameReceiver {
    socket: UdpSocket,
    running: Arc<AtomicBool>,
    builder: FrameBuilder,
    validate_checksum: bool,
    proto_stats: Arc<ProtocolStats>,
    frame_tx: Sender<Frame>,
}

impl FrameReceiver {
    /// Bind the socket and create the frame channel
    pub fn new(
        config: &ReceiverConfig,
        running: Arc<AtomicBool>,
        proto_stats: Arc<ProtocolStats>,
        frame_stats: Arc<FrameStats>,
    ) -> Result<(Self, Receiver<Frame>)> {
        let socket = UdpSocket::bind(&config.bind)?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;

        let builder_config = FrameBuilderConfig {
            frame_period_s: config.frame_period_s,
            max_frame_points: config.max_frame_points,
        };
        let (frame_tx, frame_rx) = bounded(FRAME_CHANNEL_CAPACITY);

        log::info!(
            "UDP receiver bound to {} (frame period {} s, max {} pts/frame, checksum {})",
            config.bind,
            config.frame_period_s,
            config.max_frame_points,
            if config.validate_checksum {
                "validated"
            } else {
                "ignored"
            }
        );

        Ok((
            Self {
                socket,
                running,
                builder: FrameBuilder::new(builder_config, frame_stats),
                validate_checksum: config.validate_checksum,
                proto_stats,
                frame_tx,
            },
            frame_rx,
        ))
    }

    /// Actual bound address (useful when binding port 0)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run the receive loop (blocking); flushes the frame builder on exit
    pub fn run(mut self) {
        log::info!("UDP receiver started");

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        while self.running.load(Ordering::Relaxed) {
            let len = match self.socket.recv_from(&mut buf) {
                Ok((len, _src)) => len,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("UDP recv error: {}", e);
                    continue;
                }
            };

            self.proto_stats.total_packets.fetch_add(1, Ordering::Relaxed);

            match wire::decode(&buf[..len], self.validate_checksum) {
                Ok(record) => {
                    self.proto_stats.valid_packets.fetch_add(1, Ordering::Relaxed);
                    if let Some(frame) = self.builder.add(&record) {
                        // Non-blocking: a full channel sheds the frame.
                        self.frame_tx.try_send(frame).ok();
                    }
                }
                Err(e) => {
                    self.proto_stats.record_error(&e);
                    log::debug!("discarding datagram: {}", e);
                }
            }
        }

        // Exactly one flush at shutdown; in-flight points become the final frame.
        if let Some(frame) = self.builder.flush() {
            self.frame_tx.try_send(frame).ok();
        }

        log::info!("UDP receiver stopped");
    }
}
