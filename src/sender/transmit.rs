//! Datagram transmission
//!
//! Owns the UDP socket and the session sequence counter. Sends never
//! retry: a would-block, timeout or partial send abandons the datagram and
//! bumps the drop counters, keeping the driver callback bounded in time.

use crate::stats::SenderStats;
use crate::wire::{self, PacketHeader, Point3D, MAX_UDP_PAYLOAD};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

/// UDP sender with atomic sequence numbering
pub struct UdpTransmitter {
    socket: UdpSocket,
    target: SocketAddr,
    seq: AtomicU32,
    crc_enabled: bool,
    stats: Arc<SenderStats>,
}

impl UdpTransmitter {
    /// Resolve the target, bind an ephemeral socket and set the write timeout
    pub fn new(
        target: &str,
        send_timeout: Duration,
        crc_enabled: bool,
        stats: Arc<SenderStats>,
    ) -> Result<Self> {
        let target = target
            .to_socket_addrs()
            .map_err(|e| Error::Config(format!("invalid target endpoint {}: {}", target, e)))?
            .next()
            .ok_or_else(|| Error::Config(format!("target {} resolved to no address", target)))?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_write_timeout(Some(send_timeout))?;

        log::info!("UDP transmitter ready (target: {})", target);

        Ok(Self {
            socket,
            target,
            seq: AtomicU32::new(0),
            crc_enabled,
            stats,
        })
    }

    /// Destination endpoint
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Encode one chunk into `buf` and send it; returns whether it was sent
    ///
    /// Failures are counted, logged at the appropriate level, and swallowed;
    /// the caller decides what to do with the rest of the sweep.
    pub fn send_chunk(&self, device_ts_ns: u64, points: &[Point3D], buf: &mut Vec<u8>) -> bool {
        let seq = self.next_seq();
        let header = PacketHeader {
            device_ts_ns,
            seq,
            point_count: points.len() as u16,
            flags: 0,
            sensor_id: 0,
            crc32: 0,
        };
        wire::encode_packet(&header, points, self.crc_enabled, buf);
        debug_assert!(buf.len() <= MAX_UDP_PAYLOAD);

        match self.socket.send_to(buf, self.target) {
            Ok(sent) if sent == buf.len() => {
                self.stats.tx_packets.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .tx_points
                    .fetch_add(points.len() as u64, Ordering::Relaxed);
                self.stats
                    .tx_bytes
                    .fetch_add(buf.len() as u64, Ordering::Relaxed);
                true
            }
            Ok(sent) => {
                log::warn!("partial send: {} / {} bytes, dropping", sent, buf.len());
                self.stats.dropped_packets.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                self.stats.dropped_packets.fetch_add(1, Ordering::Relaxed);
                self.stats.send_would_block.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(e) => {
                log::error!("send failed: {}", e);
                self.stats.dropped_packets.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Hand out the next sequence number, counting wraps
    fn next_seq(&self) -> u32 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        if seq == u32::MAX {
            // The stored counter just wrapped to 0.
            self.stats.seq_wraps.fetch_add(1, Ordering::Relaxed);
            log::debug!("sequence counter wrapped at 2^32");
        }
        seq
    }

    #[cfg(test)]
    pub(crate) fn set_seq(&self, value: u32) {
        self.seq.store(value, Ordering::Relaxed);
    }
}
