//! Monotonic statistics counters for both pipeline ends
//!
//! Every counter is an independent tally updated with relaxed atomic
//! increments from the hot paths; none gates the correctness of another, so
//! no lock ever wraps them. Counters are never reset during a session — the
//! shutdown reports read them once at the end.

use crate::wire::DecodeError;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Sender-side counters, shared between the driver callback and main thread
#[derive(Debug, Default)]
pub struct SenderStats {
    /// Datagrams handed to the socket successfully
    pub tx_packets: AtomicU64,
    /// Points carried by those datagrams
    pub tx_points: AtomicU64,
    /// Wire bytes carried by those datagrams
    pub tx_bytes: AtomicU64,
    /// Datagrams abandoned (would-block, partial send, socket error)
    pub dropped_packets: AtomicU64,
    /// Raw points removed by the sentinel/range/downsample gates
    pub filtered_points: AtomicU64,
    /// Datagrams that were part of a multi-chunk sweep
    pub segmented_packets: AtomicU64,
    /// Points carried by segmented datagrams
    pub points_segmented: AtomicU64,
    /// Points lost to capacity limits (filter buffer, abandoned sweep tail)
    pub points_dropped_cap: AtomicU64,
    /// Sends that hit EAGAIN / the write timeout
    pub send_would_block: AtomicU64,
    /// Sequence counter wraps (2^32 - 1 → 0 transitions)
    pub seq_wraps: AtomicU32,
    /// Driver callback invocations
    pub callbacks: AtomicU64,
    /// Set once the host-clock timestamp fallback activates (sticky)
    pub ts_fallback: AtomicBool,
}

impl SenderStats {
    /// One-line snapshot for periodic rate logging
    pub fn summary(&self) -> String {
        format!(
            "tx {} pkts ({} pts, {} bytes), drop {}, would-block {}, seg {}, filt {}",
            self.tx_packets.load(Ordering::Relaxed),
            self.tx_points.load(Ordering::Relaxed),
            self.tx_bytes.load(Ordering::Relaxed),
            self.dropped_packets.load(Ordering::Relaxed),
            self.send_would_block.load(Ordering::Relaxed),
            self.segmented_packets.load(Ordering::Relaxed),
            self.filtered_points.load(Ordering::Relaxed),
        )
    }
}

/// Receive-side protocol counters, one per decode outcome
#[derive(Debug, Default)]
pub struct ProtocolStats {
    /// Datagrams received, valid or not
    pub total_packets: AtomicU64,
    /// Datagrams that passed every check
    pub valid_packets: AtomicU64,
    pub crc_failures: AtomicU64,
    pub bad_magic: AtomicU64,
    pub bad_version: AtomicU64,
    pub len_mismatch: AtomicU64,
    pub invalid_count: AtomicU64,
}

impl ProtocolStats {
    /// Route a decode failure to its per-kind counter
    pub fn record_error(&self, err: &DecodeError) {
        let counter = match err {
            DecodeError::TooShort(_) | DecodeError::LengthMismatch { .. } => &self.len_mismatch,
            DecodeError::BadMagic(_) => &self.bad_magic,
            DecodeError::BadVersion(_) => &self.bad_version,
            DecodeError::InvalidCount(_) => &self.invalid_count,
            DecodeError::BadChecksum { .. } => &self.crc_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> String {
        format!(
            "total {}, valid {}, crc-fail {}, bad-magic {}, bad-version {}, len-err {}, count-err {}",
            self.total_packets.load(Ordering::Relaxed),
            self.valid_packets.load(Ordering::Relaxed),
            self.crc_failures.load(Ordering::Relaxed),
            self.bad_magic.load(Ordering::Relaxed),
            self.bad_version.load(Ordering::Relaxed),
            self.len_mismatch.load(Ordering::Relaxed),
            self.invalid_count.load(Ordering::Relaxed),
        )
    }
}

/// Frame-assembly counters
#[derive(Debug, Default)]
pub struct FrameStats {
    pub frames_built: AtomicU64,
    pub packets_added: AtomicU64,
    pub points_added: AtomicU64,
    /// Records older than the open frame's start (dropped)
    pub late_packets: AtomicU64,
    /// Sequence numbers that skipped ahead of the expected successor
    pub seq_gaps: AtomicU64,
    /// Sequence numbers that stepped backwards within the reorder window
    pub seq_reorders: AtomicU64,
    /// Records dropped because they would exceed the frame capacity
    pub overflow_frames: AtomicU64,
}

impl FrameStats {
    pub fn summary(&self) -> String {
        format!(
            "frames {}, pkts {}, pts {}, late {}, gaps {}, reorders {}, overflow {}",
            self.frames_built.load(Ordering::Relaxed),
            self.packets_added.load(Ordering::Relaxed),
            self.points_added.load(Ordering::Relaxed),
            self.late_packets.load(Ordering::Relaxed),
            self.seq_gaps.load(Ordering::Relaxed),
            self.seq_reorders.load(Ordering::Relaxed),
            self.overflow_frames.load(Ordering::Relaxed),
        )
    }
}
