//! Time-windowed frame assembly
//!
//! Groups parsed records into frames keyed by device timestamp. A frame
//! opens on the first record, collects everything inside
//! `[start_ts, start_ts + frame_period)`, and closes when a record lands at
//! or past the window end — that record seeds the next frame.
//!
//! Late records (older than the open frame's start) and records that would
//! exceed the frame capacity are dropped and counted; an overflow does not
//! close the frame, because an oversized window almost always means a
//! configuration or sensor anomaly and an early close would emit a frame
//! whose time bounds are wrong.
//!
//! The point buffer is preallocated to `max_frame_points` and reused across
//! frames; closing copies the accumulated points into a right-sized owned
//! buffer.

use crate::stats::FrameStats;
use crate::wire::ParsedRecord;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Reorder counting window: a backwards step of this size or more is
/// treated as a wrap artifact, not a reorder
const REORDER_WINDOW: u32 = 1000;

/// Frame builder configuration
#[derive(Debug, Clone, Copy)]
pub struct FrameBuilderConfig {
    /// Frame window length in seconds
    pub frame_period_s: f64,

    /// Capacity bound on points per frame
    pub max_frame_points: usize,
}

impl Default for FrameBuilderConfig {
    fn default() -> Self {
        Self {
            frame_period_s: 0.05,
            max_frame_points: 120_000,
        }
    }
}

/// A closed point-cloud frame, owned by the consumer
#[derive(Debug, Clone)]
pub struct Frame {
    /// Accumulated points in arrival order
    pub xyz: Vec<[f32; 3]>,
    /// Timestamp of the first admitted record
    pub start_ts_ns: u64,
    /// Largest admitted record timestamp
    pub end_ts_ns: u64,
    /// First contributing sequence number
    pub seq_first: u32,
    /// Last contributing sequence number
    pub seq_last: u32,
    /// Number of contributing records
    pub pkt_count: u64,
    /// Total points (equals `xyz.len()`)
    pub point_count: usize,
}

impl Frame {
    /// Device-time span of the frame in seconds
    pub fn duration_s(&self) -> f64 {
        (self.end_ts_ns - self.start_ts_ns) as f64 / 1e9
    }
}

/// Accumulates parsed records into frames by device-time window
pub struct FrameBuilder {
    period_ns: u64,
    max_points: usize,
    stats: Arc<FrameStats>,

    /// Reusable accumulation buffer (capacity retained across frames)
    buf: Vec<[f32; 3]>,
    open: bool,
    start_ts: u64,
    end_ts: u64,
    seq_first: u32,
    seq_last: u32,
    pkt_count: u64,

    /// Sequence tracking spans frames (transport-level diagnostic)
    last_seq: Option<u32>,
}

impl FrameBuilder {
    pub fn new(config: FrameBuilderConfig, stats: Arc<FrameStats>) -> Self {
        Self {
            period_ns: (config.frame_period_s * 1e9) as u64,
            max_points: config.max_frame_points,
            stats,
            buf: Vec::with_capacity(config.max_frame_points),
            open: false,
            start_ts: 0,
            end_ts: 0,
            seq_first: 0,
            seq_last: 0,
            pkt_count: 0,
            last_seq: None,
        }
    }

    /// Add a parsed record; returns a frame when this record closed one
    pub fn add(&mut self, record: &ParsedRecord<'_>) -> Option<Frame> {
        self.accumulate(
            record.device_ts_ns,
            record.seq,
            record.point_count as usize,
            record.xyz(),
        )
    }

    /// Add a bare point batch (the record already unpacked)
    pub fn add_points(&mut self, device_ts_ns: u64, seq: u32, xyz: &[[f32; 3]]) -> Option<Frame> {
        self.accumulate(device_ts_ns, seq, xyz.len(), xyz.iter().copied())
    }

    fn accumulate(
        &mut self,
        ts: u64,
        seq: u32,
        n: usize,
        points: impl Iterator<Item = [f32; 3]>,
    ) -> Option<Frame> {
        if !self.open {
            self.open_frame(ts, seq);
        }

        // Late record: older than the open frame. Dropped, never inserted.
        if ts < self.start_ts {
            self.stats.late_packets.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "late record dropped: seq={}, {} ns before frame start",
                seq,
                self.start_ts - ts
            );
            return None;
        }

        // Window expired: close, reopen seeded with this record, then admit it.
        let mut closed = None;
        if ts >= self.start_ts + self.period_ns {
            closed = self.close_frame();
            self.open_frame(ts, seq);
        }

        self.append(ts, seq, n, points);
        closed
    }

    fn append(&mut self, ts: u64, seq: u32, n: usize, points: impl Iterator<Item = [f32; 3]>) {
        if let Some(last) = self.last_seq {
            let expected = last.wrapping_add(1);
            if seq != expected {
                if seq > expected {
                    self.stats.seq_gaps.fetch_add(1, Ordering::Relaxed);
                    log::debug!("sequence gap: expected {}, got {}", expected, seq);
                } else if seq < last && last - seq < REORDER_WINDOW {
                    self.stats.seq_reorders.fetch_add(1, Ordering::Relaxed);
                    log::debug!("reordered record: seq={} after {}", seq, last);
                }
            }
        }
        self.last_seq = Some(seq);

        // Capacity bound: drop the record, keep the frame open.
        if self.buf.len() + n > self.max_points {
            self.stats.overflow_frames.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "frame overflow: {} + {} > {}, record dropped",
                self.buf.len(),
                n,
                self.max_points
            );
            return;
        }

        self.buf.extend(points);
        self.end_ts = ts;
        self.seq_last = seq;
        self.pkt_count += 1;
        self.stats.packets_added.fetch_add(1, Ordering::Relaxed);
        self.stats.points_added.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn open_frame(&mut self, ts: u64, seq: u32) {
        self.open = true;
        self.start_ts = ts;
        self.end_ts = ts;
        self.seq_first = seq;
        self.seq_last = seq;
        self.pkt_count = 0;
        log::debug!("new frame: start_ts={} ns, seq={}", ts, seq);
    }

    fn close_frame(&mut self) -> Option<Frame> {
        self.open = false;
        if self.buf.is_empty() {
            return None;
        }

        // Copy into a right-sized owned buffer; keep ours for reuse.
        let xyz = self.buf.clone();
        self.buf.clear();

        let frame = Frame {
            point_count: xyz.len(),
            xyz,
            start_ts_ns: self.start_ts,
            end_ts_ns: self.end_ts,
            seq_first: self.seq_first,
            seq_last: self.seq_last,
            pkt_count: self.pkt_count,
        };
        self.stats.frames_built.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "frame closed: {} pts, {} pkts, {:.3} s, seq {}-{}",
            frame.point_count,
            frame.pkt_count,
            frame.duration_s(),
            frame.seq_first,
            frame.seq_last
        );
        Some(frame)
    }

    /// Close and return the open frame, if any; called once at shutdown
    pub fn flush(&mut self) -> Option<Frame> {
        if self.open {
            self.close_frame()
        } else {
            None
        }
    }

    /// Points accumulated in the open frame
    pub fn pending_points(&self) -> usize {
        self.buf.len()
    }
}
