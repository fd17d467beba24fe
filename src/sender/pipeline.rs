//! Sweep processing pipeline — the driver callback body
//!
//! One `SweepPipeline` instance is owned by the driver callback closure and
//! runs on the driver's thread: shutdown short-circuit, timestamp selection,
//! filtering, segmentation into MTU-sized chunks, transmission. All buffers
//! are preallocated and reused, so a callback allocates nothing.

use crate::driver::{RawSweep, SweepDataType};
use crate::sender::filter::{FilterConfig, PointFilter, MAX_FILTERED_POINTS};
use crate::sender::timestamp::{host_monotonic_ns, DeltaWindow, TimestampTracker};
use crate::sender::transmit::UdpTransmitter;
use crate::stats::SenderStats;
use crate::wire::{Point3D, MAX_POINTS_PER_PACKET, MAX_UDP_PAYLOAD};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Emit a rate line every this many callbacks (at debug level)
const LOG_INTERVAL_CALLBACKS: u64 = 500;

/// Minimum window for a rate computation
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Per-session sweep processor
pub struct SweepPipeline {
    transmitter: UdpTransmitter,
    filter: PointFilter,
    tracker: TimestampTracker,
    deltas: DeltaWindow,
    /// Reusable filter output buffer
    filtered: Vec<Point3D>,
    /// Reusable datagram encode buffer
    scratch: Vec<u8>,
    stats: Arc<SenderStats>,
    running: Arc<AtomicBool>,
    rate_mark: Option<(Instant, u64, u64)>,
    logged_time_source: bool,
}

impl SweepPipeline {
    pub fn new(
        transmitter: UdpTransmitter,
        filter: FilterConfig,
        stats: Arc<SenderStats>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transmitter,
            filter: PointFilter::new(filter),
            tracker: TimestampTracker::new(),
            deltas: DeltaWindow::new(),
            filtered: Vec::with_capacity(MAX_FILTERED_POINTS),
            scratch: Vec::with_capacity(MAX_UDP_PAYLOAD),
            stats,
            running,
            rate_mark: None,
            logged_time_source: false,
        }
    }

    /// Process one driver callback
    pub fn process(&mut self, sweep: &RawSweep<'_>) {
        // Shutdown short-circuit: after the flag flips the callback must
        // return without touching the socket.
        if !self.running.load(Ordering::Relaxed) {
            return;
        }

        if sweep.data_type != SweepDataType::CartesianHigh {
            return;
        }

        let callbacks = self.stats.callbacks.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.logged_time_source {
            self.logged_time_source = true;
            log::debug!(
                "first sweep: time_source={:?}, ts={} ns, dot_num={}",
                sweep.time_source,
                sweep.device_ts_ns(),
                sweep.dot_num()
            );
        }

        let device_ts = self
            .tracker
            .select(sweep.device_ts_ns(), host_monotonic_ns(), &self.stats);
        self.deltas.record(device_ts);

        let outcome = self.filter.apply(sweep.points, &mut self.filtered);
        if outcome.filtered > 0 {
            self.stats
                .filtered_points
                .fetch_add(outcome.filtered, Ordering::Relaxed);
        }
        if outcome.capacity_dropped > 0 {
            log::warn!(
                "filter buffer full: skipped {} points (capacity {})",
                outcome.capacity_dropped,
                MAX_FILTERED_POINTS
            );
            self.stats
                .points_dropped_cap
                .fetch_add(outcome.capacity_dropped, Ordering::Relaxed);
        }

        if !self.filtered.is_empty() {
            self.send_segmented(device_ts);
        }

        if callbacks % LOG_INTERVAL_CALLBACKS == 0 {
            self.log_rates(callbacks);
        }
    }

    /// Slice the filtered buffer into ≤105-point chunks, one datagram each
    ///
    /// Every chunk carries the same device timestamp; sequence numbers come
    /// out strictly consecutive. A failed chunk abandons the rest of the
    /// sweep — delivery effort is per-sweep, never per-retry.
    fn send_segmented(&mut self, device_ts: u64) {
        let total = self.filtered.len();
        let segmented = total > MAX_POINTS_PER_PACKET;
        let mut offset = 0;

        while offset < total {
            let end = (offset + MAX_POINTS_PER_PACKET).min(total);
            let sent =
                self.transmitter
                    .send_chunk(device_ts, &self.filtered[offset..end], &mut self.scratch);

            if !sent {
                let remaining = (total - offset) as u64;
                log::warn!("chunk send failed: dropping {} remaining points", remaining);
                self.stats
                    .points_dropped_cap
                    .fetch_add(remaining, Ordering::Relaxed);
                return;
            }

            if segmented {
                self.stats.segmented_packets.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .points_segmented
                    .fetch_add((end - offset) as u64, Ordering::Relaxed);
            }
            offset = end;
        }
    }

    fn log_rates(&mut self, callbacks: u64) {
        let now = Instant::now();
        let packets = self.stats.tx_packets.load(Ordering::Relaxed);
        let bytes = self.stats.tx_bytes.load(Ordering::Relaxed);

        match self.rate_mark {
            None => self.rate_mark = Some((now, packets, bytes)),
            Some((mark, p0, b0)) => {
                let elapsed = now.duration_since(mark).as_secs_f64();
                if elapsed < RATE_WINDOW.as_secs_f64() {
                    return;
                }
                let pps = (packets - p0) as f64 / elapsed;
                let mbps = ((bytes - b0) * 8) as f64 / elapsed / 1e6;
                log::debug!(
                    "cb #{}: {} ({:.1} pps, {:.2} Mbit/s)",
                    callbacks,
                    self.stats.summary(),
                    pps,
                    mbps
                );
                self.rate_mark = Some((now, packets, bytes));
            }
        }
    }
}

impl Drop for SweepPipeline {
    fn drop(&mut self) {
        // The pipeline is released during teardown, after the driver stops.
        log::info!(
            "timestamp deltas: mean {:.3} ms, stddev {:.3} ms, fallback: {}",
            self.deltas.mean_ms(),
            self.deltas.stddev_ms(),
            if self.tracker.using_fallback() {
                "yes"
            } else {
                "no"
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{RawPoint, TimeSource};
    use crate::wire::decode;
    use std::net::UdpSocket;

    fn sink() -> (UdpSocket, String) {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let addr = sock.local_addr().unwrap().to_string();
        (sock, addr)
    }

    fn make_pipeline(addr: &str, running: Arc<AtomicBool>) -> (SweepPipeline, Arc<SenderStats>) {
        let stats = Arc::new(SenderStats::default());
        let tx = UdpTransmitter::new(
            addr,
            Duration::from_millis(100),
            false,
            Arc::clone(&stats),
        )
        .unwrap();
        let p = SweepPipeline::new(tx, FilterConfig::default(), Arc::clone(&stats), running);
        (p, stats)
    }

    fn sweep_of(points: &[RawPoint], ts: u64) -> RawSweep<'_> {
        RawSweep {
            data_type: SweepDataType::CartesianHigh,
            timestamp: ts.to_le_bytes(),
            time_source: TimeSource::DeviceMonotonic,
            points,
        }
    }

    /// 250 in-range points, none filterable
    fn big_sweep_points() -> Vec<RawPoint> {
        (0..250)
            .map(|i| RawPoint {
                x_mm: 1000 + i,
                y_mm: 0,
                z_mm: 0,
                reflectivity: (i % 256) as u8,
            })
            .collect()
    }

    #[test]
    fn test_segmentation_250_points() {
        let (sock, addr) = sink();
        let running = Arc::new(AtomicBool::new(true));
        let (mut pipeline, stats) = make_pipeline(&addr, running);

        let points = big_sweep_points();
        pipeline.process(&sweep_of(&points, 1_000_000));

        let mut buf = [0u8; 2048];
        let mut counts = Vec::new();
        let mut seqs = Vec::new();
        let mut timestamps = Vec::new();
        let mut received_x = Vec::new();
        for _ in 0..3 {
            let (len, _) = sock.recv_from(&mut buf).unwrap();
            let record = decode(&buf[..len], true).unwrap();
            counts.push(record.point_count);
            seqs.push(record.seq);
            timestamps.push(record.device_ts_ns);
            received_x.extend(record.points().map(|p| p.x));
        }

        assert_eq!(counts, vec![105, 105, 40]);
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(timestamps.iter().all(|&ts| ts == 1_000_000));

        // Segmentation conservation: the union of the datagrams equals the
        // filter-surviving sweep in traversal order.
        let expected_x: Vec<f32> = points.iter().map(|p| p.x_mm as f32 / 1000.0).collect();
        assert_eq!(received_x, expected_x);

        assert_eq!(stats.tx_packets.load(Ordering::Relaxed), 3);
        assert_eq!(stats.tx_points.load(Ordering::Relaxed), 250);
        assert_eq!(stats.segmented_packets.load(Ordering::Relaxed), 3);
        assert_eq!(stats.points_segmented.load(Ordering::Relaxed), 250);
        assert_eq!(stats.callbacks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_small_sweep_is_not_counted_segmented() {
        let (sock, addr) = sink();
        let running = Arc::new(AtomicBool::new(true));
        let (mut pipeline, stats) = make_pipeline(&addr, running);

        let points: Vec<RawPoint> = big_sweep_points().into_iter().take(50).collect();
        pipeline.process(&sweep_of(&points, 1_000_000));

        let mut buf = [0u8; 2048];
        let (len, _) = sock.recv_from(&mut buf).unwrap();
        assert_eq!(decode(&buf[..len], true).unwrap().point_count, 50);
        assert_eq!(stats.segmented_packets.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_shutdown_short_circuits_before_socket() {
        let (sock, addr) = sink();
        let running = Arc::new(AtomicBool::new(false));
        let (mut pipeline, stats) = make_pipeline(&addr, running);

        let points = big_sweep_points();
        pipeline.process(&sweep_of(&points, 1_000_000));

        assert_eq!(stats.callbacks.load(Ordering::Relaxed), 0);
        assert_eq!(stats.tx_packets.load(Ordering::Relaxed), 0);
        sock.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let mut buf = [0u8; 2048];
        assert!(sock.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_non_cartesian_sweep_ignored() {
        let (_sock, addr) = sink();
        let running = Arc::new(AtomicBool::new(true));
        let (mut pipeline, stats) = make_pipeline(&addr, running);

        let points = big_sweep_points();
        let sweep = RawSweep {
            data_type: SweepDataType::Spherical,
            ..sweep_of(&points, 1_000_000)
        };
        pipeline.process(&sweep);

        assert_eq!(stats.callbacks.load(Ordering::Relaxed), 0);
        assert_eq!(stats.tx_packets.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_fully_filtered_sweep_sends_nothing() {
        let (_sock, addr) = sink();
        let running = Arc::new(AtomicBool::new(true));
        let (mut pipeline, stats) = make_pipeline(&addr, running);

        let points = vec![
            RawPoint {
                x_mm: 0,
                y_mm: 0,
                z_mm: 0,
                reflectivity: 0
            };
            10
        ];
        pipeline.process(&sweep_of(&points, 1_000_000));

        assert_eq!(stats.tx_packets.load(Ordering::Relaxed), 0);
        assert_eq!(stats.filtered_points.load(Ordering::Relaxed), 10);
        assert_eq!(stats.callbacks.load(Ordering::Relaxed), 1);
    }
}
