//! End-to-end pipeline test: sender → localhost UDP → receiver → frames

use megha_stream::config::ReceiverConfig;
use megha_stream::driver::{RawPoint, RawSweep, SweepDataType, TimeSource};
use megha_stream::receiver::FrameReceiver;
use megha_stream::sender::{FilterConfig, SweepPipeline, UdpTransmitter};
use megha_stream::stats::{FrameStats, ProtocolStats, SenderStats};
use megha_stream::wire;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const MS: u64 = 1_000_000;

fn sweep_points(n: usize) -> Vec<RawPoint> {
    (0..n)
        .map(|i| RawPoint {
            x_mm: 1000 + i as i32,
            y_mm: 500,
            z_mm: -200,
            reflectivity: (i % 256) as u8,
        })
        .collect()
}

fn sweep_of(points: &[RawPoint], ts: u64) -> RawSweep<'_> {
    RawSweep {
        data_type: SweepDataType::CartesianHigh,
        timestamp: ts.to_le_bytes(),
        time_source: TimeSource::DeviceMonotonic,
        points,
    }
}

#[test]
fn test_sweeps_become_frames_end_to_end() {
    let running = Arc::new(AtomicBool::new(true));
    let proto_stats = Arc::new(ProtocolStats::default());
    let frame_stats = Arc::new(FrameStats::default());

    let config = ReceiverConfig {
        bind: "127.0.0.1:0".to_string(),
        frame_period_s: 0.05,
        max_frame_points: 100_000,
        validate_checksum: true,
    };
    let (receiver, frames) = FrameReceiver::new(
        &config,
        Arc::clone(&running),
        Arc::clone(&proto_stats),
        Arc::clone(&frame_stats),
    )
    .unwrap();
    let addr = receiver.local_addr().unwrap();
    let rx_handle = thread::spawn(move || receiver.run());

    // Sender with checksums on, pointed at the receiver.
    let sender_stats = Arc::new(SenderStats::default());
    let transmitter = UdpTransmitter::new(
        &addr.to_string(),
        Duration::from_millis(100),
        true,
        Arc::clone(&sender_stats),
    )
    .unwrap();
    let mut pipeline = SweepPipeline::new(
        transmitter,
        FilterConfig::default(),
        Arc::clone(&sender_stats),
        Arc::clone(&running),
    );

    // Five 250-point sweeps inside one 50 ms window (3 datagrams each),
    // then one past it that rolls the frame over.
    let points = sweep_points(250);
    let base = 1_000_000_000u64;
    for i in 0..5u64 {
        pipeline.process(&sweep_of(&points, base + i * 10 * MS));
    }
    pipeline.process(&sweep_of(&points, base + 60 * MS));

    let frame = frames.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(frame.point_count, 1250);
    assert_eq!(frame.pkt_count, 15);
    assert_eq!(frame.start_ts_ns, base);
    assert_eq!(frame.end_ts_ns, base + 40 * MS);
    assert_eq!(frame.seq_first, 0);
    assert_eq!(frame.seq_last, 14);

    // Wire-side accounting: 6 sweeps × 3 datagrams, all valid.
    assert_eq!(sender_stats.tx_packets.load(Ordering::Relaxed), 18);
    assert_eq!(sender_stats.dropped_packets.load(Ordering::Relaxed), 0);

    // Inject one corrupted datagram: structure intact, checksum wrong.
    let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut bad = Vec::new();
    wire::encode_packet(
        &wire::PacketHeader {
            device_ts_ns: base + 65 * MS,
            seq: 999,
            point_count: 1,
            flags: 0,
            sensor_id: 0,
            crc32: 0,
        },
        &[wire::Point3D {
            x: 1.0,
            y: 1.0,
            z: 1.0,
            intensity: 0,
        }],
        true,
        &mut bad,
    );
    bad[wire::HEADER_SIZE] ^= 0xFF;
    probe.send_to(&bad, addr).unwrap();

    // Let the receiver drain everything, then shut down; the open frame
    // (the 60 ms sweep) is flushed on the way out.
    thread::sleep(Duration::from_millis(300));
    running.store(false, Ordering::Relaxed);

    let last = frames.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(last.point_count, 250);
    assert_eq!(last.start_ts_ns, base + 60 * MS);

    rx_handle.join().unwrap();

    assert_eq!(proto_stats.total_packets.load(Ordering::Relaxed), 19);
    assert_eq!(proto_stats.valid_packets.load(Ordering::Relaxed), 18);
    assert_eq!(proto_stats.crc_failures.load(Ordering::Relaxed), 1);
    assert_eq!(frame_stats.frames_built.load(Ordering::Relaxed), 2);
    assert_eq!(frame_stats.packets_added.load(Ordering::Relaxed), 18);
    assert_eq!(frame_stats.points_added.load(Ordering::Relaxed), 1500);
    assert_eq!(frame_stats.seq_gaps.load(Ordering::Relaxed), 0);
}

#[test]
fn test_unchecksummed_stream_accepted_by_validating_receiver() {
    let running = Arc::new(AtomicBool::new(true));
    let proto_stats = Arc::new(ProtocolStats::default());
    let frame_stats = Arc::new(FrameStats::default());

    let config = ReceiverConfig {
        bind: "127.0.0.1:0".to_string(),
        frame_period_s: 0.05,
        max_frame_points: 100_000,
        validate_checksum: true,
    };
    let (receiver, frames) = FrameReceiver::new(
        &config,
        Arc::clone(&running),
        Arc::clone(&proto_stats),
        frame_stats,
    )
    .unwrap();
    let addr = receiver.local_addr().unwrap();
    let rx_handle = thread::spawn(move || receiver.run());

    // crc32 == 0 on the wire means "not computed": the validating receiver
    // must accept the stream untouched.
    let sender_stats = Arc::new(SenderStats::default());
    let transmitter = UdpTransmitter::new(
        &addr.to_string(),
        Duration::from_millis(100),
        false,
        Arc::clone(&sender_stats),
    )
    .unwrap();
    let mut pipeline = SweepPipeline::new(
        transmitter,
        FilterConfig::default(),
        sender_stats,
        Arc::clone(&running),
    );

    let points = sweep_points(40);
    pipeline.process(&sweep_of(&points, 1_000_000_000));

    thread::sleep(Duration::from_millis(300));
    running.store(false, Ordering::Relaxed);

    let frame = frames.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(frame.point_count, 40);
    rx_handle.join().unwrap();

    assert_eq!(proto_stats.valid_packets.load(Ordering::Relaxed), 1);
    assert_eq!(proto_stats.crc_failures.load(Ordering::Relaxed), 0);
}
