//! megha-stream — point-cloud UDP streaming for SLAM consumers
//!
//! Streams three-dimensional point clouds from a rotating time-of-flight
//! sensor to downstream consumers (mapping, SLAM, visualization) over
//! best-effort UDP. Both ends of the wire live in this crate:
//!
//! ```text
//! sender (megha-tx):
//!   driver callback ─▶ timestamp ─▶ filter ─▶ segment ─▶ encode ─▶ UDP
//!
//! receiver (megha-rx):
//!   UDP ─▶ decode/verify ─▶ frame builder ─▶ frame channel ─▶ consumer
//! ```
//!
//! The wire format is a packed little-endian datagram — a 27-byte header
//! plus up to 105 thirteen-byte points, bounded by one network MTU — with an
//! optional IEEE 802.3 CRC-32. See [`wire`] for the exact layout.
//!
//! Delivery is best-effort by design: drops are counted, never retransmitted;
//! mild reordering is tolerated by the time-windowed [`receiver::FrameBuilder`];
//! device time is adopted as-is (with a host-clock fallback when the sensor
//! clock misbehaves). All steady-state anomalies surface through the
//! monotonic counters in [`stats`], not through per-event errors.

pub mod checksum;
pub mod config;
pub mod devices;
pub mod driver;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod wire;

// Re-export commonly used types
pub use config::{ReceiverConfig, SenderConfig};
pub use driver::{RawPoint, RawSweep, SweepDataType, SweepSource, TimeSource};
pub use error::{Error, Result};
pub use receiver::{Frame, FrameBuilder, FrameBuilderConfig, FrameReceiver};
pub use sender::{FilterConfig, SweepPipeline, UdpTransmitter};
pub use stats::{FrameStats, ProtocolStats, SenderStats};
pub use wire::{PacketHeader, ParsedRecord, Point3D, MAX_POINTS_PER_PACKET};
