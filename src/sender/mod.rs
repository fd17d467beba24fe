//! Sender pipeline: timestamp selection, filtering, segmentation, transmit
//!
//! Data flow for one driver callback:
//!
//! ```text
//! RawSweep ─▶ TimestampTracker ─▶ PointFilter ─▶ chunks of ≤105 ─▶ UdpTransmitter
//! ```
//!
//! The whole path runs on the driver's thread inside [`SweepPipeline`]; the
//! only state it shares with the rest of the process is the atomic
//! [`crate::stats::SenderStats`] and the shutdown flag.

pub mod filter;
pub mod pipeline;
pub mod timestamp;
pub mod transmit;

pub use filter::{FilterConfig, FilterOutcome, PointFilter, MAX_FILTERED_POINTS};
pub use pipeline::SweepPipeline;
pub use timestamp::TimestampTracker;
pub use transmit::UdpTransmitter;
