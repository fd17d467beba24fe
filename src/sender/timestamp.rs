//! Device timestamp adoption with host-clock fallback
//!
//! Device time is what the frame builder on the far end groups by, so a
//! non-monotonic or implausible device clock is worse than no device clock.
//! The tracker adopts the first timestamp unconditionally, then requires
//! every subsequent one to move strictly forward by less than a second.
//! The first violation switches the session to the host monotonic clock;
//! the switch is sticky and warned about exactly once.

use crate::stats::SenderStats;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;
use std::time::Instant;

/// Largest plausible gap between consecutive sweeps (1 s)
pub const MAX_PLAUSIBLE_DELTA_NS: u64 = 1_000_000_000;

/// Size of the inter-sweep delta window kept for the shutdown report
const DELTA_WINDOW_SIZE: usize = 100;

/// Host monotonic clock in nanoseconds (anchored at first use)
pub fn host_monotonic_ns() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Per-session device timestamp validator
#[derive(Debug)]
pub struct TimestampTracker {
    last_ts: u64,
    first: bool,
    fallback: bool,
}

impl TimestampTracker {
    pub fn new() -> Self {
        Self {
            last_ts: 0,
            first: true,
            fallback: false,
        }
    }

    /// Pick the timestamp to stamp this sweep with
    ///
    /// Returns the device timestamp while it behaves, the host clock forever
    /// after the first misbehavior.
    pub fn select(&mut self, device_ts: u64, host_ts: u64, stats: &SenderStats) -> u64 {
        if self.fallback {
            self.last_ts = host_ts;
            return host_ts;
        }

        if self.first {
            self.first = false;
            self.last_ts = device_ts;
            return device_ts;
        }

        if device_ts > self.last_ts && device_ts - self.last_ts < MAX_PLAUSIBLE_DELTA_NS {
            self.last_ts = device_ts;
            return device_ts;
        }

        log::warn!(
            "device timestamp rejected (ts={} ns, last={} ns); switching to host monotonic clock",
            device_ts,
            self.last_ts
        );
        self.fallback = true;
        stats.ts_fallback.store(true, Ordering::Relaxed);
        self.last_ts = host_ts;
        host_ts
    }

    /// True once the host-clock fallback has activated
    pub fn using_fallback(&self) -> bool {
        self.fallback
    }
}

impl Default for TimestampTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Ring of recent inter-sweep deltas, reported at shutdown
#[derive(Debug)]
pub struct DeltaWindow {
    deltas: [u64; DELTA_WINDOW_SIZE],
    len: usize,
    next: usize,
    last_ts: Option<u64>,
}

impl DeltaWindow {
    pub fn new() -> Self {
        Self {
            deltas: [0; DELTA_WINDOW_SIZE],
            len: 0,
            next: 0,
            last_ts: None,
        }
    }

    /// Record one adopted timestamp
    pub fn record(&mut self, ts: u64) {
        if let Some(last) = self.last_ts {
            let delta = ts.saturating_sub(last);
            self.deltas[self.next] = delta;
            self.next = (self.next + 1) % DELTA_WINDOW_SIZE;
            self.len = (self.len + 1).min(DELTA_WINDOW_SIZE);
        }
        self.last_ts = Some(ts);
    }

    /// Mean inter-sweep delta in milliseconds
    pub fn mean_ms(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let sum: f64 = self.deltas[..self.len].iter().map(|&d| d as f64).sum();
        sum / self.len as f64 / 1e6
    }

    /// Sample standard deviation of the deltas in milliseconds
    pub fn stddev_ms(&self) -> f64 {
        if self.len < 2 {
            return 0.0;
        }
        let mean = self.mean_ms();
        let var: f64 = self.deltas[..self.len]
            .iter()
            .map(|&d| {
                let ms = d as f64 / 1e6;
                (ms - mean) * (ms - mean)
            })
            .sum::<f64>()
            / (self.len - 1) as f64;
        var.sqrt()
    }
}

impl Default for DeltaWindow {
    fn default() -> Self {
        Self::new()
    }
}
