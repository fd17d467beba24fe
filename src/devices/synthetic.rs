//! Synthetic sweep generator
//!
//! Produces Cartesian sweeps from a dedicated thread so the full sender
//! pipeline runs without sensor hardware: a rotating ring of millimetre
//! points with a device-monotonic nanosecond clock, delivered through the
//! same callback a real SDK binding would use.

use crate::driver::{RawPoint, RawSweep, SweepDataType, SweepHandler, SweepSource, TimeSource};
use crate::error::{Error, Result};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Synthetic device parameters
#[derive(Debug, Clone, Copy)]
pub struct SyntheticConfig {
    /// Sweeps per second
    pub sweep_hz: f64,

    /// Returns per sweep
    pub points_per_sweep: usize,

    /// Nominal ring radius in metres
    pub radius_m: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sweep_hz: 50.0,
            points_per_sweep: 300,
            radius_m: 5.0,
        }
    }
}

/// Thread-backed synthetic point-cloud source
pub struct SyntheticLidar {
    config: SyntheticConfig,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticLidar {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    fn generate(config: &SyntheticConfig, phase: f32, out: &mut Vec<RawPoint>) {
        out.clear();
        let n = config.points_per_sweep.max(1);
        for i in 0..n {
            let angle = phase + i as f32 * TAU / n as f32;
            // Gentle radius modulation so consecutive sweeps differ
            let radius_mm = config.radius_m * 1000.0 * (1.0 + 0.1 * (angle * 3.0).sin());
            out.push(RawPoint {
                x_mm: (radius_mm * angle.cos()) as i32,
                y_mm: (radius_mm * angle.sin()) as i32,
                z_mm: ((angle * 2.0).sin() * 200.0) as i32,
                reflectivity: ((i * 255) / n) as u8,
            });
        }
    }
}

impl SweepSource for SyntheticLidar {
    fn start(&mut self, mut handler: SweepHandler) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::Driver("synthetic lidar already started".to_string()));
        }

        self.running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.running);
        let config = self.config;

        let handle = thread::Builder::new()
            .name("synthetic-lidar".to_string())
            .spawn(move || {
                log::info!(
                    "synthetic lidar started ({} Hz, {} pts/sweep)",
                    config.sweep_hz,
                    config.points_per_sweep
                );

                let period = Duration::from_secs_f64(1.0 / config.sweep_hz.max(0.001));
                let period_ns = period.as_nanos() as u64;
                let mut device_ts: u64 = period_ns;
                let mut phase: f32 = 0.0;
                let mut points = Vec::with_capacity(config.points_per_sweep);

                while running.load(Ordering::Relaxed) {
                    Self::generate(&config, phase, &mut points);
                    let sweep = RawSweep {
                        data_type: SweepDataType::CartesianHigh,
                        timestamp: device_ts.to_le_bytes(),
                        time_source: TimeSource::DeviceMonotonic,
                        points: &points,
                    };
                    handler(&sweep);

                    device_ts += period_ns;
                    phase = (phase + 0.05) % TAU;
                    thread::sleep(period);
                }

                log::info!("synthetic lidar stopped");
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| Error::Driver("synthetic lidar thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for SyntheticLidar {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
