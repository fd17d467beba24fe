//! Geometric point filtering for raw sweeps
//!
//! Removes sentinel returns, converts millimetres to metres, gates by
//! squared range and optionally downsamples by raw index. Filters into a
//! caller-owned buffer so the callback hot path never allocates.

use crate::driver::RawPoint;
use crate::wire::Point3D;

/// Filter output buffer bound; a sweep never carries more survivors
pub const MAX_FILTERED_POINTS: usize = 2048;

/// Configuration for the per-point gates
#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    /// Minimum valid range in metres (closer returns may be self-reflection)
    pub min_range: f32,

    /// Maximum valid range in metres (farther returns are unreliable)
    pub max_range: f32,

    /// Keep every Nth raw point by sweep index (1 = keep all)
    pub downsample: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_range: 0.1,
            max_range: 20.0,
            downsample: 1,
        }
    }
}

/// Per-point drop accounting for one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Points removed by the sentinel, range, and downsample gates
    pub filtered: u64,
    /// Points skipped because the output buffer was full
    pub capacity_dropped: u64,
}

/// Sentinel/range/downsample gate over raw millimetre points
#[derive(Debug, Clone)]
pub struct PointFilter {
    min_range_sq: f32,
    max_range_sq: f32,
    downsample: u32,
}

impl PointFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            min_range_sq: config.min_range * config.min_range,
            max_range_sq: config.max_range * config.max_range,
            downsample: config.downsample.max(1),
        }
    }

    /// Filter `raw` into `out` (cleared first), bounded by
    /// [`MAX_FILTERED_POINTS`]
    ///
    /// Survivors keep their sweep traversal order. Downsampling indexes the
    /// raw sweep, not the survivors, so the kept subset is deterministic for
    /// a given sweep regardless of how many points the other gates removed.
    pub fn apply(&self, raw: &[RawPoint], out: &mut Vec<Point3D>) -> FilterOutcome {
        out.clear();
        let mut outcome = FilterOutcome::default();

        for (i, p) in raw.iter().enumerate() {
            if out.len() >= MAX_FILTERED_POINTS {
                outcome.capacity_dropped += 1;
                continue;
            }

            // Sensor sentinel for an invalid return
            if p.x_mm == 0 && p.y_mm == 0 && p.z_mm == 0 {
                outcome.filtered += 1;
                continue;
            }

            let x = p.x_mm as f32 / 1000.0;
            let y = p.y_mm as f32 / 1000.0;
            let z = p.z_mm as f32 / 1000.0;

            let range_sq = x * x + y * y + z * z;
            if range_sq < self.min_range_sq || range_sq > self.max_range_sq {
                outcome.filtered += 1;
                continue;
            }

            if self.downsample > 1 && (i as u32) % self.downsample != 0 {
                outcome.filtered += 1;
                continue;
            }

            out.push(Point3D {
                x,
                y,
                z,
                intensity: p.reflectivity,
            });
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mm(x_mm: i32, y_mm: i32, z_mm: i32) -> RawPoint {
        RawPoint {
            x_mm,
            y_mm,
            z_mm,
            reflectivity: 100,
        }
    }

    #[test]
    fn test_sentinel_points_dropped() {
        let filter = PointFilter::new(FilterConfig::default());
        let raw = vec![mm(0, 0, 0), mm(1000, 0, 0), mm(0, 0, 0)];
        let mut out = Vec::new();

        let outcome = filter.apply(&raw, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(outcome.filtered, 2);
        assert_eq!(out[0].x, 1.0);
    }

    #[test]
    fn test_millimetre_conversion() {
        let filter = PointFilter::new(FilterConfig::default());
        let mut out = Vec::new();
        filter.apply(&[mm(1500, -2500, 500)], &mut out);

        assert_eq!(out[0].x, 1.5);
        assert_eq!(out[0].y, -2.5);
        assert_eq!(out[0].z, 0.5);
        assert_eq!(out[0].intensity, 100);
    }

    #[test]
    fn test_range_gate() {
        let filter = PointFilter::new(FilterConfig {
            min_range: 0.5,
            max_range: 10.0,
            downsample: 1,
        });
        let raw = vec![
            mm(100, 0, 0),    // 0.1 m — too close
            mm(500, 0, 0),    // 0.5 m — at the bound, kept
            mm(5_000, 0, 0),  // 5 m — kept
            mm(10_000, 0, 0), // 10 m — at the bound, kept
            mm(15_000, 0, 0), // 15 m — too far
        ];
        let mut out = Vec::new();

        let outcome = filter.apply(&raw, &mut out);

        assert_eq!(out.len(), 3);
        assert_eq!(outcome.filtered, 2);
    }

    #[test]
    fn test_downsample_uses_raw_index() {
        let filter = PointFilter::new(FilterConfig {
            downsample: 3,
            ..FilterConfig::default()
        });
        // Indices 0 and 3 survive the index gate; index 0 is a sentinel, so
        // only index 3 comes out — the raw index decides, not the survivor
        // position.
        let raw = vec![
            mm(0, 0, 0),
            mm(1000, 0, 0),
            mm(2000, 0, 0),
            mm(3000, 0, 0),
            mm(4000, 0, 0),
        ];
        let mut out = Vec::new();

        let outcome = filter.apply(&raw, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].x, 3.0);
        assert_eq!(outcome.filtered, 4);
    }

    #[test]
    fn test_downsample_one_keeps_all() {
        let filter = PointFilter::new(FilterConfig::default());
        let raw: Vec<RawPoint> = (1..=50).map(|i| mm(i * 100, 0, 0)).collect();
        let mut out = Vec::new();

        filter.apply(&raw, &mut out);

        assert_eq!(out.len(), 50);
    }

    #[test]
    fn test_capacity_bound() {
        let filter = PointFilter::new(FilterConfig::default());
        let raw: Vec<RawPoint> = (0..MAX_FILTERED_POINTS as i32 + 10)
            .map(|_| mm(1000, 0, 0))
            .collect();
        let mut out = Vec::new();

        let outcome = filter.apply(&raw, &mut out);

        assert_eq!(out.len(), MAX_FILTERED_POINTS);
        assert_eq!(outcome.capacity_dropped, 10);
    }

    #[test]
    fn test_output_buffer_reused() {
        let filter = PointFilter::new(FilterConfig::default());
        let mut out = Vec::new();

        filter.apply(&[mm(1000, 0, 0), mm(2000, 0, 0)], &mut out);
        assert_eq!(out.len(), 2);

        filter.apply(&[mm(3000, 0, 0)], &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].x, 3.0);
    }

    #[test]
    fn test_traversal_order_preserved() {
        let filter = PointFilter::new(FilterConfig::default());
        let raw = vec![mm(1000, 0, 0), mm(0, 0, 0), mm(2000, 0, 0), mm(3000, 0, 0)];
        let mut out = Vec::new();

        filter.apply(&raw, &mut out);

        let xs: Vec<f32> = out.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }
}
