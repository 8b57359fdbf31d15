// hough.rs — Progressive probabilistic Hough transform (line segments).
//
// The classical PPHT (Matas, Galambos, Kittler 2000), as popularised by
// OpenCV's HoughLinesP:
//
//   1. Collect every edge pixel; mark it "unprocessed" in a mask.
//   2. Pop pixels in random order. Each one votes into a (θ, ρ) accumulator.
//   3. When the best bin for that pixel reaches `threshold`, walk the
//      corridor through the pixel along the bin's direction in both
//      directions, tolerating up to `max_line_gap` consecutive misses.
//   4. If the walk spans `min_line_length` on either axis it is a segment:
//      clear its pixels from the mask and withdraw their votes. Otherwise
//      just clear them.
//
// The walk uses 16.16 fixed point along the minor axis so the corridor is
// exactly one pixel wide.
//
// Random order matters: the same mask can yield slightly different segments
// depending on which pixel completes a bin first. The order comes from a
// seeded ChaCha8 stream, re-seeded on every call, so `detect` is a pure
// function of (mask, config).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::HoughConfig;
use crate::frame::EdgeMask;

/// Fixed-point shift for the corridor walk.
const SHIFT: i32 = 16;

/// A detected line segment in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        LineSegment { x1, y1, x2, y2 }
    }

    pub fn midpoint(&self) -> (f32, f32) {
        ((self.x1 + self.x2) as f32 / 2.0, (self.y1 + self.y2) as f32 / 2.0)
    }

    pub fn length(&self) -> f32 {
        let dx = (self.x2 - self.x1) as f32;
        let dy = (self.y2 - self.y1) as f32;
        dx.hypot(dy)
    }
}

/// Probabilistic Hough segment detector with fixed parameters.
#[derive(Debug, Clone)]
pub struct HoughSegmentDetector {
    config: HoughConfig,
    /// (cos θ / ρ, sin θ / ρ) per angle bin.
    trig: Vec<(f32, f32)>,
}

impl HoughSegmentDetector {
    /// Any positive resolution is accepted. A mask too small for a single
    /// ρ bin at `rho_px` yields no segments.
    pub fn new(config: HoughConfig) -> Self {
        let theta = (config.theta_deg as f64).to_radians();
        let irho = 1.0 / config.rho_px as f64;
        let numangle = config.num_angle_bins().max(1);
        let trig = (0..numangle)
            .map(|n| {
                let ang = n as f64 * theta;
                ((ang.cos() * irho) as f32, (ang.sin() * irho) as f32)
            })
            .collect();
        HoughSegmentDetector { config, trig }
    }

    pub fn config(&self) -> &HoughConfig {
        &self.config
    }

    /// Number of θ bins (180 at 1° resolution).
    pub fn num_angles(&self) -> usize {
        self.trig.len()
    }

    /// Detect segments in `edges`. An empty result is a normal outcome.
    pub fn detect(&self, edges: &EdgeMask) -> Vec<LineSegment> {
        let w = edges.width() as i32;
        let h = edges.height() as i32;
        let numrho = self.config.num_rho_bins(edges.width(), edges.height()) as i32;
        if w == 0 || h == 0 || numrho < 1 {
            return Vec::new();
        }

        let rho_offset = (numrho - 1) / 2;
        let threshold = self.config.threshold as i32;
        let line_length = self.config.min_line_length as i32;
        let line_gap = self.config.max_line_gap as i32;

        let mut accum = vec![0i32; self.trig.len() * numrho as usize];
        let mut pending: Vec<bool> = edges.as_slice().iter().map(|&v| v != 0).collect();
        let mut points: Vec<(i32, i32)> =
            edges.edge_points().map(|(x, y)| (x as i32, y as i32)).collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut lines = Vec::new();

        let bin = |n: usize, x: i32, y: i32| -> usize {
            let (c, s) = self.trig[n];
            // Clamped: with very coarse ρ the outermost bins can round past the ends.
            let r = ((x as f32 * c + y as f32 * s).round() as i32 + rho_offset).clamp(0, numrho - 1);
            n * numrho as usize + r as usize
        };

        let mut count = points.len();
        while count > 0 {
            let idx = rng.gen_range(0..count);
            let (px, py) = points[idx];
            points[idx] = points[count - 1];
            count -= 1;

            if !pending[(py * w + px) as usize] {
                continue;
            }

            // Vote and remember the strongest bin.
            let mut max_val = threshold - 1;
            let mut max_n = 0;
            for n in 0..self.trig.len() {
                let cell = &mut accum[bin(n, px, py)];
                *cell += 1;
                if *cell > max_val {
                    max_val = *cell;
                    max_n = n;
                }
            }
            if max_val < threshold {
                continue;
            }

            // Direction of the line for bin max_n, as a fixed-point step.
            let (c, s) = self.trig[max_n];
            let a = -s;
            let b = c;
            let x_major = a.abs() > b.abs();
            let (dx0, dy0, x0, y0) = if x_major {
                let dy = (b * (1 << SHIFT) as f32 / a.abs()).round() as i32;
                (if a > 0.0 { 1 } else { -1 }, dy, px, (py << SHIFT) + (1 << (SHIFT - 1)))
            } else {
                let dx = (a * (1 << SHIFT) as f32 / b.abs()).round() as i32;
                (dx, if b > 0.0 { 1 } else { -1 }, (px << SHIFT) + (1 << (SHIFT - 1)), py)
            };
            let to_pixel = |x: i32, y: i32| -> (i32, i32) {
                if x_major { (x, y >> SHIFT) } else { (x >> SHIFT, y) }
            };

            // Walk both directions to find the segment ends.
            let mut line_end = [(px, py); 2];
            for (k, end) in line_end.iter_mut().enumerate() {
                let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
                let (mut x, mut y) = (x0, y0);
                let mut gap = 0;
                loop {
                    let (j, i) = to_pixel(x, y);
                    if j < 0 || j >= w || i < 0 || i >= h {
                        break;
                    }
                    if pending[(i * w + j) as usize] {
                        gap = 0;
                        *end = (j, i);
                    } else {
                        gap += 1;
                        if gap > line_gap {
                            break;
                        }
                    }
                    x += dx;
                    y += dy;
                }
            }

            let good_line = (line_end[1].0 - line_end[0].0).abs() >= line_length
                || (line_end[1].1 - line_end[0].1).abs() >= line_length;

            // Second walk: consume the corridor, withdrawing votes on success.
            for (k, &end) in line_end.iter().enumerate() {
                let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
                let (mut x, mut y) = (x0, y0);
                loop {
                    let (j, i) = to_pixel(x, y);
                    let slot = &mut pending[(i * w + j) as usize];
                    if *slot {
                        if good_line {
                            for n in 0..self.trig.len() {
                                accum[bin(n, j, i)] -= 1;
                            }
                        }
                        *slot = false;
                    }
                    if (j, i) == end {
                        break;
                    }
                    x += dx;
                    y += dy;
                }
            }

            if good_line {
                let (x1, y1) = line_end[0];
                let (x2, y2) = line_end[1];
                lines.push(LineSegment::new(x1, y1, x2, y2));
            }
        }

        lines
    }
}

impl Default for HoughSegmentDetector {
    fn default() -> Self {
        Self::new(HoughConfig::default())
    }
}
