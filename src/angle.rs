// angle.rs — Circular angle arithmetic, bisector resolution, circular EMA.
//
// Everything here works in degrees on the circle [0, 360). Image
// coordinates have y pointing down, so an image-axis azimuth of 0° points
// right and 90° points down; `resolve` adds 90° to turn the bisector into
// the compass convention the HUD needle uses.

use crate::pair::Pair;

/// Reduce any finite angle to [0, 360).
#[inline]
pub fn normalize_deg(a: f32) -> f32 {
    let r = a.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if r >= 360.0 { 0.0 } else { r }
}

/// Unsigned circular distance between two azimuths, in [0, 180].
#[inline]
pub fn circular_distance(a: f32, b: f32) -> f32 {
    let d = normalize_deg(a - b);
    d.min(360.0 - d)
}

/// Shortest signed step from `from` to `to`, in [-180, 180).
#[inline]
pub fn signed_delta(from: f32, to: f32) -> f32 {
    (to - from + 540.0).rem_euclid(360.0) - 180.0
}

/// Bisector of the minor arc between `a` and `b`, in image-axis convention.
pub fn bisector(a: f32, b: f32) -> f32 {
    let a = normalize_deg(a);
    let b = normalize_deg(b);
    let diff = normalize_deg(b - a + 360.0);
    if diff <= 180.0 {
        normalize_deg(a + diff / 2.0)
    } else {
        normalize_deg(a - (360.0 - diff) / 2.0 + 360.0)
    }
}

/// Resolve a view-cone pair to a compass azimuth in [0, 360).
pub fn resolve(pair: Pair) -> f32 {
    normalize_deg(bisector(pair.a, pair.b) + 90.0)
}

/// Round a smoothed azimuth to the integer degree that gets published.
#[inline]
pub fn to_published(azimuth: f32) -> u16 {
    (azimuth.round() as u32 % 360) as u16
}

/// Target rotation for a needle currently drawn at `current` so that it
/// turns the short way to `azimuth`. The result may leave [0, 360); callers
/// animating a rotation property interpolate straight towards it.
pub fn needle_target(current: f32, azimuth: f32) -> f32 {
    current + signed_delta(current, azimuth)
}

// ---------------------------------------------------------------------------
// Circular EMA
// ---------------------------------------------------------------------------

/// Exponential moving average on the circle.
///
/// The first sample is taken as-is. Later samples move the state by
/// `alpha` times the shortest signed step, so 350° → 10° goes forward
/// through 0° instead of swinging back across 180°.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularEma {
    alpha: f32,
    value: Option<f32>,
}

impl CircularEma {
    pub fn new(alpha: f32) -> Self {
        CircularEma { alpha, value: None }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Current smoothed value, `None` before the first sample.
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    /// Feed one sample and return the new smoothed value.
    pub fn update(&mut self, sample: f32) -> f32 {
        let sample = normalize_deg(sample);
        let next = match self.value {
            None => sample,
            Some(prev) => normalize_deg(prev + self.alpha * signed_delta(prev, sample)),
        };
        self.value = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn normalize_wraps_both_ways() {
        assert_eq!(normalize_deg(0.0), 0.0);
        assert_eq!(normalize_deg(360.0), 0.0);
        assert_eq!(normalize_deg(-10.0), 350.0);
        assert_eq!(normalize_deg(725.0), 5.0);
        assert!(normalize_deg(-1e-7) < 360.0);
    }

    #[test]
    fn circular_distance_is_symmetric_and_short() {
        assert_eq!(circular_distance(10.0, 350.0), 20.0);
        assert_eq!(circular_distance(350.0, 10.0), 20.0);
        assert_eq!(circular_distance(0.0, 180.0), 180.0);
        assert_eq!(circular_distance(10.0, 250.0), 120.0);
    }

    #[test]
    fn signed_delta_crosses_zero_forward() {
        assert_eq!(signed_delta(350.0, 10.0), 20.0);
        assert_eq!(signed_delta(10.0, 350.0), -20.0);
        // Antipodal steps resolve to -180.
        assert_eq!(signed_delta(0.0, 180.0), -180.0);
    }

    #[test]
    fn bisector_takes_minor_arc() {
        assert!(close(bisector(10.0, 130.0), 70.0));
        assert!(close(bisector(130.0, 10.0), 70.0));
        // Arc across 0°.
        assert!(close(bisector(300.0, 60.0), 0.0));
        assert!(close(bisector(60.0, 300.0), 0.0));
        assert!(close(bisector(250.0, 10.0), 310.0));
    }

    #[test]
    fn resolve_adds_quarter_turn() {
        assert!(close(resolve(Pair::new(10.0, 130.0)), 160.0));
        assert!(close(resolve(Pair::new(250.0, 10.0)), 40.0));
        assert!(close(resolve(Pair::new(-50.0, 430.0)), 100.0));
    }

    #[test]
    fn resolved_bisector_lies_on_minor_arc_for_cone_pairs() {
        // Sweep a over the circle and separations over [114, 126].
        for a10 in 0..3600 {
            let a = a10 as f32 / 10.0;
            for sep in [114.0f32, 117.5, 120.0, 123.0, 126.0] {
                for b in [a + sep, a - sep] {
                    let bis = bisector(a, b);
                    let da = circular_distance(bis, a);
                    let db = circular_distance(bis, b);
                    assert!((da - sep / 2.0).abs() < 1e-2, "a={a} b={b} bis={bis}");
                    assert!((db - sep / 2.0).abs() < 1e-2, "a={a} b={b} bis={bis}");

                    let out = resolve(Pair::new(a, b));
                    assert!((0.0..360.0).contains(&out));
                    assert!(circular_distance(out, bis + 90.0) < 1e-3);
                    assert_eq!(out.to_bits(), resolve(Pair::new(a, b)).to_bits());
                }
            }
        }
    }

    #[test]
    fn ema_first_sample_is_unmodified() {
        let mut ema = CircularEma::new(0.35);
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(123.4), 123.4);
    }

    #[test]
    fn ema_wraps_through_zero() {
        let mut ema = CircularEma::new(0.35);
        ema.update(350.0);
        let s = ema.update(10.0);
        // delta = +20, 350 + 7 = 357: moves forward, no backward swing.
        assert!(close(s, 357.0), "got {s}");
        let s = ema.update(10.0);
        assert!(s > 357.0 || s < 10.0, "got {s}");
        for _ in 0..40 {
            ema.update(10.0);
        }
        assert!(close(ema.value().unwrap(), 10.0));
    }

    #[test]
    fn ema_reset_forgets_state() {
        let mut ema = CircularEma::new(0.5);
        ema.update(100.0);
        ema.reset();
        assert_eq!(ema.update(200.0), 200.0);
    }

    #[test]
    fn published_value_never_reaches_360() {
        assert_eq!(to_published(359.6), 0);
        assert_eq!(to_published(359.4), 359);
        assert_eq!(to_published(0.4), 0);
        assert_eq!(to_published(160.0), 160);
    }

    #[test]
    fn needle_turns_the_short_way() {
        assert_eq!(needle_target(350.0, 10.0), 370.0);
        assert_eq!(needle_target(10.0, 350.0), -10.0);
        assert_eq!(needle_target(90.0, 120.0), 120.0);
        assert_eq!(needle_target(370.0, 20.0), 380.0);
    }
}
