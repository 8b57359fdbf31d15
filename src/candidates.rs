// candidates.rs — Segment scoring and angular clustering.
//
// Turns the raw Hough segments of one tick into a handful of angle
// representatives:
//
//   A. keep segments whose midpoint is near the frame centre
//   B. score each survivor: azimuth of its far end seen from the centre,
//      length, and distance of its supporting line from the centre;
//      score = length / (1 + distance / distance_scale)
//   C. sort by azimuth and sweep, collapsing candidates within the merge
//      tolerance into one representative (the best-scoring member)
//
// The view-cone's boundary lines radiate from the player marker at the
// centre, so long segments whose lines pass through the centre dominate.

use std::cmp::Ordering;

use crate::angle::{circular_distance, normalize_deg};
use crate::config::ScoringConfig;
use crate::hough::LineSegment;

/// One scored direction hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleCandidate {
    /// Image-axis azimuth of the far endpoint, [0, 360).
    pub azimuth: f32,
    /// Segment length in pixels.
    pub length: f32,
    /// Distance of the segment's line from the frame centre, pixels.
    pub distance: f32,
    pub score: f32,
}

impl AngleCandidate {
    /// Candidate with only an azimuth and score (length/distance zero).
    pub fn with_score(azimuth: f32, score: f32) -> Self {
        AngleCandidate { azimuth: normalize_deg(azimuth), length: 0.0, distance: 0.0, score }
    }
}

/// Step A: segments whose midpoint lies within `margin` of `center` on both axes.
pub fn near_center<'a>(
    segments: &'a [LineSegment],
    center: (f32, f32),
    margin: f32,
) -> impl Iterator<Item = &'a LineSegment> + 'a {
    segments.iter().filter(move |s| {
        let (mx, my) = s.midpoint();
        (mx - center.0).abs() <= margin && (my - center.1).abs() <= margin
    })
}

/// Step B for one segment.
pub fn score_segment(seg: &LineSegment, center: (f32, f32), distance_scale: f32) -> AngleCandidate {
    let (cx, cy) = center;
    let p1 = (seg.x1 as f32, seg.y1 as f32);
    let p2 = (seg.x2 as f32, seg.y2 as f32);

    let sq = |p: (f32, f32)| (p.0 - cx).powi(2) + (p.1 - cy).powi(2);
    let far = if sq(p2) > sq(p1) { p2 } else { p1 };
    let azimuth = normalize_deg((far.1 - cy).atan2(far.0 - cx).to_degrees() + 360.0);

    let length = seg.length();
    let distance = if length > 0.0 {
        // |(p2 - p1) × (c - p1)| / |p2 - p1|
        let cross = (p2.0 - p1.0) * (cy - p1.1) - (p2.1 - p1.1) * (cx - p1.0);
        cross.abs() / length
    } else {
        let (mx, my) = seg.midpoint();
        (mx - cx).hypot(my - cy)
    };

    let score = length / (1.0 + distance / distance_scale);
    AngleCandidate { azimuth, length, distance, score }
}

/// Steps A and B. Returns `None` when fewer than two segments survive the
/// centre filter (no signal this tick).
pub fn score_segments(
    segments: &[LineSegment],
    center: (f32, f32),
    config: &ScoringConfig,
) -> Option<Vec<AngleCandidate>> {
    let candidates: Vec<AngleCandidate> = near_center(segments, center, config.center_margin_px)
        .map(|s| score_segment(s, center, config.distance_scale_px))
        .collect();
    if candidates.len() < 2 {
        return None;
    }
    Some(candidates)
}

/// Step C: one representative per angular neighbourhood, in azimuth order.
///
/// A candidate joins the current cluster when it is within `tolerance` of
/// that cluster's representative; the higher score becomes the
/// representative (ties keep the incumbent). After the sweep the last and
/// first clusters are merged under the same rule if they meet across 0°.
pub fn cluster(mut candidates: Vec<AngleCandidate>, tolerance: f32) -> Vec<AngleCandidate> {
    candidates.sort_by(|a, b| a.azimuth.partial_cmp(&b.azimuth).unwrap_or(Ordering::Equal));

    let mut reps: Vec<AngleCandidate> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        match reps.last_mut() {
            Some(rep) if circular_distance(rep.azimuth, cand.azimuth) <= tolerance => {
                if cand.score > rep.score {
                    *rep = cand;
                }
            }
            _ => reps.push(cand),
        }
    }

    if reps.len() > 1 {
        let last = reps[reps.len() - 1];
        if circular_distance(last.azimuth, reps[0].azimuth) <= tolerance {
            reps.pop();
            if last.score > reps[0].score {
                reps[0] = last;
            }
        }
    }
    reps
}
