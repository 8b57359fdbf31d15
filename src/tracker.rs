// tracker.rs — Per-tick azimuth pipeline and its persisted state.
//
// One call to `process_frame` is one tick:
//
//   1. Edge extraction (GPU or CPU, via the EdgeExtractor trait)
//   2. Probabilistic Hough → line segments
//   3. Centre filter + scoring                 → NoSignal if < 2 survive
//   4. Angular clustering                      → NoSignal if < 2 clusters
//   5. Pair selection with continuity          → NoPair if nothing at 120°
//   6. Bisector + 90°                          → raw azimuth
//   7. Circular EMA, round                     → Resolved(azimuth)
//
// Only Resolved touches state. NoSignal and NoPair leave the previous pair
// and the EMA exactly as they were, so a few bad frames do not disturb the
// needle or the continuity prior.
//
// The tracker itself does not own the edge extractor: the GPU extractor
// holds device buffers that belong to whichever thread drives the loop,
// and the tracker stays a plain CPU object that is easy to test.

use log::{debug, trace};

use crate::angle::{self, CircularEma};
use crate::candidates::{self, AngleCandidate};
use crate::config::TrackerConfig;
use crate::edges::EdgeExtractor;
use crate::error::Result;
use crate::frame::{EdgeMask, Frame};
use crate::hough::{HoughSegmentDetector, LineSegment};
use crate::pair::{self, Pair};

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Too few segments or clusters to form a cone.
    NoSignal,
    /// Representatives exist but no two are at the cone separation.
    NoPair,
    /// New smoothed azimuth, integer degrees in [0, 360).
    Resolved(u16),
}

impl TickOutcome {
    pub fn azimuth(&self) -> Option<u16> {
        match self {
            TickOutcome::Resolved(a) => Some(*a),
            _ => None,
        }
    }
}

/// Diagnostics for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickStats {
    /// Edge pixels in the mask (0 when the tick started from segments).
    pub edge_pixels: usize,
    /// Segments returned by the Hough detector.
    pub segments: usize,
    /// Segments that passed the centre filter.
    pub near_center: usize,
    /// Cluster representatives.
    pub clusters: usize,
    /// Selected pair, if any.
    pub pair: Option<Pair>,
    /// Bisector-derived azimuth before smoothing.
    pub raw_azimuth: Option<f32>,
    /// Smoothed azimuth before rounding.
    pub smoothed: Option<f32>,
}

/// Line detection through smoothing, with the state carried between ticks.
pub struct AzimuthTracker {
    config: TrackerConfig,
    detector: HoughSegmentDetector,
    /// Pair selected on the last Resolved tick.
    prev_pair: Option<Pair>,
    ema: CircularEma,
    last_published: Option<u16>,
}

impl AzimuthTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let detector = HoughSegmentDetector::new(config.hough.clone());
        let ema = CircularEma::new(config.smoothing.alpha);
        AzimuthTracker { config, detector, prev_pair: None, ema, last_published: None }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Run a full tick: edges, then everything downstream.
    pub fn process_frame<E: EdgeExtractor + ?Sized>(
        &mut self,
        extractor: &mut E,
        frame: &Frame,
    ) -> Result<(TickOutcome, TickStats)> {
        let edges = extractor.extract(frame)?;
        Ok(self.process_edges(&edges))
    }

    /// Tick starting from an edge mask.
    pub fn process_edges(&mut self, edges: &EdgeMask) -> (TickOutcome, TickStats) {
        let segments = self.detector.detect(edges);
        let center = (edges.width() as f32 / 2.0, edges.height() as f32 / 2.0);
        let (outcome, mut stats) = self.process_segments(&segments, center);
        stats.edge_pixels = edges.count();
        (outcome, stats)
    }

    /// Tick starting from detected segments around `center`.
    pub fn process_segments(&mut self, segments: &[LineSegment], center: (f32, f32)) -> (TickOutcome, TickStats) {
        let mut stats = TickStats { segments: segments.len(), ..Default::default() };

        let Some(candidates) = candidates::score_segments(segments, center, &self.config.scoring) else {
            stats.near_center = candidates::near_center(segments, center, self.config.scoring.center_margin_px).count();
            trace!("no signal: {} segments, {} near centre", stats.segments, stats.near_center);
            return (TickOutcome::NoSignal, stats);
        };
        stats.near_center = candidates.len();

        let outcome = self.process_candidates_into(candidates, &mut stats);
        (outcome, stats)
    }

    /// Tick starting from scored candidates (clustering onwards).
    pub fn process_candidates(&mut self, candidates: Vec<AngleCandidate>) -> (TickOutcome, TickStats) {
        let mut stats = TickStats { near_center: candidates.len(), ..Default::default() };
        let outcome = self.process_candidates_into(candidates, &mut stats);
        (outcome, stats)
    }

    fn process_candidates_into(&mut self, candidates: Vec<AngleCandidate>, stats: &mut TickStats) -> TickOutcome {
        let reps = candidates::cluster(candidates, self.config.scoring.merge_tolerance_deg);
        stats.clusters = reps.len();
        if reps.len() < 2 {
            trace!("no signal: {} cluster(s)", reps.len());
            return TickOutcome::NoSignal;
        }

        let Some(choice) = pair::select_pair(&reps, self.prev_pair.as_ref(), &self.config.pair) else {
            trace!("no pair among {} representatives", reps.len());
            return TickOutcome::NoPair;
        };

        let raw = angle::resolve(choice.pair);
        let smoothed = self.ema.update(raw);
        let published = angle::to_published(smoothed);

        self.prev_pair = Some(choice.pair);
        self.last_published = Some(published);

        stats.pair = Some(choice.pair);
        stats.raw_azimuth = Some(raw);
        stats.smoothed = Some(smoothed);

        debug!(
            "resolved: pair ({:.1}, {:.1}) score {:.1} → raw {:.1}, smoothed {:.1}, published {}",
            choice.pair.a, choice.pair.b, choice.score, raw, smoothed, published
        );
        TickOutcome::Resolved(published)
    }

    /// Pair chosen on the last Resolved tick.
    pub fn prev_pair(&self) -> Option<Pair> {
        self.prev_pair
    }

    /// Smoothed azimuth, `None` until the first Resolved tick.
    pub fn smoothed(&self) -> Option<f32> {
        self.ema.value()
    }

    /// Last azimuth handed to the publisher.
    pub fn last_published(&self) -> Option<u16> {
        self.last_published
    }

    /// Forget the previous pair and the EMA (e.g. after the minimap was
    /// hidden for a while).
    pub fn reset(&mut self) {
        self.prev_pair = None;
        self.ema.reset();
        self.last_published = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equal(azimuths: &[f32]) -> Vec<AngleCandidate> {
        azimuths.iter().map(|&a| AngleCandidate::with_score(a, 10.0)).collect()
    }

    #[test]
    fn cone_with_distractors_resolves_with_continuity() {
        let mut t = AzimuthTracker::new(TrackerConfig::default());
        // Prime the previous pair with a clean cone.
        let (first, _) = t.process_candidates(equal(&[10.0, 130.0]));
        assert_eq!(first, TickOutcome::Resolved(160));

        let (outcome, stats) = t.process_candidates(equal(&[10.0, 130.0, 190.0, 250.0]));
        assert_eq!(stats.pair, Some(Pair::new(10.0, 130.0)));
        assert!((stats.raw_azimuth.unwrap() - 160.0).abs() < 1e-3);
        assert_eq!(outcome, TickOutcome::Resolved(160));
    }

    #[test]
    fn single_cluster_is_no_signal_and_keeps_state() {
        let mut t = AzimuthTracker::new(TrackerConfig::default());
        t.process_candidates(equal(&[10.0, 130.0]));
        let before = (t.prev_pair(), t.smoothed(), t.last_published());

        let (outcome, stats) = t.process_candidates(equal(&[40.0, 42.0, 44.0]));
        assert_eq!(outcome, TickOutcome::NoSignal);
        assert_eq!(stats.clusters, 1);
        assert_eq!((t.prev_pair(), t.smoothed(), t.last_published()), before);
        assert_eq!(t.last_published(), Some(160));
    }

    #[test]
    fn no_pair_keeps_state() {
        let mut t = AzimuthTracker::new(TrackerConfig::default());
        t.process_candidates(equal(&[10.0, 130.0]));
        let (outcome, _) = t.process_candidates(equal(&[10.0, 100.0]));
        assert_eq!(outcome, TickOutcome::NoPair);
        assert_eq!(t.prev_pair(), Some(Pair::new(10.0, 130.0)));
        assert_eq!(t.last_published(), Some(160));
    }

    #[test]
    fn segments_below_two_are_no_signal() {
        let mut t = AzimuthTracker::new(TrackerConfig::default());
        let (outcome, stats) = t.process_segments(&[LineSegment::new(100, 100, 150, 100)], (100.0, 100.0));
        assert_eq!(outcome, TickOutcome::NoSignal);
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.near_center, 1);
        assert_eq!(t.smoothed(), None);
    }

    #[test]
    fn radial_segments_resolve_to_bisector() {
        let mut t = AzimuthTracker::new(TrackerConfig::default());
        let c = (128.0, 128.0);
        // Lines at 0° and 120° from the centre.
        let segs = [
            LineSegment::new(130, 128, 200, 128),
            LineSegment::new(127, 130, 93, 189),
        ];
        let (outcome, stats) = t.process_segments(&segs, c);
        assert_eq!(stats.clusters, 2);
        // Bisector 60°, +90 → 150°.
        assert_eq!(outcome, TickOutcome::Resolved(150));
    }

    #[test]
    fn smoothing_is_applied_between_ticks() {
        let mut t = AzimuthTracker::new(TrackerConfig::default());
        t.process_candidates(equal(&[10.0, 130.0])); // 160
        let (outcome, _) = t.process_candidates(equal(&[30.0, 150.0])); // raw 180
        // 160 + 0.35 * 20 = 167
        assert_eq!(outcome, TickOutcome::Resolved(167));
    }

    #[test]
    fn reset_clears_everything() {
        let mut t = AzimuthTracker::new(TrackerConfig::default());
        t.process_candidates(equal(&[10.0, 130.0]));
        t.reset();
        assert_eq!(t.prev_pair(), None);
        assert_eq!(t.smoothed(), None);
        assert_eq!(t.last_published(), None);
        let (outcome, _) = t.process_candidates(equal(&[100.0, 220.0]));
        assert_eq!(outcome, TickOutcome::Resolved(250));
    }
}
