// pair.rs — View-cone pair selection.
//
// The cone is drawn as two lines a fixed angle apart (120° on the target
// minimap). Among the cluster representatives, every unordered pair whose
// circular separation is within tolerance of that angle is a hypothesis:
//
//   total = score_i + score_j + continuity
//   continuity = bonus / (1 + cost)        (only if last tick had a pair)
//   cost = min(d(a, prev.a) + d(b, prev.b), d(a, prev.b) + d(b, prev.a))
//
// The continuity term keeps the tracker locked on the same two lines when
// stray segments form an equally valid 120° pair elsewhere.

use crate::angle::{circular_distance, normalize_deg};
use crate::candidates::AngleCandidate;
use crate::config::PairConfig;

/// Two azimuths believed to be the cone's boundary lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    pub a: f32,
    pub b: f32,
}

impl Pair {
    pub fn new(a: f32, b: f32) -> Self {
        Pair { a, b }
    }

    /// Circular separation of the two lines, [0, 180].
    pub fn separation(&self) -> f32 {
        circular_distance(self.a, self.b)
    }

    /// Cheapest assignment of this pair's lines onto `prev`'s, in degrees.
    pub fn reassignment_cost(&self, prev: &Pair) -> f32 {
        let direct = circular_distance(self.a, prev.a) + circular_distance(self.b, prev.b);
        let swapped = circular_distance(self.a, prev.b) + circular_distance(self.b, prev.a);
        direct.min(swapped)
    }
}

/// The chosen pair with the score that won.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairChoice {
    pub pair: Pair,
    pub score: f32,
}

/// Search `reps` for the best cone pair.
///
/// Returns `None` when no pair's separation is within tolerance of the
/// target. Ties go to the first pair in (i, j) order.
pub fn select_pair(reps: &[AngleCandidate], prev: Option<&Pair>, config: &PairConfig) -> Option<PairChoice> {
    let mut best: Option<PairChoice> = None;

    for (i, ri) in reps.iter().enumerate() {
        for rj in &reps[i + 1..] {
            let sep = circular_distance(ri.azimuth, rj.azimuth);
            if (sep - config.target_separation_deg).abs() > config.tolerance_deg {
                continue;
            }

            let pair = Pair::new(normalize_deg(ri.azimuth), normalize_deg(rj.azimuth));
            let mut score = ri.score + rj.score;
            if let Some(prev) = prev {
                score += config.continuity_bonus / (1.0 + pair.reassignment_cost(prev));
            }

            if best.map_or(true, |b| score > b.score) {
                best = Some(PairChoice { pair, score });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reps(azimuths: &[f32]) -> Vec<AngleCandidate> {
        azimuths.iter().map(|&a| AngleCandidate::with_score(a, 10.0)).collect()
    }

    #[test]
    fn separation_within_tolerance_is_accepted() {
        let cfg = PairConfig::default();
        let choice = select_pair(&reps(&[30.0, 149.0]), None, &cfg).expect("119° should qualify");
        assert_eq!(choice.pair, Pair::new(30.0, 149.0));
        assert_eq!(choice.score, 20.0);
    }

    #[test]
    fn separation_far_from_target_is_rejected() {
        let cfg = PairConfig::default();
        assert!(select_pair(&reps(&[30.0, 130.0]), None, &cfg).is_none());
        assert!(select_pair(&reps(&[30.0]), None, &cfg).is_none());
        assert!(select_pair(&[], None, &cfg).is_none());
    }

    #[test]
    fn tolerance_edges() {
        let cfg = PairConfig::default();
        assert!(select_pair(&reps(&[0.0, 126.0]), None, &cfg).is_some());
        assert!(select_pair(&reps(&[0.0, 114.0]), None, &cfg).is_some());
        assert!(select_pair(&reps(&[0.0, 127.0]), None, &cfg).is_none());
        // Separation measured the short way round.
        assert!(select_pair(&reps(&[300.0, 60.0]), None, &cfg).is_some());
    }

    #[test]
    fn continuity_prefers_previous_lines() {
        let cfg = PairConfig::default();
        let prev = Pair::new(10.0, 130.0);
        let choice = select_pair(&reps(&[10.0, 130.0, 190.0, 250.0]), Some(&prev), &cfg).unwrap();
        assert_eq!(choice.pair, Pair::new(10.0, 130.0));
        assert_eq!(choice.score, 20.0 + 200.0);
    }

    #[test]
    fn scores_beat_continuity_when_far_apart() {
        let cfg = PairConfig::default();
        let prev = Pair::new(10.0, 130.0);
        let mut r = reps(&[10.0, 130.0, 200.0, 320.0]);
        // The 200/320 pair is much stronger than the continuity bonus.
        r[2].score = 400.0;
        r[3].score = 400.0;
        let choice = select_pair(&r, Some(&prev), &cfg).unwrap();
        assert_eq!(choice.pair, Pair::new(200.0, 320.0));
    }

    #[test]
    fn reassignment_cost_considers_swap() {
        let p = Pair::new(130.0, 10.0);
        assert_eq!(p.reassignment_cost(&Pair::new(10.0, 130.0)), 0.0);
        let q = Pair::new(15.0, 128.0);
        assert_eq!(q.reassignment_cost(&Pair::new(10.0, 130.0)), 7.0);
    }

    #[test]
    fn first_pair_wins_ties() {
        let cfg = PairConfig::default();
        // 0/120 and 120/240 and 0/240 all qualify with equal scores.
        let choice = select_pair(&reps(&[0.0, 120.0, 240.0]), None, &cfg).unwrap();
        assert_eq!(choice.pair, Pair::new(0.0, 120.0));
    }
}
