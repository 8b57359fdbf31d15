// config.rs — Tracker configuration.
//
// Every tunable of the pipeline lives here with its calibrated default.
// The defaults are tuned against the minimap art and must not drift:
//
//   edge band            [180, 275]   (kernel constant, see edges.rs)
//   Hough                1 px, 1°, 40 votes, min length 8, max gap 10
//   centre margin        90 px
//   distance scale       80 px
//   merge tolerance      6°
//   pair separation      120° ± 6°
//   continuity bonus     200
//   EMA alpha            0.35
//
// Configs are plain JSON; every section is optional and falls back to its
// `Default`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gpu::device::AdapterChoice;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Screen rectangle to capture, in screen pixels. `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl CaptureRect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        CaptureRect { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl Default for CaptureRect {
    fn default() -> Self {
        CaptureRect { x1: 0, y1: 0, x2: 256, y2: 256 }
    }
}

/// Probabilistic Hough parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    /// Distance resolution of the accumulator, pixels.
    pub rho_px: f32,
    /// Angular resolution of the accumulator, degrees.
    pub theta_deg: f32,
    /// Minimum accumulator votes for a line hypothesis.
    pub threshold: u32,
    /// Minimum segment extent along x or y, pixels.
    pub min_line_length: u32,
    /// Maximum run of non-edge pixels bridged while walking a line.
    pub max_line_gap: u32,
    /// Seed for the random point order.
    pub seed: u64,
}

impl Default for HoughConfig {
    fn default() -> Self {
        HoughConfig {
            rho_px: 1.0,
            theta_deg: 1.0,
            threshold: 40,
            min_line_length: 8,
            max_line_gap: 10,
            seed: 0xFFFF_FFFF_FFFF_FFFF,
        }
    }
}

impl HoughConfig {
    /// θ bins covering [0°, 180°).
    pub fn num_angle_bins(&self) -> usize {
        (180.0 / self.theta_deg).round() as usize
    }

    /// ρ bins for a `width`×`height` image; zero when `rho_px` is coarser
    /// than the image.
    pub fn num_rho_bins(&self, width: usize, height: usize) -> usize {
        (((width + height) * 2 + 1) as f32 / self.rho_px).round() as usize
    }
}

/// Candidate filtering, scoring and clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Segments whose midpoint is farther than this from the centre (on
    /// either axis) are discarded.
    pub center_margin_px: f32,
    /// `score = length / (1 + distance / distance_scale_px)`.
    pub distance_scale_px: f32,
    /// Candidates within this circular distance collapse into one cluster.
    pub merge_tolerance_deg: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            center_margin_px: 90.0,
            distance_scale_px: 80.0,
            merge_tolerance_deg: 6.0,
        }
    }
}

/// View-cone pair selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    pub target_separation_deg: f32,
    pub tolerance_deg: f32,
    /// Numerator of the continuity bonus `bonus / (1 + reassignment cost)`.
    pub continuity_bonus: f32,
}

impl Default for PairConfig {
    fn default() -> Self {
        PairConfig {
            target_separation_deg: 120.0,
            tolerance_deg: 6.0,
            continuity_bonus: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// EMA factor in (0, 1]. 1 disables smoothing.
    pub alpha: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig { alpha: 0.35 }
    }
}

/// Full tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub capture: CaptureRect,
    /// Tick period of the worker loop in milliseconds.
    pub tick_interval_ms: u64,
    pub adapter: AdapterChoice,
    pub hough: HoughConfig,
    pub scoring: ScoringConfig,
    pub pair: PairConfig,
    pub smoothing: SmoothingConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            capture: CaptureRect::default(),
            tick_interval_ms: 33,
            adapter: AdapterChoice::FirstGpu,
            hough: HoughConfig::default(),
            scoring: ScoringConfig::default(),
            pair: PairConfig::default(),
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.capture.is_empty() {
            return invalid(format!("capture rectangle {:?} is empty", self.capture));
        }
        if self.tick_interval_ms == 0 {
            return invalid("tick_interval_ms must be positive".into());
        }
        if !(self.smoothing.alpha > 0.0 && self.smoothing.alpha <= 1.0) {
            return invalid(format!("smoothing.alpha must be in (0, 1], got {}", self.smoothing.alpha));
        }
        if !(self.hough.rho_px > 0.0) || !(self.hough.theta_deg > 0.0) {
            return invalid("hough resolutions must be positive".into());
        }
        let (w, h) = (self.capture.width() as usize, self.capture.height() as usize);
        if self.hough.num_angle_bins() == 0 || self.hough.num_rho_bins(w, h) == 0 {
            return invalid(format!(
                "hough resolution rho_px={} theta_deg={} leaves no accumulator bins for a {w}x{h} capture",
                self.hough.rho_px, self.hough.theta_deg
            ));
        }
        if self.hough.threshold == 0 {
            return invalid("hough.threshold must be at least 1".into());
        }
        if !(self.scoring.distance_scale_px > 0.0) {
            return invalid("scoring.distance_scale_px must be positive".into());
        }
        if self.scoring.center_margin_px < 0.0
            || self.scoring.merge_tolerance_deg < 0.0
            || self.pair.tolerance_deg < 0.0
            || self.pair.continuity_bonus < 0.0
        {
            return invalid("margins, tolerances and bonus must be non-negative".into());
        }
        if !(0.0..=180.0).contains(&self.pair.target_separation_deg) {
            return invalid(format!(
                "pair.target_separation_deg must be in [0, 180], got {}",
                self.pair.target_separation_deg
            ));
        }
        Ok(())
    }
}

/// Load and validate a JSON config file.
pub fn load_config(path: &Path) -> Result<TrackerConfig, ConfigError> {
    let data = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let config: TrackerConfig = serde_json::from_str(&data)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_calibrated_values() {
        let c = TrackerConfig::default();
        assert_eq!(c.hough.threshold, 40);
        assert_eq!(c.hough.min_line_length, 8);
        assert_eq!(c.hough.max_line_gap, 10);
        assert_eq!(c.scoring.center_margin_px, 90.0);
        assert_eq!(c.scoring.merge_tolerance_deg, 6.0);
        assert_eq!(c.pair.target_separation_deg, 120.0);
        assert_eq!(c.pair.tolerance_deg, 6.0);
        assert_eq!(c.pair.continuity_bonus, 200.0);
        assert_eq!(c.smoothing.alpha, 0.35);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "capture": { "x1": 100, "y1": 50, "x2": 340, "y2": 290 },
            "tick_interval_ms": 16,
            "smoothing": { "alpha": 0.5 }
        }"#;
        let c: TrackerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.capture.width(), 240);
        assert_eq!(c.capture.height(), 240);
        assert_eq!(c.tick_interval_ms, 16);
        assert_eq!(c.smoothing.alpha, 0.5);
        assert_eq!(c.pair, PairConfig::default());
        assert_eq!(c.adapter, AdapterChoice::FirstGpu);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut c = TrackerConfig::default();
        c.smoothing.alpha = 0.0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = TrackerConfig::default();
        c.capture = CaptureRect::new(10, 10, 10, 50);
        assert!(c.validate().is_err());

        let mut c = TrackerConfig::default();
        c.tick_interval_ms = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_resolutions_without_bins() {
        // 256×256 capture: 2·512 + 1 = 1025 ρ-pixels.
        let mut c = TrackerConfig::default();
        c.hough.rho_px = 3000.0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = TrackerConfig::default();
        c.hough.theta_deg = 400.0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

        let mut c = TrackerConfig::default();
        c.hough.rho_px = 1025.0;
        assert_eq!(c.hough.num_rho_bins(256, 256), 1);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/cone-compass.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
