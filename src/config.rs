//! Scanner configuration.
//!
//! Every component receives its settings explicitly through these values;
//! nothing in the core reads global state. Settings can be loaded from a
//! TOML file, and any section or key left out falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::detection::corners::CornerOrdering;
use crate::error::ScanError;
use crate::fingerprint::{DEFAULT_GRID_SIZE, MIN_GRID_SIZE};

/// Resolution the detection defaults were tuned for
pub const REFERENCE_FRAME_SIZE: (u32, u32) = (1270, 720);

/// Canonical card size (standard trading card aspect ratio)
pub const CARD_WIDTH: u32 = 733;
pub const CARD_HEIGHT: u32 = 1024;

/// Complete scanner settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Resize every frame to this size before detection
    pub working_size: Option<(u32, u32)>,
    /// Process candidates of one frame on the rayon pool
    pub parallel: bool,
    /// Keep rectified card images in the scan results
    pub keep_card_images: bool,
    pub detector: DetectorConfig,
    pub rectifier: RectifierConfig,
    pub fingerprint: FingerprintConfig,
    pub matching: MatchingConfig,
}

/// Quadrilateral detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Global binarization level; luma strictly above it is foreground
    pub threshold: u8,
    /// Minimum enclosed contour area in px² at the reference resolution
    pub min_area: f64,
    /// Scale `min_area` by frame pixel count relative to the reference resolution
    pub scale_min_area: bool,
    /// Polygon approximation tolerance as a fraction of the contour perimeter
    pub epsilon_fraction: f64,
    /// Also consider borders of holes inside foreground regions
    pub include_holes: bool,
    pub corner_ordering: CornerOrdering,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 127,
            min_area: 4000.0,
            scale_min_area: true,
            epsilon_fraction: 0.05,
            include_holes: false,
            corner_ordering: CornerOrdering::default(),
        }
    }
}

/// Perspective rectification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
        }
    }
}

/// Fingerprint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Side of the square grid the card is area-averaged down to
    pub grid_size: u32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
        }
    }
}

/// Matching settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Number of ranked matches reported per candidate
    pub top_k: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

impl ScannerConfig {
    /// Load settings from a TOML file and validate them
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ScannerConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |msg: String| Err(ScanError::InvalidConfig(msg));

        if let Some((w, h)) = self.working_size {
            if w == 0 || h == 0 {
                return invalid(format!("working size must be non-zero, got {}x{}", w, h));
            }
        }
        if !(self.detector.epsilon_fraction > 0.0 && self.detector.epsilon_fraction < 1.0) {
            return invalid(format!(
                "epsilon_fraction must be in (0, 1), got {}",
                self.detector.epsilon_fraction
            ));
        }
        if !(self.detector.min_area >= 0.0) {
            return invalid(format!("min_area must be >= 0, got {}", self.detector.min_area));
        }
        if self.rectifier.width < 2 || self.rectifier.height < 2 {
            return invalid(format!(
                "card size must be at least 2x2, got {}x{}",
                self.rectifier.width, self.rectifier.height
            ));
        }
        if self.fingerprint.grid_size < MIN_GRID_SIZE {
            return invalid(format!(
                "fingerprint grid_size must be at least {}, got {}",
                MIN_GRID_SIZE, self.fingerprint.grid_size
            ));
        }
        if self.matching.top_k == 0 {
            return invalid("top_k must be at least 1".to_string());
        }
        Ok(())
    }
}
