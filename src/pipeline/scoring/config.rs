//! Scoring configuration.
//!
//! Every tunable constant of the pipeline lives here. Defaults reproduce the
//! production calibration; a JSON file can override any subset of fields.

use std::path::Path;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::types::ImageRole;
use super::ScoringError;

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
pub const MIN_IMAGE_BYTES: usize = 67;

/// Maximum encoded input size before rejecting.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// Maximum decoded raster size (width x height). Guards against decompression
/// bombs: a small file can declare huge dimensions.
pub const MAX_IMAGE_PIXELS: u64 = 40_000_000;

const DEFAULT_MIN_INK_EXTENT: u32 = 5;
const DEFAULT_CROP_PADDING: u32 = 10;
const DEFAULT_CANVAS_SIZE: u32 = 64;
const DEFAULT_BLUR_SIGMA: f32 = 5.0;
const DEFAULT_CALIBRATION_EXPONENT: f64 = 0.15;

/// Binarization recipe for one pass over one role.
///
/// Applied in order: contrast stretch, optional sharpen, linear gain,
/// threshold, optional invert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleProfile {
    /// Pixels at or above this become 255, below become 0.
    pub threshold: u8,
    /// Flip after thresholding so dark ink ends up as 255.
    pub invert: bool,
    /// Mild 3x3 sharpen before the gain stage.
    pub sharpen: bool,
    /// Linear multiplier (no bias). Lifts faint pencil marks under poor light.
    pub gain: f32,
}

impl RoleProfile {
    /// Clean line drawing: plain mid-gray cut.
    pub fn reference() -> Self {
        Self {
            threshold: 128,
            invert: true,
            sharpen: false,
            gain: 1.0,
        }
    }

    /// Photographed attempt, first pass: sharpen + 3x gain + low cut.
    pub fn snapshot_ink() -> Self {
        Self {
            threshold: 30,
            invert: true,
            sharpen: true,
            gain: 3.0,
        }
    }

    /// Photographed attempt, canvas pass: as above with a slightly higher cut.
    pub fn snapshot_canvas() -> Self {
        Self {
            threshold: 40,
            ..Self::snapshot_ink()
        }
    }
}

/// The two profiles a role goes through: ink detection and canvas re-binarization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RolePipeline {
    pub ink: RoleProfile,
    pub canvas: RoleProfile,
}

/// Resize filter quality levels.
///
/// CatmullRom keeps stroke edges crisp without Lanczos ringing; Triangle is the
/// cheap bilinear option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    High,
    Fast,
}

impl ResizeQuality {
    pub fn filter(&self) -> FilterType {
        match self {
            ResizeQuality::High => FilterType::CatmullRom,
            ResizeQuality::Fast => FilterType::Triangle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub reference: RolePipeline,
    pub snapshot: RolePipeline,
    /// Ink boxes narrower or shorter than this (pixels) count as blank.
    pub min_ink_extent: u32,
    /// Margin added around the ink box before cropping.
    pub crop_padding: u32,
    /// Side of the square canvas patches are resized to.
    pub canvas_size: u32,
    /// Gaussian sigma applied to the binarized canvas.
    pub blur_sigma: f32,
    /// Exponent of the calibration curve (`raw ^ k`). Must be in (0, 1].
    pub calibration_exponent: f64,
    /// Contrast stretch maps this luminance percentile to 0.
    pub contrast_low_percentile: f32,
    /// Contrast stretch maps this luminance percentile to 255.
    pub contrast_high_percentile: f32,
    pub resize_quality: ResizeQuality,
    pub min_image_bytes: usize,
    pub max_image_bytes: usize,
    /// Images whose header declares more pixels than this are rejected.
    pub max_image_pixels: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            reference: RolePipeline {
                ink: RoleProfile::reference(),
                canvas: RoleProfile::reference(),
            },
            snapshot: RolePipeline {
                ink: RoleProfile::snapshot_ink(),
                canvas: RoleProfile::snapshot_canvas(),
            },
            min_ink_extent: DEFAULT_MIN_INK_EXTENT,
            crop_padding: DEFAULT_CROP_PADDING,
            canvas_size: DEFAULT_CANVAS_SIZE,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            calibration_exponent: DEFAULT_CALIBRATION_EXPONENT,
            contrast_low_percentile: 1.0,
            contrast_high_percentile: 99.0,
            resize_quality: ResizeQuality::High,
            min_image_bytes: MIN_IMAGE_BYTES,
            max_image_bytes: MAX_IMAGE_BYTES,
            max_image_pixels: MAX_IMAGE_PIXELS,
        }
    }
}

impl ScoringConfig {
    pub fn pipeline(&self, role: ImageRole) -> &RolePipeline {
        match role {
            ImageRole::Reference => &self.reference,
            ImageRole::Snapshot => &self.snapshot,
        }
    }

    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScoringError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Config from `SKETCH_TRACKER_SCORING_CONFIG` if set, defaults otherwise.
    pub fn load_or_default() -> Result<Self, ScoringError> {
        match crate::config::scoring_config_path() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading scoring config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.canvas_size == 0 {
            return Err(ScoringError::Config("canvas_size must be positive".into()));
        }
        if self.min_ink_extent == 0 {
            return Err(ScoringError::Config("min_ink_extent must be positive".into()));
        }
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(ScoringError::Config(format!(
                "blur_sigma must be finite and non-negative, got {}",
                self.blur_sigma
            )));
        }
        if !(self.calibration_exponent > 0.0 && self.calibration_exponent <= 1.0) {
            return Err(ScoringError::Config(format!(
                "calibration_exponent must be in (0, 1], got {}",
                self.calibration_exponent
            )));
        }
        let (low, high) = (self.contrast_low_percentile, self.contrast_high_percentile);
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
            return Err(ScoringError::Config(format!(
                "contrast percentiles must satisfy 0 <= low < high <= 100, got {low}..{high}"
            )));
        }
        if self.min_image_bytes > self.max_image_bytes {
            return Err(ScoringError::Config(
                "min_image_bytes exceeds max_image_bytes".into(),
            ));
        }
        if self.max_image_pixels == 0 {
            return Err(ScoringError::Config("max_image_pixels must be positive".into()));
        }
        for (role, pipeline) in [("reference", &self.reference), ("snapshot", &self.snapshot)] {
            for profile in [&pipeline.ink, &pipeline.canvas] {
                if !profile.gain.is_finite() || profile.gain <= 0.0 {
                    return Err(ScoringError::Config(format!(
                        "{role} gain must be finite and positive, got {}",
                        profile.gain
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_calibration() {
        let config = ScoringConfig::default();
        assert_eq!(config.reference.ink.threshold, 128);
        assert_eq!(config.snapshot.ink.threshold, 30);
        assert_eq!(config.snapshot.canvas.threshold, 40);
        assert_eq!(config.snapshot.ink.gain, 3.0);
        assert!(config.snapshot.canvas.sharpen);
        assert!(!config.reference.ink.sharpen);
        assert_eq!(config.min_ink_extent, 5);
        assert_eq!(config.crop_padding, 10);
        assert_eq!(config.canvas_size, 64);
        assert_eq!(config.blur_sigma, 5.0);
        assert_eq!(config.calibration_exponent, 0.15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn pipeline_selected_by_role() {
        let config = ScoringConfig::default();
        assert_eq!(config.pipeline(ImageRole::Reference).ink.threshold, 128);
        assert_eq!(config.pipeline(ImageRole::Snapshot).ink.threshold, 30);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ScoringConfig::from_json(r#"{"canvas_size": 32, "resize_quality": "fast"}"#)
            .unwrap();
        assert_eq!(config.canvas_size, 32);
        assert_eq!(config.resize_quality, ResizeQuality::Fast);
        assert_eq!(config.crop_padding, 10);
        assert_eq!(config.reference, ScoringConfig::default().reference);
    }

    #[test]
    fn invalid_exponent_rejected() {
        let result = ScoringConfig::from_json(r#"{"calibration_exponent": 1.5}"#);
        assert!(matches!(result, Err(ScoringError::Config(_))));
        let result = ScoringConfig::from_json(r#"{"calibration_exponent": 0.0}"#);
        assert!(matches!(result, Err(ScoringError::Config(_))));
    }

    #[test]
    fn inverted_percentiles_rejected() {
        let config = ScoringConfig {
            contrast_low_percentile: 90.0,
            contrast_high_percentile: 10.0,
            ..ScoringConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_gain_rejected() {
        let mut config = ScoringConfig::default();
        config.snapshot.canvas.gain = 0.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("snapshot gain"));
    }

    #[test]
    fn malformed_json_is_json_error() {
        let result = ScoringConfig::from_json("{not json");
        assert!(matches!(result, Err(ScoringError::Json(_))));
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.json");
        std::fs::write(&path, r#"{"blur_sigma": 2.5}"#).unwrap();

        let config = ScoringConfig::from_file(&path).unwrap();
        assert_eq!(config.blur_sigma, 2.5);
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ScoringConfig::from_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ScoringError::Io(_))));
    }

    #[test]
    fn resize_quality_filters() {
        assert!(matches!(ResizeQuality::High.filter(), FilterType::CatmullRom));
        assert!(matches!(ResizeQuality::Fast.filter(), FilterType::Triangle));
    }

    #[test]
    fn pixel_limit_defaults_and_validation() {
        assert_eq!(ScoringConfig::default().max_image_pixels, MAX_IMAGE_PIXELS);
        let result = ScoringConfig::from_json(r#"{"max_image_pixels": 0}"#);
        assert!(matches!(result, Err(ScoringError::Config(_))));
    }
}
