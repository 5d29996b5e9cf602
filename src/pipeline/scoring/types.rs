use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageOutputFormat};
use serde::{Deserialize, Serialize};

use super::ScoringError;

/// Which side of the comparison an image plays.
///
/// The reference is a clean line drawing; the snapshot is a phone photo of the
/// attempt, subject to lighting and sensor noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Reference,
    Snapshot,
}

impl ImageRole {
    pub fn label(&self) -> &'static str {
        match self {
            ImageRole::Reference => "reference",
            ImageRole::Snapshot => "snapshot",
        }
    }
}

/// Decoded 8-bit grayscale image. Never empty.
#[derive(Debug, Clone)]
pub struct RasterImage {
    gray: GrayImage,
}

impl RasterImage {
    pub fn new(gray: GrayImage) -> Result<Self, ScoringError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(ScoringError::ImageProcessing(format!(
                "Raster must be non-empty, got {}x{}",
                gray.width(),
                gray.height()
            )));
        }
        Ok(Self { gray })
    }

    /// Build from a row-major luma buffer. `pixels.len()` must equal `width * height`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ScoringError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(ScoringError::ImageProcessing(format!(
                "Raster buffer holds {} bytes, {width}x{height} needs {expected}",
                pixels.len()
            )));
        }
        let gray = GrayImage::from_raw(width, height, pixels).ok_or_else(|| {
            ScoringError::ImageProcessing("Raster buffer does not match dimensions".into())
        })?;
        Self::new(gray)
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.gray.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.gray
    }
}

/// Binary ink mask: 255 where ink was detected, 0 elsewhere.
#[derive(Debug, Clone)]
pub struct InkMask {
    mask: GrayImage,
}

impl InkMask {
    /// Wrap an already-binarized image. Any non-zero value counts as ink.
    pub fn from_binary(mut mask: GrayImage) -> Self {
        for p in mask.pixels_mut() {
            if p.0[0] != 0 {
                p.0[0] = 255;
            }
        }
        Self { mask }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] == 255
    }

    pub fn ink_count(&self) -> usize {
        self.mask.as_raw().iter().filter(|&&v| v == 255).count()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.mask.as_raw()
    }
}

/// Minimal axis-aligned rectangle enclosing all ink, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    /// Horizontal extent in pixels.
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Vertical extent in pixels.
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Too small in either axis to be a drawing (noise specks, stray dots).
    ///
    /// Extents are inclusive, so a stroke exactly `min_extent` pixels wide is kept.
    pub fn is_degenerate(&self, min_extent: u32) -> bool {
        self.width() < min_extent || self.height() < min_extent
    }
}

/// Region of the source image handed to the canvas normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fixed-size blurred shape density for one image.
#[derive(Debug, Clone)]
pub struct NormalizedPatch {
    role: ImageRole,
    pixels: GrayImage,
}

impl NormalizedPatch {
    pub fn new(role: ImageRole, pixels: GrayImage) -> Self {
        Self { role, pixels }
    }

    pub fn role(&self) -> ImageRole {
        self.role
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    /// Encode as PNG for visual inspection.
    pub fn to_png(&self) -> Result<Vec<u8>, ScoringError> {
        let dynamic = DynamicImage::ImageLuma8(self.pixels.clone());
        let mut cursor = Cursor::new(Vec::new());
        dynamic
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ScoringError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
        Ok(cursor.into_inner())
    }
}

/// Result of shape extraction for a single image.
#[derive(Debug, Clone)]
pub enum ShapeOutcome {
    Patch(NormalizedPatch),
    /// No ink, or ink too small to count as a drawing.
    Blank,
    /// Padded crop region collapsed after clamping.
    DegenerateCrop,
}

/// Raw cosine similarity and the calibrated user-facing score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub raw: f64,
    pub score: f64,
}

impl SimilarityResult {
    pub fn zero() -> Self {
        Self { raw: 0.0, score: 0.0 }
    }
}

/// Why a score came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOutcome {
    Scored,
    ReferenceBlank,
    SnapshotBlank,
    DegenerateCrop,
    InternalFailure,
}

/// Full scoring output: similarity, outcome and the intermediate patches.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub similarity: SimilarityResult,
    pub outcome: ScoreOutcome,
    #[serde(skip)]
    pub reference_patch: Option<NormalizedPatch>,
    #[serde(skip)]
    pub snapshot_patch: Option<NormalizedPatch>,
}

impl ScoreReport {
    /// Report for a pipeline that stopped before scoring.
    pub fn zero(outcome: ScoreOutcome) -> Self {
        Self {
            similarity: SimilarityResult::zero(),
            outcome,
            reference_patch: None,
            snapshot_patch: None,
        }
    }

    pub fn score(&self) -> f64 {
        self.similarity.score
    }
}
