use tracing::debug;

use super::config::ScoringConfig;
use super::filters::binarize_with_profile;
use super::types::{ImageRole, InkMask, RasterImage};

/// Binary ink mask for a raster, using the role's ink-pass profile.
///
/// The reference is a clean drawing and gets a plain mid-gray cut. The snapshot
/// is a photograph, so it is sharpened and gained before a much lower cut;
/// a single threshold would lose faint strokes in dim photos.
pub fn extract_ink_mask(raster: &RasterImage, role: ImageRole, config: &ScoringConfig) -> InkMask {
    let profile = &config.pipeline(role).ink;
    let binary = binarize_with_profile(
        raster.as_gray(),
        profile,
        config.contrast_low_percentile,
        config.contrast_high_percentile,
    );
    let mask = InkMask::from_binary(binary);

    debug!(
        role = role.label(),
        threshold = profile.threshold,
        ink_pixels = mask.ink_count(),
        "Ink mask extracted"
    );
    mask
}
