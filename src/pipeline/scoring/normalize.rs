//! Canvas normalizer: turns the ink region of one image into a fixed-size,
//! heavily blurred shape density.
//!
//! The crop is taken from the original grayscale raster (not the mask), stretched
//! to a square canvas ignoring aspect ratio, re-binarized with the role's canvas
//! profile and blurred. The blur trades stroke detail for tolerance to hand wobble,
//! proportion drift and small registration errors between the two images.

use image::imageops;
use tracing::debug;

use super::bounds::padded_crop_region;
use super::config::ScoringConfig;
use super::filters::{binarize_with_profile, gaussian_blur};
use super::types::{BoundingBox, ImageRole, NormalizedPatch, RasterImage, ShapeOutcome};

pub fn normalize_canvas(
    raster: &RasterImage,
    bbox: &BoundingBox,
    role: ImageRole,
    config: &ScoringConfig,
) -> ShapeOutcome {
    let Some(region) =
        padded_crop_region(bbox, raster.width(), raster.height(), config.crop_padding)
    else {
        debug!(role = role.label(), ?bbox, "Padded crop region collapsed");
        return ShapeOutcome::DegenerateCrop;
    };

    let cropped =
        imageops::crop_imm(raster.as_gray(), region.x, region.y, region.width, region.height)
            .to_image();

    let side = config.canvas_size;
    let resized = imageops::resize(&cropped, side, side, config.resize_quality.filter());

    let profile = &config.pipeline(role).canvas;
    let binary = binarize_with_profile(
        &resized,
        profile,
        config.contrast_low_percentile,
        config.contrast_high_percentile,
    );
    let blurred = gaussian_blur(&binary, config.blur_sigma);

    debug!(
        role = role.label(),
        crop = format!("{}x{}+{}+{}", region.width, region.height, region.x, region.y),
        canvas = side,
        blur_sigma = config.blur_sigma,
        "Canvas normalized"
    );

    ShapeOutcome::Patch(NormalizedPatch::new(role, blurred))
}
