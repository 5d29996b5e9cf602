use std::io::Cursor;

use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, GrayImage, RgbImage};
use tracing::debug;

use super::config::ScoringConfig;
use super::types::{ImageRole, RasterImage};
use super::ScoringError;

/// Validate image bytes before decoding.
/// Returns early error for clearly invalid input.
pub fn validate_image_bytes(bytes: &[u8], config: &ScoringConfig) -> Result<(), ScoringError> {
    if bytes.is_empty() {
        return Err(ScoringError::Decode("Image data is empty".into()));
    }
    if bytes.len() < config.min_image_bytes {
        return Err(ScoringError::Decode(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > config.max_image_bytes {
        return Err(ScoringError::Decode(format!(
            "Image data exceeds {}MB limit",
            config.max_image_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Read the declared dimensions from the header and reject images whose
/// decoded raster would exceed `max_image_pixels`. Nothing is decoded here.
pub fn check_dimensions(
    bytes: &[u8],
    role: ImageRole,
    config: &ScoringConfig,
) -> Result<(u32, u32), ScoringError> {
    let (w, h) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScoringError::Decode(format!("Failed to read {} image: {e}", role.label())))?
        .into_dimensions()
        .map_err(|e| {
            ScoringError::Decode(format!("Failed to decode {} image: {e}", role.label()))
        })?;

    let pixels = w as u64 * h as u64;
    if pixels > config.max_image_pixels {
        return Err(ScoringError::Decode(format!(
            "{} image is {w}x{h}, exceeds the {} pixel limit",
            role.label(),
            config.max_image_pixels
        )));
    }
    Ok((w, h))
}

/// Luma conversion that composites transparent pixels onto white paper.
///
/// A plain luma conversion drops alpha, so a transparent background would read
/// as black ink.
pub fn flatten_to_gray(img: &DynamicImage) -> GrayImage {
    if !img.color().has_alpha() {
        return img.to_luma8();
    }

    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut rgb = RgbImage::new(w, h);
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let [r, g, b, a] = src.0;
        let alpha = a as u32;
        let over_white = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        dst.0 = [over_white(r), over_white(g), over_white(b)];
    }
    DynamicImage::ImageRgb8(rgb).to_luma8()
}

/// Decode encoded image bytes (PNG, JPEG) into an 8-bit grayscale raster.
pub fn load_raster(
    bytes: &[u8],
    role: ImageRole,
    config: &ScoringConfig,
) -> Result<RasterImage, ScoringError> {
    validate_image_bytes(bytes, config)?;
    check_dimensions(bytes, role, config)?;

    let img = image::load_from_memory(bytes).map_err(|e| {
        ScoringError::Decode(format!("Failed to decode {} image: {e}", role.label()))
    })?;
    let (w, h) = img.dimensions();
    let has_alpha = img.color().has_alpha();

    let raster = RasterImage::new(flatten_to_gray(&img))
        .map_err(|e| ScoringError::Decode(format!("{} image: {e}", role.label())))?;

    debug!(
        role = role.label(),
        size = format!("{w}x{h}"),
        bytes = bytes.len(),
        has_alpha,
        "Image decoded"
    );
    Ok(raster)
}
