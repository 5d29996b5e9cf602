//! Grayscale filters shared by the ink extractor and the canvas normalizer.
//!
//! Pure image-to-image functions, no I/O. Each returns a new image.

use image::{imageops, GrayImage, Luma};

use super::config::RoleProfile;

/// Mild sharpen kernel: centre weight 32, eight neighbours at -1, scale 24.
const SHARPEN_CENTER: i32 = 32;
const SHARPEN_SCALE: i32 = 24;

/// Stretch luminance so the `low_pct` percentile maps to 0 and `high_pct` to 255.
///
/// Uniform images (low and high percentile equal) are returned unchanged.
pub fn stretch_contrast(img: &GrayImage, low_pct: f32, high_pct: f32) -> GrayImage {
    let mut out = img.clone();
    stretch_contrast_in_place(&mut out, low_pct, high_pct);
    out
}

/// In-place `stretch_contrast`.
pub fn stretch_contrast_in_place(img: &mut GrayImage, low_pct: f32, high_pct: f32) {
    let total = img.as_raw().len();
    if total == 0 {
        return;
    }

    let mut histogram = [0usize; 256];
    for &v in img.as_raw() {
        histogram[v as usize] += 1;
    }

    let low = percentile_value(&histogram, total, low_pct);
    let high = percentile_value(&histogram, total, high_pct);
    if high <= low {
        return;
    }

    let span = (high - low) as f32;
    for p in img.pixels_mut() {
        let v = p.0[0].clamp(low, high);
        p.0[0] = (((v - low) as f32 * 255.0 / span).round()).clamp(0.0, 255.0) as u8;
    }
}

/// Smallest value whose cumulative count reaches `pct` percent of `total`.
fn percentile_value(histogram: &[usize; 256], total: usize, pct: f32) -> u8 {
    let target = ((pct.clamp(0.0, 100.0) / 100.0) * total as f32).ceil().max(1.0) as usize;
    let mut cumulative = 0usize;
    for (value, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return value as u8;
        }
    }
    255
}

/// Fast 3x3 sharpen. Border pixels reuse their nearest in-bounds neighbour.
pub fn sharpen_mild(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let at = |x: i64, y: i64| -> i32 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        img.get_pixel(cx, cy).0[0] as i32
    };

    for y in 0..h {
        for x in 0..w {
            let (xi, yi) = (x as i64, y as i64);
            let mut neighbours = 0i32;
            for dy in -1..=1i64 {
                for dx in -1..=1i64 {
                    if dx != 0 || dy != 0 {
                        neighbours += at(xi + dx, yi + dy);
                    }
                }
            }
            let acc = SHARPEN_CENTER * at(xi, yi) - neighbours;
            let value = (acc as f32 / SHARPEN_SCALE as f32).round().clamp(0.0, 255.0) as u8;
            out.put_pixel(x, y, Luma([value]));
        }
    }
    out
}

/// `out = clamp(in * gain + bias)`.
pub fn apply_linear(img: &GrayImage, gain: f32, bias: f32) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = (p.0[0] as f32 * gain + bias).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Values at or above `threshold` become 255, the rest 0.
pub fn threshold(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] >= threshold { 255 } else { 0 };
    }
    out
}

pub fn invert(img: &GrayImage) -> GrayImage {
    let mut out = img.clone();
    imageops::invert(&mut out);
    out
}

/// Gaussian blur. A non-positive sigma is a no-op.
pub fn gaussian_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    imageops::blur(img, sigma)
}

/// Run a role profile over a grayscale image: stretch, sharpen, gain, cut, invert.
///
/// Works on a single buffer (two when sharpening); gain, cut and invert are
/// fused into one pass.
pub fn binarize_with_profile(
    img: &GrayImage,
    profile: &RoleProfile,
    low_pct: f32,
    high_pct: f32,
) -> GrayImage {
    let mut work = img.clone();
    stretch_contrast_in_place(&mut work, low_pct, high_pct);
    if profile.sharpen {
        work = sharpen_mild(&work);
    }

    let apply_gain = (profile.gain - 1.0).abs() > f32::EPSILON;
    let (on, off) = if profile.invert { (0, 255) } else { (255, 0) };
    for p in work.pixels_mut() {
        let v = if apply_gain {
            (p.0[0] as f32 * profile.gain).round().clamp(0.0, 255.0) as u8
        } else {
            p.0[0]
        };
        p.0[0] = if v >= profile.threshold { on } else { off };
    }
    work
}
