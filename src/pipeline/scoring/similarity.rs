use super::types::{NormalizedPatch, SimilarityResult};
use super::ScoringError;

/// Cosine similarity between two equally sized patches.
///
/// Returns 0 when either patch has zero magnitude (nothing left after blur),
/// and an error when the patches are not the same size.
pub fn cosine_similarity(a: &NormalizedPatch, b: &NormalizedPatch) -> Result<f64, ScoringError> {
    if a.dimensions() != b.dimensions() {
        let (aw, ah) = a.dimensions();
        let (bw, bh) = b.dimensions();
        return Err(ScoringError::ImageProcessing(format!(
            "Patch size mismatch: {aw}x{ah} vs {bw}x{bh}"
        )));
    }
    Ok(cosine_of(a.as_slice(), b.as_slice()))
}

fn cosine_of(a: &[u8], b: &[u8]) -> f64 {
    let mut dot = 0.0f64;
    let mut mag_a = 0.0f64;
    let mut mag_b = 0.0f64;

    for (&va, &vb) in a.iter().zip(b) {
        let (va, vb) = (va as f64, vb as f64);
        dot += va * vb;
        mag_a += va * va;
        mag_b += vb * vb;
    }

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a.sqrt() * mag_b.sqrt())
}

/// Calibration curve: `min(1, raw ^ exponent)`.
///
/// Blurred low-resolution densities crowd raw similarities into a narrow high
/// band; a sub-unit exponent spreads that band back out. Non-positive or
/// non-finite inputs map to 0.
pub fn calibrate(raw: f64, exponent: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    let boosted = raw.powf(exponent);
    if !boosted.is_finite() {
        return 0.0;
    }
    boosted.clamp(0.0, 1.0)
}

/// Score two patches end to end: cosine then calibration.
pub fn score_patches(
    reference: &NormalizedPatch,
    snapshot: &NormalizedPatch,
    exponent: f64,
) -> Result<SimilarityResult, ScoringError> {
    let raw = cosine_similarity(reference, snapshot)?;
    Ok(SimilarityResult {
        raw,
        score: calibrate(raw, exponent),
    })
}
