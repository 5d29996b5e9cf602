//! Scoring engine: composes the stages into one call per (reference, snapshot) pair.
//!
//! Pipeline flow:
//! 1. Decode both images (decode failures are the only surfaced error)
//! 2. Reference: ink mask -> bounding box -> canvas patch (blank short-circuits to 0)
//! 3. Snapshot: same, with the snapshot profiles
//! 4. Cosine similarity + calibration
//!
//! Anything unexpected after decoding (size mismatch, a panicking filter, a dead
//! worker) is logged and scored 0 so the user always gets a number.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::bounds::locate_bounding_box;
use super::config::ScoringConfig;
use super::ink::extract_ink_mask;
use super::loader::load_raster;
use super::normalize::normalize_canvas;
use super::similarity::score_patches;
use super::types::{
    ImageRole, NormalizedPatch, RasterImage, ScoreOutcome, ScoreReport, ShapeOutcome,
};
use super::ScoringError;
use crate::pipeline::diagnostic::{NoOpPatchSink, PatchSink};

/// Two encoded images in, one score in [0, 1] out.
///
/// Implementations are stateless per call and safe to share across threads.
pub trait SimilarityScorer: Send + Sync {
    /// Fails only with `ScoringError::Decode` when an input is not a readable image.
    fn score(&self, reference: &[u8], snapshot: &[u8]) -> Result<f64, ScoringError>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

/// Canonical scorer: ink extraction, shape normalization, cosine similarity.
pub struct InkShapeScorer {
    config: ScoringConfig,
    sink: Box<dyn PatchSink>,
}

impl Default for InkShapeScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl InkShapeScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            sink: Box::new(NoOpPatchSink),
        }
    }

    /// Send normalized patches and the final report to a debug sink.
    pub fn with_sink(mut self, sink: Box<dyn PatchSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score and return the full report, including both patches when produced.
    pub fn score_detailed(
        &self,
        reference: &[u8],
        snapshot: &[u8],
    ) -> Result<ScoreReport, ScoringError> {
        let reference = load_raster(reference, ImageRole::Reference, &self.config)?;
        let snapshot = load_raster(snapshot, ImageRole::Snapshot, &self.config)?;

        let report = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.score_rasters(&reference, &snapshot)
        })) {
            Ok(report) => report,
            Err(_) => {
                warn!("Scoring pipeline panicked, falling back to 0");
                ScoreReport::zero(ScoreOutcome::InternalFailure)
            }
        };

        Ok(self.finish(report))
    }

    /// Async variant: decodes and normalizes both images on the blocking pool in
    /// parallel, then compares. Never runs CPU work on the calling runtime thread.
    pub async fn score_async(
        self: Arc<Self>,
        reference: Vec<u8>,
        snapshot: Vec<u8>,
    ) -> Result<ScoreReport, ScoringError> {
        let ref_scorer = Arc::clone(&self);
        let snap_scorer = Arc::clone(&self);
        let ref_task = tokio::task::spawn_blocking(move || {
            ref_scorer.shape_from_bytes(&reference, ImageRole::Reference)
        });
        let snap_task = tokio::task::spawn_blocking(move || {
            snap_scorer.shape_from_bytes(&snapshot, ImageRole::Snapshot)
        });
        let (ref_joined, snap_joined) = tokio::join!(ref_task, snap_task);

        let ref_shape = match ref_joined {
            Ok(result) => Some(result?),
            Err(e) => {
                warn!(role = "reference", error = %worker_error(e), "Scoring worker failed");
                None
            }
        };
        let snap_shape = match snap_joined {
            Ok(result) => Some(result?),
            Err(e) => {
                warn!(role = "snapshot", error = %worker_error(e), "Scoring worker failed");
                None
            }
        };

        let report = match (ref_shape, snap_shape) {
            (Some(ShapeOutcome::Patch(r)), Some(ShapeOutcome::Patch(s))) => {
                let compare = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || compare.compare(r, s)).await {
                    Ok(report) => report,
                    Err(e) => {
                        warn!(error = %worker_error(e), "Scoring worker failed");
                        ScoreReport::zero(ScoreOutcome::InternalFailure)
                    }
                }
            }
            (Some(r), _) if !matches!(r, ShapeOutcome::Patch(_)) => {
                ScoreReport::zero(short_circuit_outcome(ImageRole::Reference, &r))
            }
            (_, Some(s)) if !matches!(s, ShapeOutcome::Patch(_)) => {
                ScoreReport::zero(short_circuit_outcome(ImageRole::Snapshot, &s))
            }
            _ => ScoreReport::zero(ScoreOutcome::InternalFailure),
        };

        Ok(self.finish(report))
    }

    /// Decode + extract one image's shape. Only decode errors are returned.
    pub fn shape_from_bytes(
        &self,
        bytes: &[u8],
        role: ImageRole,
    ) -> Result<ShapeOutcome, ScoringError> {
        let raster = load_raster(bytes, role, &self.config)?;
        Ok(self.extract_shape(&raster, role))
    }

    /// Ink mask -> bounding box -> canvas patch for one decoded image.
    pub fn extract_shape(&self, raster: &RasterImage, role: ImageRole) -> ShapeOutcome {
        let mask = extract_ink_mask(raster, role, &self.config);
        let Some(bbox) = locate_bounding_box(&mask, self.config.min_ink_extent) else {
            debug!(role = role.label(), "No usable ink found");
            return ShapeOutcome::Blank;
        };
        debug!(
            role = role.label(),
            min = format!("{},{}", bbox.min_x, bbox.min_y),
            max = format!("{},{}", bbox.max_x, bbox.max_y),
            "Ink bounds located"
        );

        let outcome = normalize_canvas(raster, &bbox, role, &self.config);
        if let ShapeOutcome::Patch(ref patch) = outcome {
            self.sink.write_patch(patch);
        }
        outcome
    }

    fn score_rasters(&self, reference: &RasterImage, snapshot: &RasterImage) -> ScoreReport {
        let ref_patch = match self.extract_shape(reference, ImageRole::Reference) {
            ShapeOutcome::Patch(p) => p,
            other => {
                return ScoreReport::zero(short_circuit_outcome(ImageRole::Reference, &other))
            }
        };
        let snap_patch = match self.extract_shape(snapshot, ImageRole::Snapshot) {
            ShapeOutcome::Patch(p) => p,
            other => {
                return ScoreReport::zero(short_circuit_outcome(ImageRole::Snapshot, &other))
            }
        };
        self.compare(ref_patch, snap_patch)
    }

    fn compare(&self, reference: NormalizedPatch, snapshot: NormalizedPatch) -> ScoreReport {
        match score_patches(&reference, &snapshot, self.config.calibration_exponent) {
            Ok(similarity) => ScoreReport {
                similarity,
                outcome: ScoreOutcome::Scored,
                reference_patch: Some(reference),
                snapshot_patch: Some(snapshot),
            },
            Err(e) => {
                warn!(error = %e, "Similarity computation failed, falling back to 0");
                ScoreReport::zero(ScoreOutcome::InternalFailure)
            }
        }
    }

    fn finish(&self, report: ScoreReport) -> ScoreReport {
        info!(
            raw = format!("{:.4}", report.similarity.raw),
            score = format!("{:.4}", report.similarity.score),
            outcome = ?report.outcome,
            "Similarity scored"
        );
        self.sink.write_report(&report);
        report
    }
}

impl SimilarityScorer for InkShapeScorer {
    fn score(&self, reference: &[u8], snapshot: &[u8]) -> Result<f64, ScoringError> {
        self.score_detailed(reference, snapshot).map(|r| r.score())
    }

    fn name(&self) -> &'static str {
        "ink_shape"
    }
}

fn short_circuit_outcome(role: ImageRole, shape: &ShapeOutcome) -> ScoreOutcome {
    match (role, shape) {
        (_, ShapeOutcome::DegenerateCrop) => ScoreOutcome::DegenerateCrop,
        (ImageRole::Reference, ShapeOutcome::Blank) => ScoreOutcome::ReferenceBlank,
        (ImageRole::Snapshot, ShapeOutcome::Blank) => ScoreOutcome::SnapshotBlank,
        (_, ShapeOutcome::Patch(_)) => ScoreOutcome::InternalFailure,
    }
}

fn worker_error(e: tokio::task::JoinError) -> ScoringError {
    ScoringError::Worker(e.to_string())
}

/// Score two encoded images with the canonical scorer and default calibration.
pub fn score_similarity(reference: &[u8], snapshot: &[u8]) -> Result<f64, ScoringError> {
    InkShapeScorer::default().score(reference, snapshot)
}

/// Async `score_similarity`, dispatched to the blocking pool.
pub async fn score_similarity_async(
    reference: Vec<u8>,
    snapshot: Vec<u8>,
) -> Result<f64, ScoringError> {
    Arc::new(InkShapeScorer::default())
        .score_async(reference, snapshot)
        .await
        .map(|r| r.score())
}

/// Run any scorer on the blocking pool. A dead worker scores 0.
pub async fn score_on_worker(
    scorer: Arc<dyn SimilarityScorer>,
    reference: Vec<u8>,
    snapshot: Vec<u8>,
) -> Result<f64, ScoringError> {
    let name = scorer.name();
    match tokio::task::spawn_blocking(move || scorer.score(&reference, &snapshot)).await {
        Ok(result) => result,
        Err(e) => {
            warn!(scorer = name, error = %worker_error(e), "Scoring worker failed, falling back to 0");
            Ok(0.0)
        }
    }
}
