//! Diagnostic dump for the scoring pipeline: writes normalized patches to disk.
//!
//! Patches are what the similarity metric actually compares, so looking at them
//! is the fastest way to see why two drawings scored the way they did.
//!
//! **Activation**:
//! - Dev builds (`is_dev()`): `dump_dir_for` resolves to `~/SketchTracker-dev/diagnostic/`
//! - Prod builds: disabled unless `SKETCH_TRACKER_DUMP_DIR` is set
//! - `SKETCH_TRACKER_DUMP_DIR` overrides the default in both modes
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{run_id}/
//!   debug_blob_ref.png
//!   debug_blob_snap.png
//!   score-report.json
//! ```
//!
//! Scoring never depends on the sink: the default is `NoOpPatchSink`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config;
use crate::pipeline::scoring::{ImageRole, NormalizedPatch, ScoreReport};

// ──────────────────────────────────────────────
// Dump directory resolution
// ──────────────────────────────────────────────

/// Diagnostic dump subdirectory name inside app data.
const DIAGNOSTIC_SUBDIR: &str = "diagnostic";

/// Resolve the base dump directory from an optional env override.
///
/// Priority:
/// 1. explicit override (any build)
/// 2. `{app_data_dir}/diagnostic/` in dev builds
/// 3. `None` in production
fn resolve_base_dir(override_dir: Option<OsString>) -> Option<PathBuf> {
    if let Some(dir) = override_dir {
        return Some(PathBuf::from(dir));
    }

    if config::is_dev() {
        return config::app_data_dir().map(|d| d.join(DIAGNOSTIC_SUBDIR));
    }

    None
}

/// Returns the dump directory for one scoring run, or `None` if diagnostics are disabled.
///
/// Creates the directory tree on first call. Returns `None` (with a warning) if
/// directory creation fails. Never panics.
pub fn dump_dir_for(run_id: &Uuid) -> Option<PathBuf> {
    let base = resolve_base_dir(std::env::var_os(config::DUMP_DIR_ENV))?;
    create_run_dir(&base, run_id)
}

fn create_run_dir(base: &Path, run_id: &Uuid) -> Option<PathBuf> {
    let dir = base.join(run_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

// ──────────────────────────────────────────────
// Dump writers
// ──────────────────────────────────────────────

/// Write a binary artifact (PNG image, raw bytes).
///
/// Logs on success (debug) and failure (warn). Never panics.
pub fn dump_binary(dir: &Path, filename: &str, data: &[u8]) {
    let path = dir.join(filename);
    match std::fs::write(&path, data) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "Diagnostic dump: binary written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write binary"
        ),
    }
}

/// Write a JSON artifact (any serde-serializable value). Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => dump_binary(dir, filename, json.as_bytes()),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

// ──────────────────────────────────────────────
// Patch sinks
// ──────────────────────────────────────────────

/// Receives intermediate scoring artifacts for inspection.
///
/// Implementations must not fail the pipeline: errors are logged and swallowed.
pub trait PatchSink: Send + Sync {
    /// Called once per image that produced a normalized patch.
    fn write_patch(&self, patch: &NormalizedPatch);

    /// Called once with the final report.
    fn write_report(&self, _report: &ScoreReport) {}
}

/// Discards everything. Production default.
pub struct NoOpPatchSink;

impl PatchSink for NoOpPatchSink {
    fn write_patch(&self, _patch: &NormalizedPatch) {}
}

/// Writes patches as PNG and the report as JSON into one directory.
pub struct DirectoryPatchSink {
    dir: PathBuf,
}

impl DirectoryPatchSink {
    /// Sink writing straight into `dir` (created if missing).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink for a fresh run directory under the configured dump location.
    /// `None` when diagnostics are disabled.
    pub fn for_new_run() -> Option<Self> {
        dump_dir_for(&Uuid::new_v4()).map(Self::new)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn patch_filename(role: ImageRole) -> &'static str {
        match role {
            ImageRole::Reference => "debug_blob_ref.png",
            ImageRole::Snapshot => "debug_blob_snap.png",
        }
    }

    fn ensure_dir(&self) -> bool {
        match std::fs::create_dir_all(&self.dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %self.dir.display(),
                    error = %e,
                    "Diagnostic dump: failed to create directory"
                );
                false
            }
        }
    }
}

impl PatchSink for DirectoryPatchSink {
    fn write_patch(&self, patch: &NormalizedPatch) {
        if !self.ensure_dir() {
            return;
        }
        match patch.to_png() {
            Ok(png) => dump_binary(&self.dir, Self::patch_filename(patch.role()), &png),
            Err(e) => tracing::warn!(
                role = patch.role().label(),
                error = %e,
                "Diagnostic dump: failed to encode patch"
            ),
        }
    }

    fn write_report(&self, report: &ScoreReport) {
        if self.ensure_dir() {
            dump_json(&self.dir, "score-report.json", report);
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
