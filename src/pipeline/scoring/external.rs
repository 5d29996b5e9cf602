//! Alternate scoring strategy: delegate to an external program.
//!
//! The program receives the reference and snapshot as file paths (appended after
//! any configured arguments) and prints one float to stdout, e.g. a structural
//! similarity script. Inputs are still decoded here first so that malformed
//! images fail with the same `Decode` error as the canonical scorer. Every other
//! failure scores 0.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::config::ScoringConfig;
use super::engine::SimilarityScorer;
use super::loader::load_raster;
use super::types::ImageRole;
use super::ScoringError;

pub struct ExternalProcessScorer {
    program: PathBuf,
    args: Vec<String>,
    config: ScoringConfig,
}

impl ExternalProcessScorer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            config: ScoringConfig::default(),
        }
    }

    /// Arguments placed before the two image paths (e.g. a script path).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Byte-size limits used when validating inputs.
    pub fn with_config(mut self, config: ScoringConfig) -> Self {
        self.config = config;
        self
    }

    fn run(&self, reference: &[u8], snapshot: &[u8]) -> Result<f64, ScoringError> {
        let ref_file = write_temp(reference)?;
        let snap_file = write_temp(snapshot)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(ref_file.path())
            .arg(snap_file.path())
            .output()
            .map_err(|e| {
                ScoringError::ExternalScorer(format!(
                    "failed to start {}: {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScoringError::ExternalScorer(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_score(&stdout)
    }
}

impl SimilarityScorer for ExternalProcessScorer {
    fn score(&self, reference: &[u8], snapshot: &[u8]) -> Result<f64, ScoringError> {
        load_raster(reference, ImageRole::Reference, &self.config)?;
        load_raster(snapshot, ImageRole::Snapshot, &self.config)?;

        match self.run(reference, snapshot) {
            Ok(score) => {
                debug!(program = %self.program.display(), score, "External scorer finished");
                Ok(score)
            }
            Err(e) => {
                warn!(error = %e, "External scorer failed, falling back to 0");
                Ok(0.0)
            }
        }
    }

    fn name(&self) -> &'static str {
        "external_process"
    }
}

fn write_temp(bytes: &[u8]) -> Result<NamedTempFile, ScoringError> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Last non-empty stdout line parsed as a float, clamped to [0, 1].
pub fn parse_score(stdout: &str) -> Result<f64, ScoringError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| ScoringError::ExternalScorer("no output".into()))?;

    let value: f64 = line
        .parse()
        .map_err(|_| ScoringError::ExternalScorer(format!("unparsable score: {line:?}")))?;

    if !value.is_finite() {
        return Err(ScoringError::ExternalScorer(format!("non-finite score: {value}")));
    }
    Ok(value.clamp(0.0, 1.0))
}
