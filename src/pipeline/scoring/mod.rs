//! Sketch similarity scoring engine.
//!
//! Turns a clean reference drawing and a photographed attempt into one bounded
//! score describing how closely the attempt's ink shape matches the reference.
//!
//! Stages (each image independently, then combined):
//! 1. `loader`: decode bytes to an 8-bit luma raster
//! 2. `ink`: role-dependent binarization into an ink mask
//! 3. `bounds`: minimal ink rectangle, padded crop region
//! 4. `normalize`: crop, stretch to a square canvas, re-binarize, blur
//! 5. `similarity`: cosine similarity + calibration curve

pub mod types;
pub mod config;
pub mod filters;
pub mod loader;
pub mod ink;
pub mod bounds;
pub mod normalize;
pub mod similarity;
pub mod engine;
pub mod external;

pub use types::*;
pub use config::*;
pub use loader::*;
pub use ink::*;
pub use bounds::*;
pub use normalize::*;
pub use similarity::*;
pub use engine::*;
pub use external::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid scoring configuration: {0}")]
    Config(String),

    #[error("External scorer failed: {0}")]
    ExternalScorer(String),

    #[error("Scoring worker failed: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoringError {
    /// Decode failures are surfaced to the caller; everything else scores 0.
    pub fn is_decode(&self) -> bool {
        matches!(self, ScoringError::Decode(_))
    }
}
