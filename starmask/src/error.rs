//! Error types for the halo suppression pipeline.

use crate::image_proc::stats::StatsError;
use crate::image_size::ImageSize;
use thiserror::Error;

/// Errors surfaced by [`crate::pipeline::process`] and friends.
///
/// An empty detection is not represented here: finding no stars is a
/// defined outcome that returns the input unchanged.
#[derive(Error, Debug)]
pub enum StarmaskError {
    /// Too few valid samples survived sigma clipping
    #[error("Insufficient data for background statistics: {remaining} valid samples, need {required}")]
    InsufficientData { remaining: usize, required: usize },

    /// Configuration rejected at pipeline entry, before any computation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An intermediate buffer disagrees in shape with the input image
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: ImageSize,
        actual: ImageSize,
    },

    /// A pluggable source detector failed
    #[error("Source detection failed: {0}")]
    Detection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StatsError> for StarmaskError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::InsufficientData {
                remaining,
                required,
            } => StarmaskError::InsufficientData {
                remaining,
                required,
            },
            StatsError::InvalidSigma(sigma) => StarmaskError::InvalidConfiguration(format!(
                "sigma clip must be positive and finite, got {sigma}"
            )),
        }
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, StarmaskError>;
