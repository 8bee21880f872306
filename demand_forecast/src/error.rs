//! Error types for the demand_forecast crate

use forecast_math::MathError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed input series (ordering, spacing, values)
    #[error("Data error: {0}")]
    Data(String),

    /// A series or segment is too short for what was requested
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A scaler fit or held-out evaluation was pointed at the wrong split
    #[error("Leakage guard: {0}")]
    LeakageGuard(String),

    /// Loss became NaN or infinite
    #[error("Training diverged at epoch {epoch}: loss = {loss}")]
    TrainingDiverged { epoch: usize, loss: f64 },

    #[error("No artifact for '{slug}' at {}", path.display())]
    ArtifactNotFound { slug: String, path: PathBuf },

    #[error("Artifact '{slug}' is corrupt: {reason}")]
    ArtifactCorrupt { slug: String, reason: String },

    #[error("Horizon {0} is outside [1, 52]")]
    InvalidHorizon(usize),

    #[error("Insufficient history: need at least {needed} observations, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error("No series for '{0}'")]
    SeriesNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Tensor or record failure inside the recurrent model
    #[error("Model error: {0}")]
    Model(String),

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<burn::record::RecorderError> for ForecastError {
    fn from(err: burn::record::RecorderError) -> Self {
        ForecastError::Model(format!("{:?}", err))
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Failures surfaced to the serving boundary.
#[derive(Debug, Error)]
pub enum ServingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Horizon {0} is outside [1, 52]")]
    InvalidHorizon(usize),

    #[error("Insufficient history: need at least {needed} observations, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error(transparent)]
    Internal(ForecastError),
}

impl From<ForecastError> for ServingError {
    fn from(err: ForecastError) -> Self {
        match err {
            ForecastError::ArtifactNotFound { .. } | ForecastError::SeriesNotFound(_) => {
                ServingError::NotFound(err.to_string())
            }
            ForecastError::InvalidHorizon(h) => ServingError::InvalidHorizon(h),
            ForecastError::InsufficientHistory { needed, available } => {
                ServingError::InsufficientHistory { needed, available }
            }
            other => ServingError::Internal(other),
        }
    }
}
