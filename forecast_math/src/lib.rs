//! # Forecast Math
//!
//! Numeric building blocks shared by the demand forecasting pipeline.
//! Nothing in here knows about dates, splits or artifacts; every function
//! operates on plain `f64` slices.

use thiserror::Error;

pub mod differencing;
pub mod moving_averages;
pub mod regression;
pub mod ring;
pub mod scaling;

pub use moving_averages::SimpleMovingAverage;
pub use ring::RingBuffer;
pub use scaling::{ScalerKind, ScalerState};

/// Errors that can occur in forecasting math
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Arithmetic mean of a slice, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
