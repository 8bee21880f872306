//! Ordinary least squares on small dense design matrices.
//!
//! Used by the ARIMA baseline, whose regressions have at most a handful of
//! columns. Solving goes through SVD so tall (over-determined) systems work.

use crate::{MathError, Result};
use nalgebra::{DMatrix, DVector};

/// Solve `min ||X b - y||^2` for `b`.
///
/// `rows` are the rows of `X`, all of the same width.
pub fn least_squares(rows: &[Vec<f64>], targets: &[f64]) -> Result<Vec<f64>> {
    if rows.is_empty() || rows.len() != targets.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but {} targets",
            rows.len(),
            targets.len()
        )));
    }
    let width = rows[0].len();
    if width == 0 || rows.iter().any(|r| r.len() != width) {
        return Err(MathError::InvalidInput(
            "Design rows must share a non-zero width".to_string(),
        ));
    }
    if rows.len() < width {
        return Err(MathError::InsufficientData(format!(
            "Need at least {} rows for {} coefficients, have {}",
            width,
            width,
            rows.len()
        )));
    }

    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let x = DMatrix::from_row_slice(rows.len(), width, &flat);
    let y = DVector::from_column_slice(targets);

    let svd = x.svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(&y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Ok(beta.iter().copied().collect());
            }
        }
    }

    Err(MathError::CalculationError(
        "Least squares system is too ill-conditioned".to_string(),
    ))
}
