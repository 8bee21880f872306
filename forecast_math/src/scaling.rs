//! Affine normalization of a univariate series.
//!
//! A [`ScalerState`] is fitted once from a slice of raw values and then only
//! applied. There is no clipping: values outside the fitted range map
//! linearly, so a shifted distribution shows up as normalized values far from
//! the fitted band instead of being flattened against it.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Which normalization to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Zero mean, unit (population) standard deviation
    #[default]
    Standard,
    /// Fitted minimum maps to 0, fitted maximum maps to 1
    MinMax,
}

/// Fitted normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerState {
    Standard { mean: f64, std: f64 },
    MinMax { min: f64, max: f64 },
}

impl ScalerState {
    /// Fit parameters of the given kind from raw values.
    ///
    /// A degenerate spread (constant input) is replaced by 1 so the transform
    /// stays invertible.
    pub fn fit(kind: ScalerKind, values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler on an empty slice".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Scaler input contains non-finite values".to_string(),
            ));
        }

        let n = values.len() as f64;
        match kind {
            ScalerKind::Standard => {
                let mean = crate::mean(values).unwrap_or_default();
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                Ok(ScalerState::Standard {
                    mean,
                    std: if std > f64::EPSILON { std } else { 1.0 },
                })
            }
            ScalerKind::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if max - min <= f64::EPSILON {
                    max = min + 1.0;
                }
                Ok(ScalerState::MinMax { min, max })
            }
        }
    }

    pub fn kind(&self) -> ScalerKind {
        match self {
            ScalerState::Standard { .. } => ScalerKind::Standard,
            ScalerState::MinMax { .. } => ScalerKind::MinMax,
        }
    }

    /// Offset and scale such that `normalized = (raw - offset) / scale`.
    fn affine(&self) -> (f64, f64) {
        match *self {
            ScalerState::Standard { mean, std } => (mean, std),
            ScalerState::MinMax { min, max } => (min, max - min),
        }
    }

    /// Parameters are finite and the scale is non-zero.
    pub fn is_valid(&self) -> bool {
        let (offset, scale) = self.affine();
        offset.is_finite() && scale.is_finite() && scale != 0.0
    }

    pub fn transform_one(&self, raw: f64) -> f64 {
        let (offset, scale) = self.affine();
        (raw - offset) / scale
    }

    pub fn inverse_one(&self, normalized: f64) -> f64 {
        let (offset, scale) = self.affine();
        normalized * scale + offset
    }

    pub fn transform(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter().map(|&v| self.transform_one(v)).collect()
    }

    pub fn inverse_transform(&self, normalized: &[f64]) -> Vec<f64> {
        normalized.iter().map(|&v| self.inverse_one(v)).collect()
    }
}
