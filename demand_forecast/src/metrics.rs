//! Metrics for evaluating forecast performance
//!
//! Everything here compares values in original units. Callers holding
//! normalized predictions go through [`evaluate_normalized`], which inverts
//! the scaler before any comparison.

use crate::dataset::{SeriesSplits, Split, SplitKind, WindowSample};
use crate::error::{ForecastError, Result};
use crate::models::{Forecaster, OneStepModel};
use forecast_math::ScalerState;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Actual values with magnitude at or below this are left out of MAPE.
const MAPE_ZERO_TOLERANCE: f64 = 1e-6;

/// Forecast performance metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error in percent, over non-zero actuals only;
    /// `None` when every actual is zero
    pub mape: Option<f64>,
    /// Fraction of consecutive steps whose change has the same sign in
    /// actual and predicted values; `None` with fewer than two points
    pub directional_accuracy: Option<f64>,
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RMSE {:.4}", self.rmse)?;
        match self.mape {
            Some(mape) => write!(f, ", MAPE {:.2}%", mape)?,
            None => write!(f, ", MAPE n/a")?,
        }
        match self.directional_accuracy {
            Some(da) => write!(f, ", direction {:.2}%", da * 100.0),
            None => write!(f, ", direction n/a"),
        }
    }
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n;
    mse.sqrt()
}

/// MAPE in percent. Zero actuals are excluded from both numerator and count.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| a.abs() > MAPE_ZERO_TOLERANCE)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.iter().sum::<f64>() / terms.len() as f64 * 100.0)
}

pub fn directional_accuracy(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.len() < 2 {
        return None;
    }
    let matches = actual
        .windows(2)
        .zip(predicted.windows(2))
        .filter(|(a, p)| sign(a[1] - a[0]) == sign(p[1] - p[0]))
        .count();
    Some(matches as f64 / (actual.len() - 1) as f64)
}

fn sign(delta: f64) -> i8 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}

/// All metrics for paired actual/predicted values in original units.
pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<ForecastMetrics> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::InvalidParameter(format!(
            "actual ({}) and predicted ({}) must have the same non-zero length",
            actual.len(),
            predicted.len()
        )));
    }

    Ok(ForecastMetrics {
        rmse: root_mean_squared_error(actual, predicted),
        mape: mean_absolute_percentage_error(actual, predicted),
        directional_accuracy: directional_accuracy(actual, predicted),
    })
}

/// Score normalized predictions against normalized targets of a held-out
/// split. Both are inverse-transformed first.
///
/// Only the test split may be scored this way; anything else would report
/// fitted data as held-out performance.
pub fn evaluate_normalized(
    split: SplitKind,
    scaler: &ScalerState,
    targets: &[f64],
    predictions: &[f64],
) -> Result<ForecastMetrics> {
    if split != SplitKind::Test {
        return Err(ForecastError::LeakageGuard(format!(
            "held-out metrics requested on the {} split",
            split
        )));
    }
    let actual = scaler.inverse_transform(targets);
    let predicted = scaler.inverse_transform(predictions);
    evaluate(&actual, &predicted)
}

/// One-step predictions of `model` over test windows, scored in original units.
pub fn evaluate_one_step<M: OneStepModel + ?Sized>(
    model: &M,
    scaler: &ScalerState,
    test: &[WindowSample],
) -> Result<ForecastMetrics> {
    let targets: Vec<f64> = test.iter().map(|s| s.target).collect();
    let predictions: Vec<f64> = test.iter().map(|s| model.predict_next(&s.input)).collect();
    evaluate_normalized(SplitKind::Test, scaler, &targets, &predictions)
}

/// Score raw-unit predictions against the values of a held-out split.
pub fn evaluate_held_out(split: &Split, predicted: &[f64]) -> Result<ForecastMetrics> {
    if split.kind() != SplitKind::Test {
        return Err(ForecastError::LeakageGuard(format!(
            "held-out metrics requested on the {} split",
            split.kind()
        )));
    }
    evaluate(&split.values(), predicted)
}

/// Forecast the whole test span from everything before it and score it.
pub fn evaluate_forecaster<F: Forecaster + ?Sized>(
    forecaster: &F,
    splits: &SeriesSplits,
) -> Result<ForecastMetrics> {
    let history = splits.values_before(SplitKind::Test);
    let predicted = forecaster.forecast(&history, splits.test.len())?;
    let metrics = evaluate_held_out(&splits.test, &predicted)?;
    debug!(model = %forecaster.name(), %metrics, "evaluated forecaster");
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_regression_metrics() {
        let actual = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let predicted = vec![12.0, 18.0, 33.0, 37.0, 52.0];
        let m = evaluate(&actual, &predicted).unwrap();
        assert_abs_diff_eq!(m.rmse, 6.0_f64.sqrt(), epsilon = 1e-12);
        // (0.2 + 0.1 + 0.1 + 0.075 + 0.04) / 5
        assert_abs_diff_eq!(m.mape.unwrap(), 10.3, epsilon = 1e-9);
        // Both rise at every step.
        assert_abs_diff_eq!(m.directional_accuracy.unwrap(), 1.0);
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let mape = mean_absolute_percentage_error(&[0.0, 10.0], &[5.0, 12.0]).unwrap();
        assert_abs_diff_eq!(mape, 20.0, epsilon = 1e-12);
        assert_eq!(mean_absolute_percentage_error(&[0.0, 0.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_directional_accuracy_counts_flat_steps() {
        let da = directional_accuracy(&[1.0, 2.0, 2.0, 1.0], &[1.0, 3.0, 3.0, 4.0]).unwrap();
        // up/up, flat/flat, down/up
        assert_abs_diff_eq!(da, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(directional_accuracy(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_held_out_guard() {
        let scaler = ScalerState::Standard { mean: 0.0, std: 1.0 };
        let err = evaluate_normalized(SplitKind::Train, &scaler, &[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, ForecastError::LeakageGuard(_)));
    }
}
