//! Forecasting models: the trained recurrent regressor and the baselines it
//! is compared against.

use crate::error::{ForecastError, Result};
use forecast_math::{RingBuffer, ScalerState};

pub mod baselines;
pub mod lstm;

pub use baselines::Baseline;
pub use lstm::{LstmConfig, LstmForecaster};

/// A model that predicts the next normalized value from a window of
/// normalized values.
pub trait OneStepModel: Send + Sync {
    fn predict_next(&self, window: &[f64]) -> f64;
}

/// Multi-step forecasting in original units.
pub trait Forecaster {
    /// Name used in logs and metric reports
    fn name(&self) -> String;

    /// Forecast `horizon` values following `history`.
    fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>>;
}

/// Recursive multi-step forecast in normalized space.
///
/// The ring is seeded with `seed` (the last `W` normalized observations).
/// Each step predicts from the current ring, records the prediction and
/// pushes it back into the ring, so later steps consume earlier predictions
/// rather than ground truth and errors compound. The whole horizon is
/// computed before anything is returned; a non-finite prediction aborts
/// with no partial output.
pub fn recursive_forecast<M: OneStepModel + ?Sized>(
    model: &M,
    seed: &[f64],
    horizon: usize,
) -> Result<Vec<f64>> {
    let mut ring = RingBuffer::seeded(seed)?;
    let mut window = Vec::with_capacity(ring.capacity());
    let mut predictions = Vec::with_capacity(horizon);

    for step in 0..horizon {
        window.clear();
        window.extend(ring.iter().copied());
        let next = model.predict_next(&window);
        if !next.is_finite() {
            return Err(ForecastError::Data(format!(
                "non-finite prediction at step {} of {}",
                step + 1,
                horizon
            )));
        }
        predictions.push(next);
        ring.push(next);
    }

    Ok(predictions)
}

/// A one-step model paired with its scaler, forecasting in original units.
pub struct ScaledRecursive<'a, M: OneStepModel + ?Sized> {
    pub model: &'a M,
    pub scaler: &'a ScalerState,
    pub window: usize,
}

impl<M: OneStepModel + ?Sized> Forecaster for ScaledRecursive<'_, M> {
    fn name(&self) -> String {
        "lstm_recursive".to_string()
    }

    fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>> {
        if history.len() < self.window {
            return Err(ForecastError::InsufficientHistory {
                needed: self.window,
                available: history.len(),
            });
        }
        let seed = self.scaler.transform(&history[history.len() - self.window..]);
        let normalized = recursive_forecast(self.model, &seed, horizon)?;
        Ok(self.scaler.inverse_transform(&normalized))
    }
}
