//! Ordinary differencing and its inverse, as used by integrated models.

use crate::{MathError, Result};

/// Apply `order` rounds of first differencing.
pub fn difference(values: &[f64], order: usize) -> Result<Vec<f64>> {
    if values.len() <= order {
        return Err(MathError::InsufficientData(format!(
            "Differencing of order {} needs more than {} values, have {}",
            order,
            order,
            values.len()
        )));
    }

    let mut current = values.to_vec();
    for _ in 0..order {
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    Ok(current)
}

/// Turn forecasts of the `order`-times differenced series back into levels.
///
/// `history` is the original (undifferenced) series the forecasts continue.
pub fn undifference(history: &[f64], forecasts: &[f64], order: usize) -> Result<Vec<f64>> {
    if order == 0 {
        return Ok(forecasts.to_vec());
    }
    if history.len() < order {
        return Err(MathError::InsufficientData(format!(
            "Undifferencing of order {} needs at least {} history values",
            order, order
        )));
    }

    // Last value of each intermediate differenced level, level 0 = raw series.
    let mut tails = Vec::with_capacity(order);
    let mut level = history.to_vec();
    for _ in 0..order {
        tails.push(*level.last().unwrap_or(&0.0));
        level = level.windows(2).map(|w| w[1] - w[0]).collect();
    }

    let mut out = Vec::with_capacity(forecasts.len());
    for &step in forecasts {
        let mut value = step;
        for tail in tails.iter_mut().rev() {
            value += *tail;
            *tail = value;
        }
        out.push(value);
    }
    Ok(out)
}
