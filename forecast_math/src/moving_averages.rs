//! Simple moving average over the most recent observations.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) implementation
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Feed a whole history, keeping only the trailing `period` values.
    pub fn from_history(period: usize, history: &[f64]) -> Result<Self> {
        let mut sma = Self::new(period)?;
        for &value in history {
            sma.update(value);
        }
        Ok(sma)
    }

    /// Update the SMA with a new value
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Get the current SMA value
    pub fn value(&self) -> Result<f64> {
        if self.values.len() < self.period {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for SMA calculation. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        Ok(self.sum / self.period as f64)
    }

    /// Mean of whatever is buffered, even if fewer than `period` values were
    /// seen. `None` when nothing was fed.
    pub fn partial_value(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_window() {
        let sma = SimpleMovingAverage::from_history(3, &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(sma.value().unwrap(), 4.0);
    }

    #[test]
    fn test_sma_partial() {
        let sma = SimpleMovingAverage::from_history(4, &[2.0, 4.0]).unwrap();
        assert!(sma.value().is_err());
        assert_eq!(sma.partial_value(), Some(3.0));
        assert!(SimpleMovingAverage::new(0).is_err());
    }
}
