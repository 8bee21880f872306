//! Classical baselines evaluated with the same metrics as the trained model.

use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use forecast_math::differencing::{difference, undifference};
use forecast_math::regression::least_squares;
use forecast_math::SimpleMovingAverage;
use tracing::warn;

/// Baseline forecasters, dispatched by variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// Repeat the last observed value
    Naive,
    /// Repeat the mean of the last `window` observed values
    MovingAverage { window: usize },
    /// ARIMA(p, d, q) fitted by two-stage least squares; falls back to
    /// naive persistence when the fit is not possible
    Arima { p: usize, d: usize, q: usize },
}

impl Baseline {
    /// Metric report key.
    pub fn key(&self) -> &'static str {
        match self {
            Baseline::Naive => "naive",
            Baseline::MovingAverage { .. } => "moving_average",
            Baseline::Arima { .. } => "arima",
        }
    }
}

impl Forecaster for Baseline {
    fn name(&self) -> String {
        match self {
            Baseline::Naive => "Naive".to_string(),
            Baseline::MovingAverage { window } => format!("MovingAverage(k={})", window),
            Baseline::Arima { p, d, q } => format!("ARIMA({},{},{})", p, d, q),
        }
    }

    fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>> {
        let last = *history.last().ok_or_else(|| {
            ForecastError::InsufficientData(format!("{} needs a non-empty history", self.name()))
        })?;

        match *self {
            Baseline::Naive => Ok(vec![last; horizon]),
            Baseline::MovingAverage { window } => {
                let sma = SimpleMovingAverage::from_history(window, history)?;
                // Shorter histories average what is there.
                let mean = match sma.value() {
                    Ok(mean) => mean,
                    Err(_) => sma.partial_value().unwrap_or(last),
                };
                Ok(vec![mean; horizon])
            }
            Baseline::Arima { p, d, q } => match ArimaFit::fit(history, p, d, q) {
                Ok(fit) => {
                    let forecast = fit.forecast(history, horizon)?;
                    if forecast.iter().all(|v| v.is_finite()) {
                        Ok(forecast)
                    } else {
                        warn!(
                            model = %self.name(),
                            "non-finite ARIMA forecast, using naive fallback"
                        );
                        Ok(vec![last; horizon])
                    }
                }
                Err(err) => {
                    warn!(
                        model = %self.name(),
                        error = %err,
                        "ARIMA fit failed, using naive fallback"
                    );
                    Ok(vec![last; horizon])
                }
            },
        }
    }
}

/// Fitted coefficients of an ARMA model on the differenced series.
#[derive(Debug, Clone)]
struct ArimaFit {
    d: usize,
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    /// In-sample innovations aligned with the differenced series
    residuals: Vec<f64>,
    differenced: Vec<f64>,
}

impl ArimaFit {
    /// Hannan–Rissanen: a long autoregression estimates the innovations,
    /// then the ARMA coefficients come from one regression on lagged values
    /// and lagged innovations.
    fn fit(history: &[f64], p: usize, d: usize, q: usize) -> Result<Self> {
        let x = difference(history, d)?;
        let n = x.len();

        let residuals_long = if q > 0 {
            let m = (p + q).max((n / 4).min(10)).max(1);
            let ar_long = fit_autoregression(&x, m)?;
            let mut e = vec![0.0; n];
            for t in m..n {
                let pred = ar_long[0]
                    + (1..=m).map(|i| ar_long[i] * x[t - i]).sum::<f64>();
                e[t] = x[t] - pred;
            }
            Some((m, e))
        } else {
            None
        };

        let start = match &residuals_long {
            Some((m, _)) => m + q.max(p),
            None => p,
        };
        if n <= start + p + q + 1 {
            return Err(ForecastError::InsufficientData(format!(
                "ARIMA({},{},{}) needs more than {} differenced observations, have {}",
                p,
                d,
                q,
                start + p + q + 1,
                n
            )));
        }

        let mut rows = Vec::with_capacity(n - start);
        let mut targets = Vec::with_capacity(n - start);
        for t in start..n {
            let mut row = Vec::with_capacity(1 + p + q);
            row.push(1.0);
            row.extend((1..=p).map(|i| x[t - i]));
            if let Some((_, e)) = &residuals_long {
                row.extend((1..=q).map(|j| e[t - j]));
            }
            rows.push(row);
            targets.push(x[t]);
        }
        let beta = least_squares(&rows, &targets)?;

        let intercept = beta[0];
        let ar = beta[1..1 + p].to_vec();
        let ma = beta[1 + p..].to_vec();

        let mut residuals = vec![0.0; n];
        for t in start..n {
            let pred = intercept
                + (1..=p).map(|i| ar[i - 1] * x[t - i]).sum::<f64>()
                + (1..=ma.len()).map(|j| ma[j - 1] * residuals[t - j]).sum::<f64>();
            residuals[t] = x[t] - pred;
        }

        Ok(Self {
            d,
            intercept,
            ar,
            ma,
            residuals,
            differenced: x,
        })
    }

    fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>> {
        let mut x = self.differenced.clone();
        let mut e = self.residuals.clone();

        for _ in 0..horizon {
            let t = x.len();
            let ar_part: f64 = self
                .ar
                .iter()
                .enumerate()
                .map(|(i, phi)| phi * x.get(t.wrapping_sub(i + 1)).copied().unwrap_or(0.0))
                .sum();
            let ma_part: f64 = self
                .ma
                .iter()
                .enumerate()
                .map(|(j, theta)| theta * e.get(t.wrapping_sub(j + 1)).copied().unwrap_or(0.0))
                .sum();
            x.push(self.intercept + ar_part + ma_part);
            // Future innovations have zero expectation.
            e.push(0.0);
        }

        let steps = &x[self.differenced.len()..];
        Ok(undifference(history, steps, self.d)?)
    }
}

/// AR(order) with intercept; returns `[c, phi_1, ..., phi_order]`.
fn fit_autoregression(x: &[f64], order: usize) -> Result<Vec<f64>> {
    if x.len() <= order + 1 {
        return Err(ForecastError::InsufficientData(format!(
            "AR({}) needs more than {} observations, have {}",
            order,
            order + 1,
            x.len()
        )));
    }
    let mut rows = Vec::with_capacity(x.len() - order);
    let mut targets = Vec::with_capacity(x.len() - order);
    for t in order..x.len() {
        let mut row = Vec::with_capacity(order + 1);
        row.push(1.0);
        row.extend((1..=order).map(|i| x[t - i]));
        rows.push(row);
        targets.push(x[t]);
    }
    Ok(least_squares(&rows, &targets)?)
}
