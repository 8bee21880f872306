//! Chronological splitting, train-only scaler fitting and window construction.
//!
//! A series is cut into train, validation and test segments by time order.
//! Windows are built per segment: a sample's target always lies inside its
//! own segment. Under [`ContextPolicy::CarryOver`] the *inputs* of the first
//! validation/test samples may reach back into the preceding segment's tail
//! by at most `W - 1` values, so every input holds at least one value of its
//! own segment and evaluation skips only a segment's first week instead of
//! its first `W`.

use crate::config::ContextPolicy;
use crate::data::{Observation, TimeSeries};
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use forecast_math::{ScalerKind, ScalerState};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Train,
    Validation,
    Test,
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplitKind::Train => "train",
            SplitKind::Validation => "validation",
            SplitKind::Test => "test",
        };
        f.write_str(name)
    }
}

/// First and last week start of a segment (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A contiguous chronological slice of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    kind: SplitKind,
    /// Index of the first observation within the source series
    offset: usize,
    points: Vec<Observation>,
}

impl Split {
    pub fn kind(&self) -> SplitKind {
        self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn date_range(&self) -> Option<DateRange> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some(DateRange {
                start: first.week_start,
                end: last.week_start,
            }),
            _ => None,
        }
    }
}

/// The three segments of one series, in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSplits {
    pub train: Split,
    pub validation: Split,
    pub test: Split,
}

impl SeriesSplits {
    pub fn get(&self, kind: SplitKind) -> &Split {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Validation => &self.validation,
            SplitKind::Test => &self.test,
        }
    }

    /// Raw values of every segment strictly before `kind`, oldest first.
    pub fn values_before(&self, kind: SplitKind) -> Vec<f64> {
        let mut values = Vec::new();
        if kind != SplitKind::Train {
            values.extend(self.train.values());
        }
        if kind == SplitKind::Test {
            values.extend(self.validation.values());
        }
        values
    }

    /// Concatenation of all segments; equals the source series.
    pub fn concat(&self) -> Vec<Observation> {
        let len = self.train.len() + self.validation.len() + self.test.len();
        let mut all = Vec::with_capacity(len);
        all.extend_from_slice(&self.train.points);
        all.extend_from_slice(&self.validation.points);
        all.extend_from_slice(&self.test.points);
        all
    }
}

/// Cut `series` by the `(train, validation, test)` ratios, without shuffling.
///
/// Boundaries are `floor(n * train)` and `floor(n * (train + validation))`;
/// the test segment takes the remainder so nothing is dropped.
pub fn chronological_split(series: &TimeSeries, ratios: (f64, f64, f64)) -> Result<SeriesSplits> {
    let (train_ratio, val_ratio, test_ratio) = ratios;
    if [train_ratio, val_ratio, test_ratio]
        .iter()
        .any(|r| !r.is_finite() || *r < 0.0)
        || (train_ratio + val_ratio + test_ratio - 1.0).abs() > 1e-6
    {
        return Err(ForecastError::InvalidParameter(format!(
            "split ratios must be non-negative and sum to 1.0, got {:?}",
            ratios
        )));
    }

    let n = series.len();
    let train_end = ((n as f64 * train_ratio) + 1e-9).floor() as usize;
    let val_end = ((n as f64 * (train_ratio + val_ratio)) + 1e-9).floor() as usize;
    let val_end = val_end.clamp(train_end, n);
    let train_end = train_end.min(n);

    let points = series.points();
    let make = |kind, start: usize, end: usize| Split {
        kind,
        offset: start,
        points: points[start..end].to_vec(),
    };

    let splits = SeriesSplits {
        train: make(SplitKind::Train, 0, train_end),
        validation: make(SplitKind::Validation, train_end, val_end),
        test: make(SplitKind::Test, val_end, n),
    };
    debug!(
        train = splits.train.len(),
        validation = splits.validation.len(),
        test = splits.test.len(),
        "split series"
    );
    Ok(splits)
}

/// Fit normalization on the train segment.
///
/// Any other segment is refused: scaler parameters must never see
/// validation, test or future values.
pub fn fit_scaler(kind: ScalerKind, split: &Split) -> Result<ScalerState> {
    if split.kind() != SplitKind::Train {
        return Err(ForecastError::LeakageGuard(format!(
            "scaler fit attempted on the {} split",
            split.kind()
        )));
    }
    if split.is_empty() {
        return Err(ForecastError::InsufficientData(
            "train split is empty; cannot fit scaler".to_string(),
        ));
    }
    Ok(ScalerState::fit(kind, &split.values())?)
}

/// One supervised example: `window` past values and the value that follows.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSample {
    pub input: Vec<f64>,
    pub target: f64,
}

/// Slide a window of length `window` over `values`.
///
/// Produces `max(0, len - window)` samples; sample `i` has input
/// `values[i..i + window]` and target `values[i + window]`.
pub fn make_windows(values: &[f64], window: usize) -> Vec<WindowSample> {
    windows_with_context(&[], values, window)
}

/// Windows whose targets are the `segment` values, with inputs allowed to
/// start inside `context` (values immediately preceding the segment).
fn windows_with_context(context: &[f64], segment: &[f64], window: usize) -> Vec<WindowSample> {
    if window == 0 {
        return Vec::new();
    }
    let combined: Vec<f64> = context.iter().chain(segment.iter()).copied().collect();
    (context.len()..combined.len())
        .filter(|&c| c >= window)
        .map(|c| WindowSample {
            input: combined[c - window..c].to_vec(),
            target: combined[c],
        })
        .collect()
}

/// Normalized windows for all three segments plus the scaler that made them.
#[derive(Debug, Clone)]
pub struct WindowDataset {
    pub window: usize,
    pub scaler: ScalerState,
    pub train: Vec<WindowSample>,
    pub validation: Vec<WindowSample>,
    pub test: Vec<WindowSample>,
}

impl WindowDataset {
    /// Fit the scaler on train, normalize every segment with it, and window.
    ///
    /// Fails with `InsufficientData` when the train segment yields no sample.
    pub fn build(
        splits: &SeriesSplits,
        scaler_kind: ScalerKind,
        window: usize,
        policy: ContextPolicy,
    ) -> Result<Self> {
        if window == 0 {
            return Err(ForecastError::InvalidParameter(
                "window must be greater than zero".to_string(),
            ));
        }
        if splits.train.len() <= window {
            return Err(ForecastError::InsufficientData(format!(
                "train segment has {} observations; window {} needs at least {}",
                splits.train.len(),
                window,
                window + 1
            )));
        }

        let scaler = fit_scaler(scaler_kind, &splits.train)?;
        let train_scaled = scaler.transform(&splits.train.values());
        let val_scaled = scaler.transform(&splits.validation.values());
        let test_scaled = scaler.transform(&splits.test.values());

        let train = make_windows(&train_scaled, window);
        let (validation, test) = match policy {
            ContextPolicy::Isolated => (
                make_windows(&val_scaled, window),
                make_windows(&test_scaled, window),
            ),
            ContextPolicy::CarryOver => {
                let val_context = tail(&train_scaled, window - 1);
                let mut before_test = train_scaled.clone();
                before_test.extend_from_slice(&val_scaled);
                let test_context = tail(&before_test, window - 1);
                (
                    windows_with_context(val_context, &val_scaled, window),
                    windows_with_context(test_context, &test_scaled, window),
                )
            }
        };

        debug!(
            window,
            train = train.len(),
            validation = validation.len(),
            test = test.len(),
            "built window dataset"
        );

        Ok(Self {
            window,
            scaler,
            train,
            validation,
            test,
        })
    }
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_windows_keep_targets_in_segment() {
        let samples = windows_with_context(&[1.0, 2.0, 3.0], &[4.0, 5.0], 3);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].input, vec![1.0, 2.0, 3.0]);
        assert_eq!(samples[0].target, 4.0);
        assert_eq!(samples[1].input, vec![2.0, 3.0, 4.0]);
        assert_eq!(samples[1].target, 5.0);
    }

    #[test]
    fn test_short_context_skips_early_targets() {
        let samples = windows_with_context(&[1.0], &[2.0, 3.0, 4.0], 3);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].target, 4.0);
    }
}
