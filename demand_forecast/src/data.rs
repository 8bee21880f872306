//! Weekly time series and the stores that supply them.

use crate::error::{ForecastError, Result};
use crate::utils::slug;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// One weekly observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub week_start: NaiveDate,
    pub value: f64,
}

/// An ordered, evenly spaced weekly series.
///
/// Construction validates the ordering, so every `TimeSeries` in the program
/// has strictly increasing week starts exactly seven days apart and finite,
/// non-negative values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    points: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(points: Vec<Observation>) -> Result<Self> {
        for (idx, point) in points.iter().enumerate() {
            if !point.value.is_finite() || point.value < 0.0 {
                return Err(ForecastError::Data(format!(
                    "value at {} must be finite and non-negative, got {}",
                    point.week_start, point.value
                )));
            }
            if idx == 0 {
                continue;
            }
            let prev = points[idx - 1].week_start;
            let gap = (point.week_start - prev).num_days();
            if gap <= 0 {
                return Err(ForecastError::Data(format!(
                    "week starts must be strictly increasing: {} follows {}",
                    point.week_start, prev
                )));
            }
            if gap != 7 {
                return Err(ForecastError::Data(format!(
                    "week starts must be 7 days apart: {} follows {} ({} days)",
                    point.week_start, prev, gap
                )));
            }
        }

        Ok(Self { points })
    }

    /// Build a series of consecutive weeks starting at `first_week`.
    pub fn from_values(first_week: NaiveDate, values: &[f64]) -> Result<Self> {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| Observation {
                week_start: first_week + chrono::Duration::weeks(i as i64),
                value,
            })
            .collect();
        Self::new(points)
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

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.week_start)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.week_start)
    }

    /// The most recent `n` observations (all of them if `n` exceeds the length).
    pub fn tail(&self, n: usize) -> TimeSeries {
        let start = self.points.len().saturating_sub(n);
        TimeSeries {
            points: self.points[start..].to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    week_start: NaiveDate,
    #[serde(alias = "value")]
    postings_count: f64,
}

/// Read a `week_start,postings_count` CSV. Rows are sorted by date before
/// validation, matching how the aggregation step writes them.
pub fn read_series_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut points = Vec::new();
    for row in reader.deserialize() {
        let row: CsvRow = row?;
        points.push(Observation {
            week_start: row.week_start,
            value: row.postings_count,
        });
    }
    points.sort_by_key(|p| p.week_start);
    debug!(path = %path.display(), rows = points.len(), "read series csv");

    TimeSeries::new(points)
}

/// Supplies ordered series keyed by (role, location).
pub trait SeriesStore: Send + Sync {
    /// Load the series, keeping only the most recent `max_weeks` if given.
    fn load_series(&self, role: &str, location: &str, max_weeks: Option<usize>)
        -> Result<TimeSeries>;
}

/// CSV files named `<slug>.csv` under one directory.
#[derive(Debug, Clone)]
pub struct CsvSeriesStore {
    data_dir: PathBuf,
}

impl CsvSeriesStore {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn csv_path(&self, role: &str, location: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", slug(role, location)))
    }
}

impl SeriesStore for CsvSeriesStore {
    fn load_series(
        &self,
        role: &str,
        location: &str,
        max_weeks: Option<usize>,
    ) -> Result<TimeSeries> {
        let path = self.csv_path(role, location);
        if !path.exists() {
            return Err(ForecastError::SeriesNotFound(slug(role, location)));
        }
        let series = read_series_csv(&path)?;
        Ok(match max_weeks {
            Some(n) => series.tail(n),
            None => series,
        })
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemorySeriesStore {
    inner: RwLock<HashMap<String, TimeSeries>>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, role: &str, location: &str, series: TimeSeries) {
        let mut map = self.inner.write().unwrap_or_else(|p| p.into_inner());
        map.insert(slug(role, location), series);
    }
}

impl SeriesStore for InMemorySeriesStore {
    fn load_series(
        &self,
        role: &str,
        location: &str,
        max_weeks: Option<usize>,
    ) -> Result<TimeSeries> {
        let key = slug(role, location);
        let map = self.inner.read().unwrap_or_else(|p| p.into_inner());
        let series = map
            .get(&key)
            .ok_or(ForecastError::SeriesNotFound(key.clone()))?;
        Ok(match max_weeks {
            Some(n) => series.tail(n),
            None => series.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_rejects_gap_and_duplicates() {
        let d = monday();
        let gap = vec![
            Observation { week_start: d, value: 1.0 },
            Observation { week_start: d + chrono::Duration::weeks(2), value: 2.0 },
        ];
        assert!(matches!(TimeSeries::new(gap), Err(ForecastError::Data(_))));

        let dup = vec![
            Observation { week_start: d, value: 1.0 },
            Observation { week_start: d, value: 2.0 },
        ];
        assert!(matches!(TimeSeries::new(dup), Err(ForecastError::Data(_))));
    }

    #[test]
    fn test_rejects_negative_values() {
        assert!(TimeSeries::from_values(monday(), &[1.0, -1.0]).is_err());
        assert!(TimeSeries::from_values(monday(), &[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_tail() {
        let series = TimeSeries::from_values(monday(), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(series.tail(2).values(), vec![3.0, 4.0]);
        assert_eq!(series.tail(10).len(), 4);
    }
}
