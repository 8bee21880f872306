//! Read-only forecast queries over published artifacts.

use crate::artifact::{ArtifactCache, ArtifactStore};
use crate::config::{ServingConfig, MAX_HORIZON};
use crate::data::{CsvSeriesStore, Observation, SeriesStore, TimeSeries};
use crate::error::ServingError;
use crate::models::{Forecaster, ScaledRecursive};
use crate::utils::{following_weeks, slug};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Model description returned alongside a forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    #[serde(rename = "type")]
    pub model_type: String,
    pub window: usize,
    pub trained_on: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub role: String,
    pub location: String,
    pub history: Vec<Observation>,
    pub forecast: Vec<Observation>,
    pub model: ModelInfo,
}

/// Serving entry point. Constructed once and shared; holds no mutable state
/// besides the artifact cache.
pub struct ForecastService {
    artifacts: Arc<ArtifactCache>,
    series: Arc<dyn SeriesStore>,
    config: ServingConfig,
}

impl ForecastService {
    pub fn new(
        artifacts: Arc<ArtifactCache>,
        series: Arc<dyn SeriesStore>,
        config: ServingConfig,
    ) -> Self {
        Self {
            artifacts,
            series,
            config,
        }
    }

    /// CSV series and filesystem artifacts at the configured directories.
    pub fn from_config(config: ServingConfig) -> Self {
        let artifacts = Arc::new(ArtifactCache::new(ArtifactStore::new(&config.artifacts_dir)));
        let series = Arc::new(CsvSeriesStore::new(&config.data_dir));
        Self::new(artifacts, series, config)
    }

    pub fn config(&self) -> &ServingConfig {
        &self.config
    }

    /// Most recent `max_weeks` of a series, or the configured maximum.
    pub fn get_series(
        &self,
        role: &str,
        location: &str,
        max_weeks: Option<usize>,
    ) -> Result<TimeSeries, ServingError> {
        let weeks = max_weeks.unwrap_or(self.config.max_history_weeks);
        Ok(self.series.load_series(role, location, Some(weeks))?)
    }

    /// Forecast with the configured default horizon.
    pub fn get_default_forecast(
        &self,
        role: &str,
        location: &str,
    ) -> Result<ForecastResult, ServingError> {
        self.get_forecast(role, location, self.config.default_horizon)
    }

    /// Recursive `horizon`-step forecast for (role, location).
    ///
    /// The artifact handle is resolved once at the start, so a concurrent
    /// republish does not affect this call. Either exactly `horizon` points
    /// are returned or an error is.
    #[instrument(skip(self), fields(slug))]
    pub fn get_forecast(
        &self,
        role: &str,
        location: &str,
        horizon: usize,
    ) -> Result<ForecastResult, ServingError> {
        if horizon == 0 || horizon > MAX_HORIZON {
            return Err(ServingError::InvalidHorizon(horizon));
        }
        let key = slug(role, location);
        tracing::Span::current().record("slug", key.as_str());

        let artifact = self.artifacts.get(&key)?;
        let window = artifact.metadata.window;

        let weeks = self.config.max_history_weeks.max(window);
        let series = self.series.load_series(role, location, Some(weeks))?;
        if series.len() < window {
            return Err(ServingError::InsufficientHistory {
                needed: window,
                available: series.len(),
            });
        }
        let last_date = series
            .last_date()
            .ok_or(ServingError::InsufficientHistory {
                needed: window,
                available: 0,
            })?;

        let forecaster = ScaledRecursive {
            model: &artifact.model,
            scaler: &artifact.scaler,
            window,
        };
        let values = forecaster.forecast(&series.values(), horizon)?;

        let forecast: Vec<Observation> = following_weeks(last_date, horizon)
            .into_iter()
            .zip(values)
            .map(|(week_start, value)| Observation {
                week_start,
                value: value.max(0.0),
            })
            .collect();

        let history = series.tail(self.config.max_history_weeks).points().to_vec();
        info!(horizon, version = %artifact.version, "served forecast");

        Ok(ForecastResult {
            role: role.to_string(),
            location: location.to_string(),
            history,
            forecast,
            model: ModelInfo {
                model_type: artifact.metadata.model_type.clone(),
                window,
                trained_on: artifact.metadata.trained_on,
                version: artifact.version.clone(),
            },
        })
    }
}
