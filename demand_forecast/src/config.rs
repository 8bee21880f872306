//! Training and serving configuration.
//!
//! Every field has a default, so a JSON file only needs the values that
//! differ. Environment variables (`DEMANDCAST_*`, optionally from a `.env`
//! file) override file values.

use crate::error::{ForecastError, Result};
use forecast_math::ScalerKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Longest horizon a forecast request may ask for.
pub const MAX_HORIZON: usize = 52;

/// How validation/test windows get their input context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPolicy {
    /// Inputs may reach back into the preceding segment's tail; targets never do.
    #[default]
    CarryOver,
    /// Every segment is windowed on its own values only.
    Isolated,
}

/// Parameters of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub series_path: PathBuf,
    pub role: String,
    pub location: String,
    pub window: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    /// Drop probability between stacked LSTM layers while training
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub split_ratios: (f64, f64, f64),
    /// Stop after this many epochs without validation improvement
    pub patience: Option<usize>,
    pub seed: u64,
    /// Global gradient norm ceiling
    pub grad_clip: Option<f64>,
    pub scaler: ScalerKind,
    pub context: ContextPolicy,
    pub moving_average_window: usize,
    pub arima_order: (usize, usize, usize),
    pub artifacts_dir: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            series_path: PathBuf::new(),
            role: String::new(),
            location: String::new(),
            window: 12,
            hidden_size: 64,
            num_layers: 2,
            dropout: 0.2,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            split_ratios: (0.70, 0.15, 0.15),
            patience: Some(10),
            seed: 42,
            grad_clip: Some(1.0),
            scaler: ScalerKind::Standard,
            context: ContextPolicy::CarryOver,
            moving_average_window: 4,
            arima_order: (1, 1, 1),
            artifacts_dir: PathBuf::from("artifacts"),
        }
    }
}

impl TrainingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply `DEMANDCAST_*` overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        dotenvy::dotenv().ok();

        if let Some(v) = env_var("DEMANDCAST_SERIES_PATH") {
            self.series_path = PathBuf::from(v);
        }
        if let Some(v) = env_var("DEMANDCAST_ROLE") {
            self.role = v;
        }
        if let Some(v) = env_var("DEMANDCAST_LOCATION") {
            self.location = v;
        }
        if let Some(v) = env_var("DEMANDCAST_ARTIFACTS_DIR") {
            self.artifacts_dir = PathBuf::from(v);
        }
        override_parsed("DEMANDCAST_WINDOW", &mut self.window)?;
        override_parsed("DEMANDCAST_HIDDEN_SIZE", &mut self.hidden_size)?;
        override_parsed("DEMANDCAST_NUM_LAYERS", &mut self.num_layers)?;
        override_parsed("DEMANDCAST_DROPOUT", &mut self.dropout)?;
        override_parsed("DEMANDCAST_EPOCHS", &mut self.epochs)?;
        override_parsed("DEMANDCAST_BATCH_SIZE", &mut self.batch_size)?;
        override_parsed("DEMANDCAST_LEARNING_RATE", &mut self.learning_rate)?;
        override_parsed("DEMANDCAST_SEED", &mut self.seed)?;

        Ok(self)
    }

    pub fn slug(&self) -> String {
        crate::utils::slug(&self.role, &self.location)
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("window", self.window),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("moving_average_window", self.moving_average_window),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }

        let (train, val, test) = self.split_ratios;
        if [train, val, test].iter().any(|r| !r.is_finite() || *r < 0.0) || train <= 0.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "split ratios must be non-negative with a positive train share, got {:?}",
                self.split_ratios
            )));
        }
        if (train + val + test - 1.0).abs() > 1e-6 {
            return Err(ForecastError::InvalidParameter(format!(
                "split ratios must sum to 1.0, got {}",
                train + val + test
            )));
        }

        if let Some(clip) = self.grad_clip {
            if !clip.is_finite() || clip <= 0.0 {
                return Err(ForecastError::InvalidParameter(format!(
                    "grad_clip must be positive, got {}",
                    clip
                )));
            }
        }

        Ok(())
    }
}

/// Settings for the read-only serving side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    pub artifacts_dir: PathBuf,
    pub data_dir: PathBuf,
    /// How much history is loaded and returned with a forecast
    pub max_history_weeks: usize,
    pub default_horizon: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            data_dir: PathBuf::from("data/processed"),
            max_history_weeks: 104,
            default_horizon: 8,
        }
    }
}

impl ServingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `DEMANDCAST_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Some(v) = env_var("DEMANDCAST_ARTIFACTS_DIR") {
            config.artifacts_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("DEMANDCAST_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        override_parsed("DEMANDCAST_MAX_HISTORY_WEEKS", &mut config.max_history_weeks)?;
        override_parsed("DEMANDCAST_DEFAULT_HORIZON", &mut config.default_horizon)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_horizon == 0 || self.default_horizon > MAX_HORIZON {
            return Err(ForecastError::InvalidParameter(format!(
                "default_horizon must be in [1, {}], got {}",
                MAX_HORIZON, self.default_horizon
            )));
        }
        if self.max_history_weeks == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_history_weeks must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn override_parsed<T: FromStr>(key: &str, slot: &mut T) -> Result<()> {
    if let Some(raw) = env_var(key) {
        *slot = raw.trim().parse().map_err(|_| {
            ForecastError::InvalidParameter(format!("{} has an unparsable value '{}'", key, raw))
        })?;
    }
    Ok(())
}
