//! # Demand Forecast
//!
//! Weekly job-postings demand forecasting per (role, location).
//!
//! ## Features
//!
//! - Chronological train/validation/test splitting with a train-only scaler
//! - Fixed-length windowing, optionally carrying context across split boundaries
//! - Stacked LSTM regressor trained with Adam and validation-based checkpointing
//! - Naive, moving-average and ARIMA baselines scored with the same metrics
//! - Versioned on-disk artifacts published by atomic rename
//! - Recursive multi-step serving backed by a version-checked artifact cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demand_forecast::{pipeline, ForecastService, ServingConfig, TrainingConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrainingConfig {
//!     series_path: "data/processed/software_engineer_remote.csv".into(),
//!     role: "Software Engineer".to_string(),
//!     location: "Remote".to_string(),
//!     ..TrainingConfig::default()
//! };
//! let outcome = pipeline::run(&config)?;
//! println!("published {} as {}", outcome.slug, outcome.version);
//!
//! let service = ForecastService::from_config(ServingConfig::default());
//! let result = service.get_forecast("Software Engineer", "Remote", 8)?;
//! assert_eq!(result.forecast.len(), 8);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use crate::artifact::{ArtifactCache, ArtifactMetadata, ArtifactStore, ModelArtifact};
pub use crate::config::{ContextPolicy, ServingConfig, TrainingConfig, MAX_HORIZON};
pub use crate::data::{CsvSeriesStore, InMemorySeriesStore, Observation, SeriesStore, TimeSeries};
pub use crate::dataset::{SeriesSplits, SplitKind, WindowDataset, WindowSample};
pub use crate::error::{ForecastError, ServingError};
pub use crate::metrics::ForecastMetrics;
pub use crate::models::{Baseline, Forecaster, LstmConfig, LstmForecaster, OneStepModel};
pub use crate::service::{ForecastResult, ForecastService, ModelInfo};
pub use crate::training::{Trainer, TrainerConfig, TrainingReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
