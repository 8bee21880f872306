//! One complete training run: split, window, train, evaluate, export.

use crate::artifact::{ArtifactMetadata, ArtifactStore, MODEL_TYPE, SCHEMA_VERSION};
use crate::config::TrainingConfig;
use crate::data::{read_series_csv, TimeSeries};
use crate::dataset::{chronological_split, WindowDataset};
use crate::error::{ForecastError, Result};
use crate::metrics::{evaluate_forecaster, evaluate_one_step};
use crate::models::{Baseline, Forecaster, LstmConfig, LstmForecaster, ScaledRecursive};
use crate::training::{Trainer, TrainerConfig};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Observations a series needs beyond the window to be worth training on.
pub const MIN_EXTRA_OBSERVATIONS: usize = 10;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub slug: String,
    pub version: String,
    pub artifact_path: PathBuf,
    pub metadata: ArtifactMetadata,
}

/// Read `config.series_path` and train into `config.artifacts_dir`.
pub fn run(config: &TrainingConfig) -> Result<TrainingOutcome> {
    let series = read_series_csv(&config.series_path)?;
    let store = ArtifactStore::new(&config.artifacts_dir);
    train_and_export(config, &series, &store)
}

/// Train on `series` and publish the result under the configured slug.
///
/// Every failure happens before `store.save`, so a failed run leaves the
/// previously published artifact (if any) untouched.
pub fn train_and_export(
    config: &TrainingConfig,
    series: &TimeSeries,
    store: &ArtifactStore,
) -> Result<TrainingOutcome> {
    config.validate()?;
    let slug = config.slug();

    let needed = config.window + MIN_EXTRA_OBSERVATIONS;
    if series.len() < needed {
        return Err(ForecastError::InsufficientData(format!(
            "series for '{}' has {} observations, window {} needs at least {}",
            slug,
            series.len(),
            config.window,
            needed
        )));
    }

    let splits = chronological_split(series, config.split_ratios)?;
    let train_range = splits.train.date_range().ok_or_else(|| {
        ForecastError::InsufficientData("train split is empty".to_string())
    })?;
    info!(
        slug = %slug,
        train = splits.train.len(),
        validation = splits.validation.len(),
        test = splits.test.len(),
        train_start = %train_range.start,
        train_end = %train_range.end,
        "split series"
    );

    let dataset = WindowDataset::build(&splits, config.scaler, config.window, config.context)?;
    if dataset.test.is_empty() {
        return Err(ForecastError::InsufficientData(format!(
            "test split of {} observations yields no windows for window {}",
            splits.test.len(),
            config.window
        )));
    }
    if dataset.validation.is_empty() {
        warn!(slug = %slug, "validation split yields no windows");
    }

    let shape = LstmConfig::new(config.hidden_size, config.num_layers).with_dropout(config.dropout);
    let mut model = LstmForecaster::new(shape, config.seed)?;
    let mut trainer = Trainer::new(TrainerConfig::from(config))?;
    let report = trainer.fit(&mut model, &dataset)?;

    let one_step = evaluate_one_step(&model, &dataset.scaler, &dataset.test)?;
    let recursive_forecaster = ScaledRecursive {
        model: &model,
        scaler: &dataset.scaler,
        window: config.window,
    };
    let recursive = evaluate_forecaster(&recursive_forecaster, &splits)?;
    info!(
        slug = %slug,
        one_step = %one_step,
        recursive = %recursive,
        "evaluated model on test split"
    );

    let (p, d, q) = config.arima_order;
    let baselines = [
        Baseline::Naive,
        Baseline::MovingAverage {
            window: config.moving_average_window,
        },
        Baseline::Arima { p, d, q },
    ];
    let mut baseline_metrics = BTreeMap::new();
    for baseline in baselines {
        let metrics = evaluate_forecaster(&baseline, &splits)?;
        info!(slug = %slug, baseline = %baseline.name(), %metrics, "evaluated baseline");
        baseline_metrics.insert(baseline.key().to_string(), metrics);
    }

    let metadata = ArtifactMetadata {
        model_type: MODEL_TYPE.to_string(),
        schema_version: SCHEMA_VERSION,
        version: String::new(),
        role: config.role.clone(),
        location: config.location.clone(),
        window: config.window,
        hidden_size: config.hidden_size,
        num_layers: config.num_layers,
        dropout: config.dropout,
        seed: config.seed,
        trained_on: Utc::now(),
        train_range,
        val_range: splits.validation.date_range(),
        test_range: splits.test.date_range(),
        metrics: one_step,
        recursive,
        baselines: baseline_metrics,
        training: report,
    };

    let version = store.save(&slug, &model, &dataset.scaler, metadata.clone())?;
    Ok(TrainingOutcome {
        artifact_path: store.slug_path(&slug),
        slug,
        metadata: ArtifactMetadata {
            version: version.clone(),
            ..metadata
        },
        version,
    })
}
