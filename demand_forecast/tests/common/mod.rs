#![allow(dead_code)]

use burn::nn::{DropoutConfig, Initializer, LinearConfig, LstmConfig as LstmLayerConfig};
use chrono::{NaiveDate, TimeZone, Utc};
use demand_forecast::dataset::DateRange;
use demand_forecast::models::lstm::{InferBackend, LstmNetwork};
use demand_forecast::{
    ArtifactMetadata, ForecastMetrics, LstmConfig, LstmForecaster, TimeSeries, TrainingReport,
};
use forecast_math::{ScalerKind, ScalerState};
use std::collections::BTreeMap;

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn weekly(values: &[f64]) -> TimeSeries {
    TimeSeries::from_values(monday(), values).unwrap()
}

/// Seasonal series with a mild trend, always positive.
pub fn seasonal(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 50.0 + 0.5 * i as f64 + 10.0 * (i as f64 * std::f64::consts::PI / 4.0).sin())
        .collect()
}

/// All-zero LSTM weights keep every hidden state at zero, so with a
/// constant head bias every prediction is `output` in normalized space.
pub fn constant_model(hidden: usize, layers: usize, output: f64) -> LstmForecaster {
    let config = LstmConfig::new(hidden, layers);
    let device = Default::default();
    let layers = (0..layers)
        .map(|layer| {
            let input = if layer == 0 { 1 } else { hidden };
            LstmLayerConfig::new(input, hidden, true)
                .with_initializer(Initializer::Zeros)
                .init(&device)
        })
        .collect();
    let network = LstmNetwork::<InferBackend> {
        layers,
        dropout: DropoutConfig::new(0.0).init(),
        head: LinearConfig::new(hidden, 1)
            .with_initializer(Initializer::Constant { value: output })
            .init(&device),
    };
    LstmForecaster::from_network(config, network)
}

pub fn standard_scaler(values: &[f64]) -> ScalerState {
    ScalerState::fit(ScalerKind::Standard, values).unwrap()
}

pub fn metadata_for(model: &LstmForecaster, window: usize) -> ArtifactMetadata {
    let metrics = ForecastMetrics {
        rmse: 1.0,
        mape: Some(5.0),
        directional_accuracy: Some(0.5),
    };
    let range = DateRange {
        start: monday(),
        end: monday(),
    };
    ArtifactMetadata {
        model_type: "lstm".to_string(),
        schema_version: 1,
        version: String::new(),
        role: "Data Scientist".to_string(),
        location: "Austin, TX".to_string(),
        window,
        hidden_size: model.config().hidden_size,
        num_layers: model.config().num_layers,
        dropout: model.config().dropout,
        seed: 42,
        trained_on: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        train_range: range,
        val_range: Some(range),
        test_range: None,
        metrics,
        recursive: metrics,
        baselines: BTreeMap::new(),
        training: TrainingReport {
            epochs_trained: 1,
            best_epoch: 1,
            best_val_loss: 0.5,
            stopped_early: false,
            history: Vec::new(),
        },
    }
}
