mod common;

use chrono::Duration;
use common::{constant_model, metadata_for, standard_scaler, weekly};
use demand_forecast::{
    ArtifactCache, ArtifactStore, ForecastService, InMemorySeriesStore, ServingConfig, ServingError,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use tempfile::TempDir;

const ROLE: &str = "Data Scientist";
const LOCATION: &str = "Austin, TX";

struct Fixture {
    _dir: TempDir,
    store: ArtifactStore,
    series: Arc<InMemorySeriesStore>,
    service: ForecastService,
}

/// Service over a published constant model (window 4) whose normalized
/// output is `output`, and a series of `history` values.
fn fixture(output: f64, history: &[f64]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path());
    let model = constant_model(3, 1, output);
    let scaler = standard_scaler(&[10.0, 20.0, 30.0]);
    store
        .save("data_scientist_austin_tx", &model, &scaler, metadata_for(&model, 4))
        .unwrap();

    let series = Arc::new(InMemorySeriesStore::new());
    series.insert(ROLE, LOCATION, weekly(history));

    let config = ServingConfig {
        artifacts_dir: dir.path().to_path_buf(),
        max_history_weeks: 10,
        ..ServingConfig::default()
    };
    let service = ForecastService::new(
        Arc::new(ArtifactCache::new(store.clone())),
        series.clone(),
        config,
    );
    Fixture {
        _dir: dir,
        store,
        series,
        service,
    }
}

fn history(n: usize) -> Vec<f64> {
    (0..n).map(|i| 15.0 + i as f64).collect()
}

#[rstest]
#[case(1)]
#[case(8)]
#[case(26)]
#[case(52)]
fn test_forecast_has_requested_length(#[case] horizon: usize) {
    let f = fixture(0.0, &history(20));
    let result = f.service.get_forecast(ROLE, LOCATION, horizon).unwrap();

    assert_eq!(result.forecast.len(), horizon);
    // The model predicts the normalized mean, i.e. 20 in original units.
    assert!(result.forecast.iter().all(|p| (p.value - 20.0).abs() < 1e-9));
}

#[rstest]
#[case(0)]
#[case(53)]
#[case(1000)]
fn test_out_of_range_horizon(#[case] horizon: usize) {
    let f = fixture(0.0, &history(20));
    let err = f.service.get_forecast(ROLE, LOCATION, horizon).unwrap_err();
    assert!(matches!(err, ServingError::InvalidHorizon(h) if h == horizon));
}

#[test]
fn test_forecast_dates_follow_history() {
    let f = fixture(0.0, &history(20));
    let result = f.service.get_forecast(ROLE, LOCATION, 3).unwrap();

    let last = result.history.last().unwrap().week_start;
    let dates: Vec<_> = result.forecast.iter().map(|p| p.week_start).collect();
    assert_eq!(
        dates,
        vec![last + Duration::days(7), last + Duration::days(14), last + Duration::days(21)]
    );
    // History is capped at max_history_weeks.
    assert_eq!(result.history.len(), 10);
    assert_eq!(result.history.last().unwrap().value, 34.0);
}

#[test]
fn test_model_info() {
    let f = fixture(0.0, &history(20));
    let result = f.service.get_forecast(ROLE, LOCATION, 2).unwrap();
    let version = f.store.current_version("data_scientist_austin_tx").unwrap().unwrap();

    assert_eq!(result.model.model_type, "lstm");
    assert_eq!(result.model.window, 4);
    assert_eq!(result.model.version, version);
    assert_eq!(result.role, ROLE);
    assert_eq!(result.location, LOCATION);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["model"]["type"], "lstm");
}

#[test]
fn test_negative_forecasts_are_clamped() {
    // -10 standard deviations below a mean of 20 is well below zero.
    let f = fixture(-10.0, &history(20));
    let result = f.service.get_forecast(ROLE, LOCATION, 4).unwrap();
    assert_eq!(result.forecast.len(), 4);
    assert!(result.forecast.iter().all(|p| p.value == 0.0));
}

#[test]
fn test_missing_artifact_is_not_found() {
    let f = fixture(0.0, &history(20));
    f.series.insert("Nurse", "Boston, MA", weekly(&history(20)));

    let err = f.service.get_forecast("Nurse", "Boston, MA", 4).unwrap_err();
    assert!(matches!(err, ServingError::NotFound(_)), "got {:?}", err);
}

#[test]
fn test_missing_series_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path());
    let model = constant_model(3, 1, 0.0);
    store
        .save("nurse_boston_ma", &model, &standard_scaler(&[1.0, 2.0]), metadata_for(&model, 4))
        .unwrap();
    let service = ForecastService::new(
        Arc::new(ArtifactCache::new(store)),
        Arc::new(InMemorySeriesStore::new()),
        ServingConfig::default(),
    );

    let err = service.get_forecast("Nurse", "Boston, MA", 4).unwrap_err();
    assert!(matches!(err, ServingError::NotFound(_)));
    assert!(matches!(
        service.get_series("Nurse", "Boston, MA", None),
        Err(ServingError::NotFound(_))
    ));
}

#[test]
fn test_short_history_is_insufficient() {
    let f = fixture(0.0, &history(3));
    let err = f.service.get_forecast(ROLE, LOCATION, 4).unwrap_err();
    assert!(matches!(
        err,
        ServingError::InsufficientHistory { needed: 4, available: 3 }
    ));
}

#[test]
fn test_get_series_respects_max_weeks() {
    let f = fixture(0.0, &history(30));
    assert_eq!(f.service.get_series(ROLE, LOCATION, Some(5)).unwrap().len(), 5);
    assert_eq!(f.service.get_series(ROLE, LOCATION, None).unwrap().len(), 10);
}

#[test]
fn test_republished_artifact_is_served() {
    let f = fixture(0.0, &history(20));
    let before = f.service.get_forecast(ROLE, LOCATION, 2).unwrap();

    let model = constant_model(3, 1, 1.0);
    f.store
        .save(
            "data_scientist_austin_tx",
            &model,
            &standard_scaler(&[10.0, 20.0, 30.0]),
            metadata_for(&model, 4),
        )
        .unwrap();

    let after = f.service.get_forecast(ROLE, LOCATION, 2).unwrap();
    assert_ne!(before.model.version, after.model.version);
    assert!(after.forecast[0].value > before.forecast[0].value);
}

#[test]
fn test_concurrent_requests() {
    let f = Arc::new(fixture(0.0, &history(20)));
    let handles: Vec<_> = (1..=8)
        .map(|h| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || {
                f.service.get_forecast(ROLE, LOCATION, h).unwrap().forecast.len()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), i + 1);
    }
}
