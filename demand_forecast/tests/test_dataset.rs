mod common;

use common::{monday, weekly};
use demand_forecast::dataset::{chronological_split, fit_scaler, make_windows};
use demand_forecast::{ContextPolicy, ForecastError, SplitKind, WindowDataset, WindowSample};
use forecast_math::{ScalerKind, ScalerState};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case(1, (0.70, 0.15, 0.15))]
#[case(7, (0.70, 0.15, 0.15))]
#[case(20, (0.70, 0.15, 0.15))]
#[case(101, (0.70, 0.15, 0.15))]
#[case(33, (0.5, 0.25, 0.25))]
#[case(10, (1.0, 0.0, 0.0))]
fn test_split_concatenation_reproduces_series(#[case] n: usize, #[case] ratios: (f64, f64, f64)) {
    let values: Vec<f64> = (0..n).map(|i| (i * 3 % 17) as f64).collect();
    let series = weekly(&values);
    let splits = chronological_split(&series, ratios).unwrap();

    assert_eq!(splits.concat(), series.points().to_vec());
    assert_eq!(splits.validation.offset(), splits.train.len());
    assert_eq!(splits.test.offset(), splits.train.len() + splits.validation.len());
}

#[test]
fn test_split_sizes_and_order() {
    let series = weekly(&(0..100).map(|i| i as f64).collect::<Vec<_>>());
    let splits = chronological_split(&series, (0.70, 0.15, 0.15)).unwrap();
    assert_eq!(splits.train.len(), 70);
    assert_eq!(splits.validation.len(), 15);
    assert_eq!(splits.test.len(), 15);

    let train = splits.train.date_range().unwrap();
    let val = splits.validation.date_range().unwrap();
    let test = splits.test.date_range().unwrap();
    assert!(train.end < val.start);
    assert!(val.end < test.start);
    assert_eq!(train.start, monday());
}

#[test]
fn test_split_rejects_bad_ratios() {
    let series = weekly(&[1.0, 2.0, 3.0]);
    assert!(chronological_split(&series, (0.7, 0.2, 0.2)).is_err());
    assert!(chronological_split(&series, (1.2, -0.1, -0.1)).is_err());
}

#[rstest]
#[case(0, 3, 0)]
#[case(3, 3, 0)]
#[case(4, 3, 1)]
#[case(20, 12, 8)]
#[case(50, 1, 49)]
fn test_window_count(#[case] len: usize, #[case] window: usize, #[case] expected: usize) {
    let values: Vec<f64> = (0..len).map(|i| i as f64).collect();
    let samples = make_windows(&values, window);
    assert_eq!(samples.len(), expected);
    assert!(samples.iter().all(|s| s.input.len() == window));
}

#[test]
fn test_arithmetic_series_windows() {
    let values: Vec<f64> = (0..20).map(|i| 10.0 + 2.0 * i as f64).collect();
    let samples = make_windows(&values, 12);

    assert_eq!(samples.len(), 8);
    let expected_input: Vec<f64> = (0..12).map(|i| 10.0 + 2.0 * i as f64).collect();
    assert_eq!(samples[0].input, expected_input);
    assert_eq!(samples[0].input.first(), Some(&10.0));
    assert_eq!(samples[0].input.last(), Some(&32.0));
    assert_eq!(samples[0].target, 34.0);
    assert_eq!(samples[7].target, 48.0);
}

#[test]
fn test_short_train_segment_is_insufficient() {
    // 3 points at 70/15/15: train gets 2, validation 0, test 1.
    let series = weekly(&[5.0, 6.0, 7.0]);
    let splits = chronological_split(&series, (0.70, 0.15, 0.15)).unwrap();
    assert_eq!(splits.train.len(), 2);

    let err = WindowDataset::build(&splits, ScalerKind::Standard, 12, ContextPolicy::CarryOver)
        .unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)), "got {:?}", err);
}

#[test]
fn test_scaler_fit_refuses_held_out_splits() {
    let series = weekly(&(0..40).map(|i| i as f64).collect::<Vec<_>>());
    let splits = chronological_split(&series, (0.70, 0.15, 0.15)).unwrap();

    for kind in [SplitKind::Validation, SplitKind::Test] {
        let err = fit_scaler(ScalerKind::MinMax, splits.get(kind)).unwrap_err();
        assert!(matches!(err, ForecastError::LeakageGuard(_)));
    }
    assert!(fit_scaler(ScalerKind::MinMax, &splits.train).is_ok());
}

#[test]
fn test_scaler_sees_only_train_values() {
    // Test segment holds a spike far outside the train range.
    let mut values: Vec<f64> = (0..30).map(|i| 10.0 + (i % 5) as f64).collect();
    values[28] = 1_000.0;
    let series = weekly(&values);
    let splits = chronological_split(&series, (0.70, 0.15, 0.15)).unwrap();

    let dataset =
        WindowDataset::build(&splits, ScalerKind::Standard, 4, ContextPolicy::CarryOver).unwrap();
    let train_only = ScalerState::fit(ScalerKind::Standard, &splits.train.values()).unwrap();
    assert_eq!(dataset.scaler, train_only);

    // The spike is transformed linearly, not clipped.
    let spike = dataset.scaler.transform_one(1_000.0);
    assert!(spike > 100.0);
}

#[test]
fn test_context_policies() {
    let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
    let series = weekly(&values);
    let splits = chronological_split(&series, (0.70, 0.15, 0.15)).unwrap();
    // train 28, validation 6, test 6
    let window = 4;

    let carry =
        WindowDataset::build(&splits, ScalerKind::MinMax, window, ContextPolicy::CarryOver)
            .unwrap();
    assert_eq!(carry.train.len(), 24);
    assert_eq!(carry.validation.len(), 5);
    assert_eq!(carry.test.len(), 5);

    // The first validation input ends on the first validation value and
    // reaches back W - 1 values into train.
    let scaler = &carry.scaler;
    let original = |sample: &WindowSample| -> Vec<f64> {
        scaler
            .inverse_transform(&sample.input)
            .iter()
            .map(|v| v.round())
            .collect()
    };
    let first = &carry.validation[0];
    assert_eq!(original(first), vec![25.0, 26.0, 27.0, 28.0]);
    assert!((scaler.inverse_one(first.target) - 29.0).abs() < 1e-9);

    // Every held-out input includes at least one value of its own segment.
    for sample in &carry.validation {
        assert!(original(sample).iter().any(|&v| v >= 28.0), "{:?}", original(sample));
    }
    for sample in &carry.test {
        assert!(original(sample).iter().any(|&v| v >= 34.0), "{:?}", original(sample));
    }
    // Test targets stay inside the test segment.
    let test_targets: Vec<f64> = carry
        .test
        .iter()
        .map(|s| scaler.inverse_one(s.target).round())
        .collect();
    assert_eq!(test_targets, vec![35.0, 36.0, 37.0, 38.0, 39.0]);

    let isolated =
        WindowDataset::build(&splits, ScalerKind::MinMax, window, ContextPolicy::Isolated)
            .unwrap();
    assert_eq!(isolated.train.len(), 24);
    assert_eq!(isolated.validation.len(), 2);
    assert_eq!(isolated.test.len(), 2);
}
