use chrono::NaiveDate;
use demand_forecast::pipeline::train_and_export;
use demand_forecast::{
    ArtifactCache, ArtifactStore, ForecastService, InMemorySeriesStore, ServingConfig, TimeSeries,
    TrainingConfig,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Basic Example");
    println!("==============================\n");

    let role = "Software Engineer";
    let location = "Remote";
    let series = create_sample_series()?;
    println!(
        "Sample series: {} weeks from {} to {}\n",
        series.len(),
        series.first_date().unwrap_or_default(),
        series.last_date().unwrap_or_default()
    );

    // Artifacts go to a scratch directory so the example leaves nothing behind
    let artifacts = tempfile::tempdir()?;
    let config = TrainingConfig {
        role: role.to_string(),
        location: location.to_string(),
        hidden_size: 16,
        num_layers: 1,
        epochs: 30,
        artifacts_dir: artifacts.path().to_path_buf(),
        ..TrainingConfig::default()
    };

    println!("Training...");
    let store = ArtifactStore::new(&config.artifacts_dir);
    let outcome = train_and_export(&config, &series, &store)?;
    let meta = &outcome.metadata;
    println!(
        "Trained {} epochs (best epoch {}), published version {}",
        meta.training.epochs_trained, meta.training.best_epoch, outcome.version
    );
    println!("  LSTM one-step:  {}", meta.metrics);
    println!("  LSTM recursive: {}", meta.recursive);
    for (name, metrics) in &meta.baselines {
        println!("  {:<15} {}", format!("{}:", name), metrics);
    }

    // Serve from the published artifact
    let series_store = Arc::new(InMemorySeriesStore::new());
    series_store.insert(role, location, series);
    let service = ForecastService::new(
        Arc::new(ArtifactCache::new(store)),
        series_store,
        ServingConfig::default(),
    );

    let result = service.get_default_forecast(role, location)?;
    println!("\n{}-week forecast:", service.config().default_horizon);
    for point in &result.forecast {
        println!("  {}: {:.1}", point.week_start, point.value);
    }

    Ok(())
}

/// Two years of weekly postings with growth and a quarterly cycle
fn create_sample_series() -> Result<TimeSeries, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).ok_or("invalid start date")?;
    let values: Vec<f64> = (0..104)
        .map(|week| {
            let t = week as f64;
            120.0 + 0.8 * t + 25.0 * (t * std::f64::consts::TAU / 13.0).sin()
        })
        .collect();
    Ok(TimeSeries::from_values(start, &values)?)
}
