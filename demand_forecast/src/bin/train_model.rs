use demand_forecast::{logging, pipeline, TrainingConfig};
use std::process::ExitCode;
use tracing::{error, info};

// Usage: train_model [config.json]
// Values not in the file come from DEMANDCAST_* variables or defaults.
fn main() -> ExitCode {
    logging::init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid training configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        role = %config.role,
        location = %config.location,
        series = %config.series_path.display(),
        "starting training run"
    );
    match pipeline::run(&config) {
        Ok(outcome) => {
            info!(
                slug = %outcome.slug,
                version = %outcome.version,
                path = %outcome.artifact_path.display(),
                rmse = outcome.metadata.metrics.rmse,
                "training run finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "training run failed, no artifact written");
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> demand_forecast::error::Result<TrainingConfig> {
    let base = match std::env::args().nth(1) {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    };
    base.with_env_overrides()
}
