use demand_forecast::{logging, ForecastService, ServingConfig};
use std::process::ExitCode;
use tracing::error;

// Usage: forecast <role> <location> [horizon] [serving.json]
// Without a horizon the configured default is used. Without a config file
// settings come from DEMANDCAST_* variables or defaults.
fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (role, location) = match (args.first(), args.get(1)) {
        (Some(role), Some(location)) => (role.as_str(), location.as_str()),
        _ => {
            eprintln!("usage: forecast <role> <location> [horizon] [serving.json]");
            return ExitCode::FAILURE;
        }
    };

    let config = match args.get(3) {
        Some(path) => ServingConfig::from_json_file(path),
        None => ServingConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid serving configuration");
            return ExitCode::FAILURE;
        }
    };
    let service = ForecastService::from_config(config);

    let result = match args.get(2).map(|h| h.parse::<usize>()) {
        Some(Ok(horizon)) => service.get_forecast(role, location, horizon),
        Some(Err(_)) => {
            error!(horizon = %args[2], "horizon is not a number");
            return ExitCode::FAILURE;
        }
        None => service.get_default_forecast(role, location),
    };

    match result.map(|r| serde_json::to_string_pretty(&r)) {
        Ok(Ok(json)) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Ok(Err(err)) => {
            error!(error = %err, "could not encode forecast");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(error = %err, role, location, "forecast failed");
            ExitCode::FAILURE
        }
    }
}
