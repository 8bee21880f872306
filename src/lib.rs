//! # Demandcast
//!
//! Umbrella crate for the demand forecasting workspace.
//!
//! - [`forecast_math`]: scaling, ring buffer, moving averages, differencing
//!   and least squares on plain `f64` slices
//! - [`demand_forecast`]: datasets, the LSTM model and its trainer,
//!   baselines, artifacts and the forecast service
//!
//! ## Example
//!
//! ```
//! use demandcast::demand_forecast::utils::slug;
//!
//! assert_eq!(slug("Software Engineer", "New York, NY"), "software_engineer_new_york_ny");
//! ```

pub use demand_forecast;
pub use forecast_math;
