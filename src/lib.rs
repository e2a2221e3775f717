//! # Yieldcast
//!
//! Umbrella crate for the yieldcast workspace.
//!
//! - [`yield_math`]: numeric kernels (least squares, differencing, trend fits,
//!   information criteria)
//! - [`yield_forecast`]: the model lifecycle engine, storage and CLI
//!
//! ## Example
//!
//! ```
//! use yieldcast_workspace::yield_forecast::{Algorithm, MonthlySeries};
//! use yieldcast_workspace::yield_forecast::models::FittedForecast;
//! use yieldcast_workspace::yield_forecast::ModelSelector;
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//! let values: Vec<f64> = (0..36)
//!     .map(|i| 50.0 + (i % 12) as f64 * 2.0 + (i % 5) as f64 * 0.3)
//!     .collect();
//! let series = MonthlySeries::from_values("Mango", start, &values).unwrap();
//!
//! let model = Algorithm::Decomposition
//!     .train(&series, &ModelSelector::default())
//!     .unwrap();
//! let (_, forecast) = model.forecast(&series, false).unwrap();
//! assert_eq!(forecast.len(), 12);
//! ```

pub use yield_forecast;
pub use yield_math;
