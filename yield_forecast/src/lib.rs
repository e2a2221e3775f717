//! # Yield Forecast
//!
//! Model lifecycle engine for monthly yield forecasting.
//!
//! ## Features
//!
//! - Aggregation of irregular daily observations into monthly series
//! - Seasonal ARIMA models chosen by AIC grid search, and an additive
//!   decomposition model
//! - Versioned binary artifacts in an object store, read through a locked
//!   local cache
//! - A SQLite catalog of observations and artifact metadata
//! - Validation predictions, one- or twelve-month forecasts with intervals,
//!   and accuracy metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yield_forecast::{
//!     Algorithm, ArtifactStore, DataLoader, ForecastEngine, MemoryObjectBackend, SqliteCatalog,
//! };
//!
//! # async fn run() -> yield_forecast::Result<()> {
//! let catalog = Arc::new(SqliteCatalog::in_memory()?);
//! let store = ArtifactStore::connect(
//!     Arc::new(MemoryObjectBackend::new()),
//!     "algorithm",
//!     std::env::temp_dir().join("yieldcast-cache"),
//! )
//! .await?;
//! let engine = ForecastEngine::new(catalog, store);
//!
//! // Load and persist observations
//! let rows = DataLoader::from_csv("yields.csv")?;
//! engine.import(&rows).await?;
//!
//! // Train, then forecast the next twelve months
//! engine.train(Algorithm::Sarima, "Mango", Some("analyst")).await?;
//! let result = engine.predict(Algorithm::Sarima, "Mango", false, None).await?;
//! for point in result.forecast.points() {
//!     println!("{} {:.2}", point.period, point.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod selector;
pub mod storage;
pub mod synthetic;

// Re-export commonly used types
pub use crate::aggregate::SeriesAggregator;
pub use crate::catalog::{ArtifactMetadata, Catalog, SqliteCatalog};
pub use crate::config::{EngineConfig, StorageConfig};
pub use crate::data::{DataLoader, MonthlyPoint, MonthlyRow, MonthlySeries, ObservationRow};
pub use crate::engine::{Dataset, ForecastEngine, ForecastInterval, ForecastResult};
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::ForecastAccuracy;
pub use crate::models::{Algorithm, FittedForecast, FittedModel, ForecastModel};
pub use crate::selector::{GridMode, ModelSelector, Selection};
pub use crate::storage::{
    ArtifactStore, FsObjectBackend, MemoryObjectBackend, ObjectBackend, ResourceHandle,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
