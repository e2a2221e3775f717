//! Error types for the yield_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;
use yield_math::MathError;

/// Custom error types for the yield_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Aggregation produced no months for the category
    #[error("No observations to aggregate for category '{0}'")]
    AggregationEmpty(String),

    /// Every grid candidate failed to fit
    #[error("No viable model configuration among {evaluated} candidates")]
    NoViableConfiguration { evaluated: usize },

    /// Predict requested before any successful training run
    #[error("Algorithm {algorithm} has not been trained for category '{category}'")]
    NotTrained { algorithm: String, category: String },

    /// Metadata exists but the model payload is missing or corrupt
    #[error("Artifact {artifact_id} for {algorithm}/{category} is unavailable: {reason}")]
    ArtifactUnavailable {
        algorithm: String,
        category: String,
        artifact_id: String,
        reason: String,
    },

    /// Backend failed while writing an object
    #[error("Storage write error: {0}")]
    StorageWrite(String),

    /// Backend failed while reading an object
    #[error("Storage read error: {0}")]
    StorageRead(String),

    /// Resource handle belongs to another backend
    #[error("Invalid scheme: expected `{expected}://`, got `{found}`")]
    InvalidScheme { expected: String, found: String },

    /// Resource handle could not be parsed
    #[error("Invalid resource handle: {0}")]
    InvalidResource(String),

    /// Model selection exceeded the configured deadline
    #[error("Training timed out after {0:?}")]
    TrainingTimedOut(std::time::Duration),

    /// Error from the relational catalog
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Error while encoding or decoding a model artifact
    #[error("Codec error: {0}")]
    Codec(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from numeric kernels
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

impl ForecastError {
    /// Predict was requested for a pair that was never trained
    pub fn is_not_trained(&self) -> bool {
        matches!(self, ForecastError::NotTrained { .. })
    }

    /// Metadata and payload disagree
    pub fn is_artifact_unavailable(&self) -> bool {
        matches!(self, ForecastError::ArtifactUnavailable { .. })
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<rusqlite::Error> for ForecastError {
    fn from(err: rusqlite::Error) -> Self {
        ForecastError::Catalog(err.to_string())
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(err: bincode::Error) -> Self {
        ForecastError::Codec(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ForecastError {
    fn from(err: tokio::task::JoinError) -> Self {
        ForecastError::Task(err.to_string())
    }
}
