//! Train and predict orchestration
//!
//! Train: aggregate → select and fit → serialize → evict previous → persist.
//! Nothing is written before the persist step, so a failure or timeout earlier
//! leaves the store untouched. Eviction failures are logged and ignored.
//!
//! Predict: look up metadata → fetch → deserialize → aggregate → predict and
//! forecast → assemble. A missing metadata row is [`ForecastError::NotTrained`];
//! a row whose payload cannot be fetched or decoded is
//! [`ForecastError::ArtifactUnavailable`].
//!
//! Two concurrent `train` calls for the same pair are not serialized here; the
//! last metadata insert wins.

use crate::aggregate::SeriesAggregator;
use crate::catalog::{ArtifactMetadata, Catalog, SqliteCatalog};
use crate::codec;
use crate::config::EngineConfig;
use crate::data::{MonthlyRow, MonthlySeries, ObservationRow};
use crate::error::{ForecastError, Result};
use crate::metrics::{series_accuracy, ForecastAccuracy};
use crate::models::{Algorithm, FittedForecast, FittedModel};
use crate::selector::ModelSelector;
use crate::storage::{ArtifactStore, FsObjectBackend};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

const ANONYMOUS: &str = "-";

/// Object namespace holding the artifacts of one (algorithm, category) pair
pub fn artifact_namespace(algorithm: Algorithm, category: &str) -> String {
    format!("{}/{}", algorithm.as_str(), category)
}

/// Bounds of one forecast point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastInterval {
    pub period: NaiveDate,
    pub lower: f64,
    pub upper: f64,
}

/// Everything returned by a predict request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub algorithm: Algorithm,
    pub category: String,
    pub artifact_id: String,
    /// Last month the model was trained on
    pub trained_through: NaiveDate,
    /// Last observed month at prediction time
    pub last_period: NaiveDate,
    /// Actual values the forecast is compared against
    pub reference: MonthlySeries,
    /// In-sample predictions over the trailing three years
    pub validation: MonthlySeries,
    pub forecast: MonthlySeries,
    pub intervals: Vec<ForecastInterval>,
    pub confidence_level: f64,
    /// Validation accuracy against the observed months
    pub accuracy: Option<ForecastAccuracy>,
}

/// Flat row of a [`ForecastResult`] for tabular output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub series: &'static str,
    pub period: NaiveDate,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl ForecastResult {
    /// Reference, validation and forecast points as one table
    pub fn rows(&self) -> Vec<ResultRow> {
        let plain = |series: &'static str, source: &MonthlySeries| {
            source
                .points()
                .iter()
                .map(move |p| ResultRow {
                    series,
                    period: p.period,
                    value: p.value,
                    lower: None,
                    upper: None,
                })
                .collect::<Vec<_>>()
        };

        let mut rows = plain("reference", &self.reference);
        rows.extend(plain("validation", &self.validation));
        rows.extend(
            self.forecast
                .points()
                .iter()
                .zip(&self.intervals)
                .map(|(p, bounds)| ResultRow {
                    series: "forecast",
                    period: p.period,
                    value: p.value,
                    lower: Some(bounds.lower),
                    upper: Some(bounds.upper),
                }),
        );
        rows
    }
}

/// Raw or monthly observations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Dataset {
    Daily(Vec<ObservationRow>),
    Monthly(Vec<MonthlyRow>),
}

impl Dataset {
    pub fn len(&self) -> usize {
        match self {
            Dataset::Daily(rows) => rows.len(),
            Dataset::Monthly(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Model lifecycle orchestrator
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    catalog: Arc<dyn Catalog>,
    store: ArtifactStore,
    aggregator: SeriesAggregator,
    selector: Arc<ModelSelector>,
    train_timeout: Option<Duration>,
    confidence_level: f64,
}

impl ForecastEngine {
    /// Engine with the default selector, no training deadline and 95% intervals
    pub fn new(catalog: Arc<dyn Catalog>, store: ArtifactStore) -> Self {
        Self {
            catalog,
            store,
            aggregator: SeriesAggregator::new(),
            selector: Arc::new(ModelSelector::default()),
            train_timeout: None,
            confidence_level: 0.95,
        }
    }

    /// Open the SQLite catalog and filesystem store named by `config`
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let catalog = SqliteCatalog::open(&config.database_path)?;
        let backend = FsObjectBackend::from_endpoint(&config.storage.endpoint)?;
        let store = ArtifactStore::connect(
            Arc::new(backend),
            config.storage.bucket.clone(),
            config.storage.cache_dir.clone(),
        )
        .await?;

        Ok(Self::new(Arc::new(catalog), store)
            .with_selector(ModelSelector::new(config.grid_mode))
            .with_train_timeout(config.train_timeout())
            .with_confidence_level(config.confidence_level))
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    pub fn with_train_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.train_timeout = timeout;
        self
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Persist raw observations
    pub async fn import(&self, rows: &[ObservationRow]) -> Result<Vec<i64>> {
        let ids = self.catalog.insert_observations(rows).await?;
        info!(rows = ids.len(), "observations imported");
        Ok(ids)
    }

    /// Raw rows, or their display-mode monthly sums, for a category prefix
    pub async fn dataset(&self, category_prefix: Option<&str>, monthly: bool) -> Result<Dataset> {
        let rows = self.catalog.observations(category_prefix).await?;
        if !monthly {
            return Ok(Dataset::Daily(rows));
        }
        Ok(Dataset::Monthly(
            self.aggregator.aggregate_rows(&rows, None, false)?,
        ))
    }

    /// Live artifact for a pair, if one has been trained
    pub async fn check(
        &self,
        algorithm: Algorithm,
        category: &str,
    ) -> Result<Option<ArtifactMetadata>> {
        Ok(self
            .catalog
            .find_artifacts(algorithm, category)
            .await?
            .into_iter()
            .next())
    }

    /// Fit a model for a category and make it the live artifact
    pub async fn train(
        &self,
        algorithm: Algorithm,
        category: &str,
        user: Option<&str>,
    ) -> Result<ArtifactMetadata> {
        let user = user.unwrap_or(ANONYMOUS);
        let started = Instant::now();
        info!(%algorithm, category, user, "training started");

        // Reject categories that cannot name an object before any fitting
        let namespace = artifact_namespace(algorithm, category);
        let id = Uuid::new_v4().to_string();
        self.store.resolve_url(&namespace, &id).bucket_and_object()?;

        let series = self.training_series(category).await?;
        let last_period = series
            .last_period()
            .ok_or_else(|| ForecastError::AggregationEmpty(category.to_string()))?;
        debug!(%algorithm, category, months = series.len(), "series aggregated");

        let fitted = self.fit(algorithm, series).await?;
        debug!(%algorithm, category, model = fitted.name(), "model fitted");

        let bytes = codec::encode(&fitted)?;

        self.evict_previous(algorithm, category).await;

        let metadata = ArtifactMetadata {
            id,
            algorithm,
            category: category.to_string(),
            last_period,
        };
        let handle = self.store.put(&namespace, &metadata.id, bytes).await?;

        if let Err(err) = self.catalog.insert_artifact(&metadata).await {
            warn!(handle = %handle, error = %err, "metadata insert failed, removing uploaded artifact");
            if let Err(cleanup) = self.store.remove(&handle).await {
                warn!(handle = %handle, error = %cleanup, "could not remove orphaned artifact");
            }
            return Err(err);
        }

        info!(
            %algorithm,
            category,
            user,
            artifact = %metadata.id,
            last_period = %last_period,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "training finished"
        );
        Ok(metadata)
    }

    /// Validation and forecast from the live artifact of a pair
    pub async fn predict(
        &self,
        algorithm: Algorithm,
        category: &str,
        is_single_month: bool,
        user: Option<&str>,
    ) -> Result<ForecastResult> {
        let user = user.unwrap_or(ANONYMOUS);
        info!(%algorithm, category, user, is_single_month, "prediction started");

        let metadata = self.check(algorithm, category).await?.ok_or_else(|| {
            ForecastError::NotTrained {
                algorithm: algorithm.to_string(),
                category: category.to_string(),
            }
        })?;

        let model = self.load(&metadata).await?;
        let series = self.training_series(category).await?;
        let last_period = series
            .last_period()
            .ok_or_else(|| ForecastError::AggregationEmpty(category.to_string()))?;

        let validation = model.predict(&series)?;
        let (reference, forecast) = model.forecast(&series, is_single_month)?;
        let intervals = model
            .intervals(&forecast, self.confidence_level)?
            .into_iter()
            .zip(forecast.points())
            .map(|((lower, upper), point)| ForecastInterval {
                period: point.period,
                lower,
                upper,
            })
            .collect();
        let accuracy = series_accuracy(&validation, &series)?;

        info!(
            %algorithm,
            category,
            user,
            artifact = %metadata.id,
            horizon = forecast.len(),
            "prediction finished"
        );

        Ok(ForecastResult {
            algorithm,
            category: category.to_string(),
            artifact_id: metadata.id,
            trained_through: metadata.last_period,
            last_period,
            reference,
            validation,
            forecast,
            intervals,
            confidence_level: self.confidence_level,
            accuracy,
        })
    }

    /// Close the catalog
    pub async fn close(&self) -> Result<()> {
        self.catalog.close().await
    }

    /// Gap-filled series over the global range of all observations
    async fn training_series(&self, category: &str) -> Result<MonthlySeries> {
        let rows = self.catalog.observations(None).await?;
        let series = self.aggregator.aggregate(&rows, category, true)?;
        if series.is_empty() {
            return Err(ForecastError::AggregationEmpty(category.to_string()));
        }
        Ok(series)
    }

    /// Run selection and fitting on the blocking pool, under the deadline if set
    async fn fit(&self, algorithm: Algorithm, series: MonthlySeries) -> Result<FittedModel> {
        let selector = Arc::clone(&self.selector);
        let job = tokio::task::spawn_blocking(move || algorithm.train(&series, &selector));

        let joined = match self.train_timeout {
            Some(limit) => match tokio::time::timeout(limit, job).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(%algorithm, timeout_secs = limit.as_secs(), "training timed out");
                    return Err(ForecastError::TrainingTimedOut(limit));
                }
            },
            None => job.await,
        };
        joined?
    }

    /// Remove every artifact of the pair; failures are logged only
    async fn evict_previous(&self, algorithm: Algorithm, category: &str) {
        let previous = match self.catalog.find_artifacts(algorithm, category).await {
            Ok(previous) => previous,
            Err(err) => {
                warn!(%algorithm, category, error = %err, "could not list previous artifacts");
                return;
            }
        };

        let namespace = artifact_namespace(algorithm, category);
        for metadata in previous {
            let handle = self.store.resolve_url(&namespace, &metadata.id);
            if let Err(err) = self.store.remove(&handle).await {
                warn!(handle = %handle, error = %err, "could not remove previous artifact");
            }
            match self.catalog.delete_artifact(&metadata.id).await {
                Ok(_) => debug!(artifact = %metadata.id, "previous artifact evicted"),
                Err(err) => {
                    warn!(artifact = %metadata.id, error = %err, "could not delete previous metadata")
                }
            }
        }
    }

    /// Fetch and decode an artifact; any failure means the payload is unavailable
    async fn load(&self, metadata: &ArtifactMetadata) -> Result<FittedModel> {
        let unavailable = |reason: String| {
            warn!(artifact = %metadata.id, reason = %reason, "artifact unavailable");
            ForecastError::ArtifactUnavailable {
                algorithm: metadata.algorithm.to_string(),
                category: metadata.category.clone(),
                artifact_id: metadata.id.clone(),
                reason,
            }
        };

        let namespace = artifact_namespace(metadata.algorithm, &metadata.category);
        let handle = self.store.resolve_url(&namespace, &metadata.id);
        let bytes = self
            .store
            .read(&handle)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let model = codec::decode(&bytes).map_err(|e| unavailable(e.to_string()))?;

        if model.algorithm() != metadata.algorithm {
            return Err(unavailable(format!(
                "payload holds a {} model",
                model.algorithm()
            )));
        }
        Ok(model)
    }
}
