//! Forecasting models for monthly yield series
//!
//! Two algorithms share one capability set: a seasonal-regression model whose
//! orders are chosen by grid search, and an additive decomposition model with
//! a fixed configuration. [`Algorithm`] selects between them at the
//! orchestration boundary and [`FittedModel`] is the tagged result that gets
//! persisted.

use crate::data::{add_months, MonthlyPoint, MonthlySeries};
use crate::error::{ForecastError, Result};
use crate::selector::ModelSelector;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt::{self, Debug};
use std::str::FromStr;

pub mod decomposition;
pub mod sarima;

pub use decomposition::{DecompositionModel, FittedDecomposition};
pub use sarima::{FittedSarima, SarimaModel, SarimaOrder};

/// Months in a seasonal cycle
pub const SEASONAL_PERIOD: usize = 12;

/// Length of the backward-looking validation window
pub const VALIDATION_MONTHS: usize = 36;

/// Supported forecasting algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    /// Seasonal autoregressive integrated moving average
    Sarima,
    /// Linear trend plus monthly seasonal offsets
    Decomposition,
}

impl Algorithm {
    /// All known algorithms
    pub const ALL: [Algorithm; 2] = [Algorithm::Sarima, Algorithm::Decomposition];

    /// Stable name used in the catalog and in object paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sarima => "SARIMA",
            Algorithm::Decomposition => "DECOMPOSITION",
        }
    }

    /// Fit this algorithm to a series
    ///
    /// The seasonal-regression variant runs the selector's grid search first;
    /// the decomposition variant uses its single fixed configuration.
    pub fn train(&self, series: &MonthlySeries, selector: &ModelSelector) -> Result<FittedModel> {
        match self {
            Algorithm::Sarima => {
                let selection = selector.select_best(series)?;
                let fitted = SarimaModel::new(selection.order).train(series)?;
                Ok(FittedModel::Sarima(fitted))
            }
            Algorithm::Decomposition => {
                let fitted = DecompositionModel::default().train(series)?;
                Ok(FittedModel::Decomposition(fitted))
            }
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SARIMA" => Ok(Algorithm::Sarima),
            "DECOMPOSITION" => Ok(Algorithm::Decomposition),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown algorithm '{}', expected one of SARIMA, DECOMPOSITION",
                other
            ))),
        }
    }
}

/// Model configuration that can be trained on a monthly series
pub trait ForecastModel: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: FittedForecast;

    /// Train the model on a regular monthly series
    fn train(&self, series: &MonthlySeries) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// A fitted model able to retrodict and forecast
pub trait FittedForecast: Debug {
    /// In-sample one-step predictions over the trailing validation window
    fn predict(&self, series: &MonthlySeries) -> Result<MonthlySeries>;

    /// Reference actuals and forward forecast
    ///
    /// With `is_single_month` the forecast covers the next month and the
    /// reference is the month twelve months before it; otherwise the next
    /// twelve months against the trailing twelve actual months.
    fn forecast(
        &self,
        series: &MonthlySeries,
        is_single_month: bool,
    ) -> Result<(MonthlySeries, MonthlySeries)>;

    /// Lower and upper bounds for each forecast point
    fn intervals(&self, forecast: &MonthlySeries, confidence: f64) -> Result<Vec<(f64, f64)>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// A fitted model of either algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedModel {
    Sarima(FittedSarima),
    Decomposition(FittedDecomposition),
}

impl FittedModel {
    /// Algorithm that produced this model
    pub fn algorithm(&self) -> Algorithm {
        match self {
            FittedModel::Sarima(_) => Algorithm::Sarima,
            FittedModel::Decomposition(_) => Algorithm::Decomposition,
        }
    }
}

impl FittedForecast for FittedModel {
    fn predict(&self, series: &MonthlySeries) -> Result<MonthlySeries> {
        match self {
            FittedModel::Sarima(m) => m.predict(series),
            FittedModel::Decomposition(m) => m.predict(series),
        }
    }

    fn forecast(
        &self,
        series: &MonthlySeries,
        is_single_month: bool,
    ) -> Result<(MonthlySeries, MonthlySeries)> {
        match self {
            FittedModel::Sarima(m) => m.forecast(series, is_single_month),
            FittedModel::Decomposition(m) => m.forecast(series, is_single_month),
        }
    }

    fn intervals(&self, forecast: &MonthlySeries, confidence: f64) -> Result<Vec<(f64, f64)>> {
        match self {
            FittedModel::Sarima(m) => m.intervals(forecast, confidence),
            FittedModel::Decomposition(m) => m.intervals(forecast, confidence),
        }
    }

    fn name(&self) -> &str {
        match self {
            FittedModel::Sarima(m) => m.name(),
            FittedModel::Decomposition(m) => m.name(),
        }
    }
}

/// Number of future months for a forecast request
pub fn horizon(is_single_month: bool) -> usize {
    if is_single_month {
        1
    } else {
        SEASONAL_PERIOD
    }
}

/// First month of the validation window ending at `last`
pub fn validation_start(last: NaiveDate) -> Result<NaiveDate> {
    add_months(last, 1 - VALIDATION_MONTHS as i32)
}

/// Consecutive month starts following `last`
pub fn future_periods(last: NaiveDate, count: usize) -> Result<Vec<NaiveDate>> {
    (1..=count as i32).map(|i| add_months(last, i)).collect()
}

/// Actual values the forecast is compared against
pub fn reference_series(series: &MonthlySeries, is_single_month: bool) -> Result<MonthlySeries> {
    if !is_single_month {
        return Ok(series.tail(SEASONAL_PERIOD));
    }

    let last = match series.last_period() {
        Some(last) => last,
        None => return Ok(MonthlySeries::empty(series.category())),
    };
    let anchor = add_months(last, 1 - SEASONAL_PERIOD as i32)?;
    let points = series
        .value_at(anchor)
        .map(|value| vec![MonthlyPoint::new(anchor, value)])
        .unwrap_or_default();

    MonthlySeries::new(series.category(), points)
}

/// Two-sided standard normal quantile for a confidence level
pub fn z_score(confidence: f64) -> Result<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(ForecastError::InvalidParameter(
            "Confidence level must be between 0 and 1".to_string(),
        ));
    }

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + confidence / 2.0))
}

/// Reject series the models cannot work with
pub(crate) fn ensure_trainable(series: &MonthlySeries) -> Result<()> {
    if series.is_empty() {
        return Err(ForecastError::AggregationEmpty(series.category().to_string()));
    }
    if !series.is_regular() {
        return Err(ForecastError::DataError(format!(
            "Series for '{}' has missing months; aggregate with gap filling first",
            series.category()
        )));
    }
    if series.values().iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::DataError(
            "Series contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}
