//! Additive decomposition model: linear trend plus monthly seasonal offsets

use crate::data::{months_between, MonthlyPoint, MonthlySeries};
use crate::error::{ForecastError, Result};
use crate::models::{
    ensure_trainable, future_periods, horizon, reference_series, validation_start, z_score,
    FittedForecast, ForecastModel, SEASONAL_PERIOD,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;
use yield_math::forecasting::LinearTrend;

/// Additive trend + seasonality model with a fixed configuration
#[derive(Debug, Clone)]
pub struct DecompositionModel {
    /// Name of the model
    name: String,
}

/// Trained decomposition model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedDecomposition {
    /// Name of the model
    name: String,
    /// Month at trend position zero
    origin: NaiveDate,
    /// Linear trend over month positions
    trend: LinearTrend,
    /// Offset per calendar month, January first; sums to zero over seen months
    seasonal: Vec<f64>,
    /// Standard deviation of the in-sample residuals
    sigma: f64,
}

impl Default for DecompositionModel {
    fn default() -> Self {
        Self {
            name: "Additive Decomposition".to_string(),
        }
    }
}

impl ForecastModel for DecompositionModel {
    type Fitted = FittedDecomposition;

    fn train(&self, series: &MonthlySeries) -> Result<FittedDecomposition> {
        ensure_trainable(series)?;
        let values = series.values();
        let origin = series
            .first_period()
            .ok_or_else(|| ForecastError::AggregationEmpty(series.category().to_string()))?;

        // Fall back to a flat trend rather than fail on a degenerate fit
        let trend = LinearTrend::fit(&values).unwrap_or_else(|err| {
            debug!(error = %err, "trend fit failed, using flat mean");
            LinearTrend::new(values.iter().sum::<f64>() / values.len() as f64, 0.0)
        });

        let mut sums = vec![0.0; SEASONAL_PERIOD];
        let mut counts = vec![0usize; SEASONAL_PERIOD];
        for (i, point) in series.points().iter().enumerate() {
            let slot = point.period.month0() as usize;
            sums[slot] += point.value - trend.value_at(i as f64);
            counts[slot] += 1;
        }

        let seen = counts.iter().filter(|&&c| c > 0).count();
        let mut seasonal: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();
        let centre = seasonal.iter().sum::<f64>() / seen.max(1) as f64;
        for (offset, &count) in seasonal.iter_mut().zip(&counts) {
            if count > 0 {
                *offset -= centre;
            }
        }

        let mut fitted = FittedDecomposition {
            name: self.name.clone(),
            origin,
            trend,
            seasonal,
            sigma: 0.0,
        };

        let squared: f64 = series
            .points()
            .iter()
            .map(|p| (p.value - fitted.value_at(p.period)).powi(2))
            .sum();
        let sigma = (squared / values.len() as f64).sqrt();
        fitted.sigma = if sigma.is_finite() { sigma } else { 0.0 };

        Ok(fitted)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FittedDecomposition {
    /// Model value for a month
    pub fn value_at(&self, period: NaiveDate) -> f64 {
        let x = months_between(self.origin, period) as f64;
        self.trend.value_at(x) + self.seasonal[period.month0() as usize]
    }

    pub fn trend(&self) -> LinearTrend {
        self.trend
    }

    pub fn seasonal(&self) -> &[f64] {
        &self.seasonal
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl FittedForecast for FittedDecomposition {
    fn predict(&self, series: &MonthlySeries) -> Result<MonthlySeries> {
        ensure_trainable(series)?;
        let last = series
            .last_period()
            .ok_or_else(|| ForecastError::AggregationEmpty(series.category().to_string()))?;
        let start = validation_start(last)?;

        let points = series
            .points()
            .iter()
            .filter(|p| p.period >= start)
            .map(|p| MonthlyPoint::new(p.period, self.value_at(p.period)))
            .collect();

        MonthlySeries::new(series.category(), points)
    }

    fn forecast(
        &self,
        series: &MonthlySeries,
        is_single_month: bool,
    ) -> Result<(MonthlySeries, MonthlySeries)> {
        ensure_trainable(series)?;
        let last = series
            .last_period()
            .ok_or_else(|| ForecastError::AggregationEmpty(series.category().to_string()))?;

        let points = future_periods(last, horizon(is_single_month))?
            .into_iter()
            .map(|period| MonthlyPoint::new(period, self.value_at(period)))
            .collect();

        Ok((
            reference_series(series, is_single_month)?,
            MonthlySeries::new(series.category(), points)?,
        ))
    }

    fn intervals(&self, forecast: &MonthlySeries, confidence: f64) -> Result<Vec<(f64, f64)>> {
        let margin = z_score(confidence)? * self.sigma;
        Ok(forecast
            .points()
            .iter()
            .map(|p| (p.value - margin, p.value + margin))
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
