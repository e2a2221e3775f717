//! Seasonal ARIMA models for monthly yield series
//!
//! The series is differenced with `(1 - B)^d (1 - B^s)^D` and the result is
//! regressed on its own non-seasonal and seasonal lags. Moving average terms
//! are estimated with the Hannan-Rissanen two-stage procedure: a long
//! autoregression supplies innovation estimates which then enter the final
//! least squares fit as regressors. Scores use the Gaussian conditional
//! likelihood of the recursive residuals.

use crate::data::{MonthlyPoint, MonthlySeries};
use crate::error::{ForecastError, Result};
use crate::models::{
    ensure_trainable, future_periods, horizon, reference_series, validation_start, z_score,
    FittedForecast, ForecastModel, SEASONAL_PERIOD,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use yield_math::differencing::{self, difference_polynomial, integrate_step};
use yield_math::forecasting::psi_weights;
use yield_math::information::{aic, gaussian_log_likelihood, variance_floor};
use yield_math::linalg::least_squares;
use yield_math::MathError;

/// Non-seasonal and seasonal orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SarimaOrder {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
    /// Seasonal AR order (P)
    pub seasonal_p: usize,
    /// Seasonal differencing order (D)
    pub seasonal_d: usize,
    /// Seasonal MA order (Q)
    pub seasonal_q: usize,
    /// Seasonal period (s)
    pub period: usize,
}

impl SarimaOrder {
    /// Build from `(p, d, q)` and `(P, D, Q, s)`
    pub fn new(order: (usize, usize, usize), seasonal: (usize, usize, usize, usize)) -> Self {
        Self {
            p: order.0,
            d: order.1,
            q: order.2,
            seasonal_p: seasonal.0,
            seasonal_d: seasonal.1,
            seasonal_q: seasonal.2,
            period: seasonal.3,
        }
    }

    /// Lags of the autoregressive part, ascending and deduplicated
    pub fn ar_lags(&self) -> Vec<usize> {
        merge_lags(self.p, self.seasonal_p, self.period)
    }

    /// Lags of the moving average part, ascending and deduplicated
    pub fn ma_lags(&self) -> Vec<usize> {
        merge_lags(self.q, self.seasonal_q, self.period)
    }
}

impl Default for SarimaOrder {
    fn default() -> Self {
        Self::new((0, 0, 0), (0, 0, 0, SEASONAL_PERIOD))
    }
}

impl fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{})[{}]",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

fn merge_lags(order: usize, seasonal_order: usize, period: usize) -> Vec<usize> {
    let mut lags: Vec<usize> = (1..=order).collect();
    if period > 0 {
        lags.extend((1..=seasonal_order).map(|k| k * period));
    }
    lags.sort_unstable();
    lags.dedup();
    lags
}

/// Seasonal ARIMA model with fixed orders
#[derive(Debug, Clone)]
pub struct SarimaModel {
    /// Name of the model
    name: String,
    /// Orders to fit
    order: SarimaOrder,
}

/// Trained seasonal ARIMA model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSarima {
    /// Name of the model
    name: String,
    /// Fitted orders
    order: SarimaOrder,
    /// Constant of the differenced series
    constant: f64,
    /// Autoregressive coefficients as (lag, coefficient)
    ar: Vec<(usize, f64)>,
    /// Moving average coefficients as (lag, coefficient)
    ma: Vec<(usize, f64)>,
    /// Innovation variance
    sigma2: f64,
    /// Akaike Information Criterion of the fit
    aic: f64,
    /// Residuals that entered the likelihood
    nobs: usize,
}

impl SarimaModel {
    /// Create a new model for the given orders
    pub fn new(order: SarimaOrder) -> Self {
        Self {
            name: order.to_string(),
            order,
        }
    }

    pub fn order(&self) -> SarimaOrder {
        self.order
    }

    /// Fit and return only the AIC
    pub fn score(&self, series: &MonthlySeries) -> Result<f64> {
        Ok(self.train(series)?.aic)
    }

    /// Residuals of a long autoregression, zero during its warm-up
    fn innovations(w: &[f64], order: usize) -> Result<Vec<f64>> {
        let design: Vec<Vec<f64>> = (order..w.len())
            .map(|t| {
                let mut row = Vec::with_capacity(order + 1);
                row.push(1.0);
                row.extend((1..=order).map(|l| w[t - l]));
                row
            })
            .collect();
        let target = &w[order.min(w.len())..];
        let beta = least_squares(&design, target)?;

        let mut innovations = vec![0.0; w.len()];
        for (i, row) in design.iter().enumerate() {
            let fitted: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
            innovations[order + i] = w[order + i] - fitted;
        }
        Ok(innovations)
    }
}

impl ForecastModel for SarimaModel {
    type Fitted = FittedSarima;

    fn train(&self, series: &MonthlySeries) -> Result<FittedSarima> {
        ensure_trainable(series)?;
        let order = self.order;
        if (order.seasonal_p > 0 || order.seasonal_q > 0) && order.period == 0 {
            return Err(ForecastError::InvalidParameter(
                "Seasonal terms need a seasonal period".to_string(),
            ));
        }

        let values = series.values();
        let poly = difference_polynomial(order.d, order.seasonal_d, order.period)?;
        let w = differencing::apply(&values, &poly)?;

        let ar_lags = order.ar_lags();
        let ma_lags = order.ma_lags();
        let max_ar = ar_lags.last().copied().unwrap_or(0);
        let max_ma = ma_lags.last().copied().unwrap_or(0);

        // Stage one: innovation estimates for the MA regressors
        let (innovations, start) = if ma_lags.is_empty() {
            (vec![0.0; w.len()], max_ar)
        } else {
            let long_order = max_ar.max(max_ma) + 1;
            if w.len() <= 2 * long_order + 1 {
                return Err(MathError::InsufficientData(format!(
                    "{} needs more than {} differenced observations, got {}",
                    self.name,
                    2 * long_order + 1,
                    w.len()
                ))
                .into());
            }
            (
                Self::innovations(&w, long_order)?,
                max_ar.max(long_order + max_ma),
            )
        };

        // Stage two: regression on lagged values and lagged innovations
        let regressors = 1 + ar_lags.len() + ma_lags.len();
        let rows = w.len().saturating_sub(start);
        if rows <= regressors {
            return Err(MathError::InsufficientData(format!(
                "{} has {} regressors but only {} usable observations",
                self.name, regressors, rows
            ))
            .into());
        }

        let design: Vec<Vec<f64>> = (start..w.len())
            .map(|t| {
                let mut row = Vec::with_capacity(regressors);
                row.push(1.0);
                row.extend(ar_lags.iter().map(|&l| w[t - l]));
                row.extend(ma_lags.iter().map(|&l| innovations[t - l]));
                row
            })
            .collect();
        let beta = least_squares(&design, &w[start..])?;

        let mut fitted = FittedSarima {
            name: self.name.clone(),
            order,
            constant: beta[0],
            ar: ar_lags
                .iter()
                .copied()
                .zip(beta[1..=ar_lags.len()].iter().copied())
                .collect(),
            ma: ma_lags
                .iter()
                .copied()
                .zip(beta[1 + ar_lags.len()..].iter().copied())
                .collect(),
            sigma2: 0.0,
            aic: f64::INFINITY,
            nobs: 0,
        };

        let residuals = fitted.residuals(&w)?;
        let scored = &residuals[fitted.warmup()..];
        let log_likelihood = gaussian_log_likelihood(scored, variance_floor(&values))?;

        fitted.nobs = scored.len();
        fitted.sigma2 = scored.iter().map(|e| e * e).sum::<f64>() / scored.len() as f64;
        fitted.aic = aic(log_likelihood, regressors + 1);

        if !fitted.aic.is_finite() {
            return Err(MathError::CalculationError(format!(
                "{} produced a non-finite AIC",
                self.name
            ))
            .into());
        }

        Ok(fitted)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FittedSarima {
    pub fn order(&self) -> SarimaOrder {
        self.order
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn nobs(&self) -> usize {
        self.nobs
    }

    /// Observations of the differenced series consumed before residuals exist
    fn warmup(&self) -> usize {
        let max_ar = self.ar.iter().map(|(l, _)| *l).max().unwrap_or(0);
        let max_ma = self.ma.iter().map(|(l, _)| *l).max().unwrap_or(0);
        max_ar.max(max_ma)
    }

    fn differencing(&self) -> Result<Vec<f64>> {
        Ok(difference_polynomial(
            self.order.d,
            self.order.seasonal_d,
            self.order.period,
        )?)
    }

    /// One-step prediction of the differenced series at `t`
    fn step(&self, w: &[f64], e: &[f64], t: usize) -> f64 {
        self.constant
            + self.ar.iter().map(|&(l, c)| c * w[t - l]).sum::<f64>()
            + self.ma.iter().map(|&(l, c)| c * e[t - l]).sum::<f64>()
    }

    /// Recursive residuals; zero during the warm-up
    fn residuals(&self, w: &[f64]) -> Result<Vec<f64>> {
        let warmup = self.warmup();
        if w.len() <= warmup {
            return Err(MathError::InsufficientData(format!(
                "{} needs more than {} differenced observations",
                self.name, warmup
            ))
            .into());
        }

        let mut e = vec![0.0; w.len()];
        for t in warmup..w.len() {
            e[t] = w[t] - self.step(w, &e, t);
        }

        if e.iter().any(|v| !v.is_finite()) {
            return Err(MathError::CalculationError(format!(
                "{} residual recursion diverged",
                self.name
            ))
            .into());
        }
        Ok(e)
    }
}

impl FittedForecast for FittedSarima {
    fn predict(&self, series: &MonthlySeries) -> Result<MonthlySeries> {
        ensure_trainable(series)?;
        let values = series.values();
        let periods = series.periods();
        let poly = self.differencing()?;
        let w = differencing::apply(&values, &poly)?;
        let e = self.residuals(&w)?;

        let offset = poly.len() - 1;
        let last = periods[periods.len() - 1];
        let start = validation_start(last)?;

        // On the original scale the one-step prediction is y_t - e_t
        let points = (self.warmup()..w.len())
            .map(|i| (periods[i + offset], values[i + offset] - e[i]))
            .filter(|(period, _)| *period >= start)
            .map(|(period, value)| MonthlyPoint::new(period, value))
            .collect();

        MonthlySeries::new(series.category(), points)
    }

    fn forecast(
        &self,
        series: &MonthlySeries,
        is_single_month: bool,
    ) -> Result<(MonthlySeries, MonthlySeries)> {
        ensure_trainable(series)?;
        let steps = horizon(is_single_month);
        let poly = self.differencing()?;

        let mut levels = series.values();
        let mut w = differencing::apply(&levels, &poly)?;
        let mut e = self.residuals(&w)?;

        let mut values = Vec::with_capacity(steps);
        for _ in 0..steps {
            let t = w.len();
            let next_w = self.step(&w, &e, t);
            w.push(next_w);
            e.push(0.0);

            let next = integrate_step(next_w, &levels, &poly);
            levels.push(next);
            values.push(next);
        }

        let last = series
            .last_period()
            .ok_or_else(|| ForecastError::AggregationEmpty(series.category().to_string()))?;
        let points = future_periods(last, steps)?
            .into_iter()
            .zip(values)
            .map(|(period, value)| MonthlyPoint::new(period, value))
            .collect();

        Ok((
            reference_series(series, is_single_month)?,
            MonthlySeries::new(series.category(), points)?,
        ))
    }

    fn intervals(&self, forecast: &MonthlySeries, confidence: f64) -> Result<Vec<(f64, f64)>> {
        let z = z_score(confidence)?;

        // Full autoregressive operator on the levels: delta(B) * phi(B)
        let max_ar = self.ar.iter().map(|(l, _)| *l).max().unwrap_or(0);
        let mut phi = vec![0.0; max_ar + 1];
        phi[0] = 1.0;
        for &(lag, coef) in &self.ar {
            phi[lag] -= coef;
        }
        let operator = differencing::multiply(&self.differencing()?, &phi);
        let ar_weights: Vec<f64> = operator.iter().skip(1).map(|c| -c).collect();

        let max_ma = self.ma.iter().map(|(l, _)| *l).max().unwrap_or(0);
        let mut theta = vec![0.0; max_ma];
        for &(lag, coef) in &self.ma {
            theta[lag - 1] += coef;
        }

        let psi = psi_weights(&ar_weights, &theta, forecast.len());
        let mut cumulative = 0.0;
        Ok(forecast
            .points()
            .iter()
            .zip(psi)
            .map(|(point, weight)| {
                cumulative += weight * weight;
                let margin = z * (self.sigma2 * cumulative).sqrt();
                (point.value - margin, point.value + margin)
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
