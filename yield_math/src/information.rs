//! Likelihood and information criteria for Gaussian residuals

use crate::{MathError, Result};
use std::f64::consts::PI;

/// Relative floor applied to the residual variance
pub const RELATIVE_VARIANCE_FLOOR: f64 = 1e-12;

/// Smallest residual variance worth scoring for data of this magnitude
///
/// Scales with the mean square of `values` and never drops below
/// `f64::EPSILON`, so an all-zero series still gets a positive floor.
pub fn variance_floor(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::EPSILON;
    }
    let scale = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
    (scale * RELATIVE_VARIANCE_FLOOR).max(f64::EPSILON)
}

/// Concentrated Gaussian log-likelihood of a residual vector
///
/// Uses the maximum likelihood variance `sum(e^2) / n`, raised to
/// `variance_floor` when smaller. An exact fit scores a large but finite
/// likelihood.
pub fn gaussian_log_likelihood(residuals: &[f64], variance_floor: f64) -> Result<f64> {
    if residuals.is_empty() {
        return Err(MathError::InsufficientData(
            "No residuals to evaluate".to_string(),
        ));
    }

    let n = residuals.len() as f64;
    let sigma2 = residuals.iter().map(|e| e * e).sum::<f64>() / n;
    if !sigma2.is_finite() {
        return Err(MathError::CalculationError(
            "Residual variance is not finite".to_string(),
        ));
    }
    if !(variance_floor.is_finite() && variance_floor > 0.0) {
        return Err(MathError::InvalidInput(format!(
            "Variance floor must be positive, got {}",
            variance_floor
        )));
    }
    let sigma2 = sigma2.max(variance_floor);

    Ok(-0.5 * n * ((2.0 * PI * sigma2).ln() + 1.0))
}

/// Akaike Information Criterion, lower is better
pub fn aic(log_likelihood: f64, parameters: usize) -> f64 {
    2.0 * parameters as f64 - 2.0 * log_likelihood
}
