//! Forecasting helpers shared by the models
//!
//! Contains:
//! - A least squares linear trend over an evenly spaced index
//! - ψ-weight expansion used for multi-step forecast variance

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Linear trend `intercept + slope * x` fitted over `x = 0, 1, 2, ...`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    slope: f64,
    intercept: f64,
}

impl LinearTrend {
    /// Build a trend from known parameters
    pub fn new(intercept: f64, slope: f64) -> Self {
        Self { slope, intercept }
    }

    /// Fit a trend to evenly spaced values
    pub fn fit(values: &[f64]) -> Result<Self> {
        match values.len() {
            0 => Err(MathError::InsufficientData(
                "Not enough data for a trend. Need at least 1 point.".to_string(),
            )),
            1 => Ok(Self::new(values[0], 0.0)),
            len => {
                let n = len as f64;
                let x_mean = (n - 1.0) / 2.0;
                let y_mean = values.iter().sum::<f64>() / n;

                let mut numerator = 0.0;
                let mut denominator = 0.0;
                for (i, &y) in values.iter().enumerate() {
                    let x = i as f64;
                    numerator += (x - x_mean) * (y - y_mean);
                    denominator += (x - x_mean) * (x - x_mean);
                }

                let slope = numerator / denominator;
                if !slope.is_finite() {
                    return Err(MathError::CalculationError(
                        "Trend slope is not finite".to_string(),
                    ));
                }

                Ok(Self::new(y_mean - slope * x_mean, slope))
            }
        }
    }

    /// Trend value at position `x`
    pub fn value_at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Get the slope (trend direction and strength)
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Get the intercept
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficient of determination of this trend against `values`
    pub fn r_squared(&self, values: &[f64]) -> Result<f64> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Not enough data to calculate R-squared. Need at least 2 points.".to_string(),
            ));
        }

        let y_mean = values.iter().sum::<f64>() / values.len() as f64;
        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;
        for (i, &y) in values.iter().enumerate() {
            ss_total += (y - y_mean).powi(2);
            ss_residual += (y - self.value_at(i as f64)).powi(2);
        }

        if ss_total.abs() < 1e-10 {
            return Err(MathError::CalculationError(
                "Cannot calculate R-squared: total sum of squares is too small".to_string(),
            ));
        }

        Ok(1.0 - (ss_residual / ss_total))
    }
}

/// First `count` ψ-weights of `theta(B) / phi(B)`
///
/// Both polynomials are given with their leading `1` omitted, in the
/// conventions `phi(B) = 1 - sum phi_i B^i` and `theta(B) = 1 + sum theta_j B^j`.
pub fn psi_weights(phi: &[f64], theta: &[f64], count: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(count);
    for j in 0..count {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let ma = theta.get(j - 1).copied().unwrap_or(0.0);
        let ar: f64 = (1..=j.min(phi.len()))
            .map(|i| phi[i - 1] * psi[j - i])
            .sum();
        psi.push(ma + ar);
    }
    psi
}
