//! Differencing operators as lag polynomials
//!
//! A differencing scheme `(1 - B)^d (1 - B^s)^D` is expanded into its
//! coefficients `c_0 = 1, c_1, ..., c_m` so that the differenced series is
//! `w_t = sum_j c_j y_{t-j}` and the level can be recovered with
//! `y_t = w_t - sum_{j>=1} c_j y_{t-j}`.

use crate::{MathError, Result};

/// Multiply two lag polynomials given by their coefficients
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Expand `(1 - B)^d (1 - B^period)^seasonal_d`
pub fn difference_polynomial(d: usize, seasonal_d: usize, period: usize) -> Result<Vec<f64>> {
    if seasonal_d > 0 && period == 0 {
        return Err(MathError::InvalidInput(
            "Seasonal differencing needs a period of at least 1".to_string(),
        ));
    }

    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    if seasonal_d > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = multiply(&poly, &seasonal);
        }
    }
    Ok(poly)
}

/// Apply a differencing polynomial; the output is `poly.len() - 1` shorter
pub fn apply(values: &[f64], poly: &[f64]) -> Result<Vec<f64>> {
    let order = poly.len().saturating_sub(1);
    if values.len() <= order {
        return Err(MathError::InsufficientData(format!(
            "Differencing of order {} needs more than {} observations, got {}",
            order,
            order,
            values.len()
        )));
    }

    Ok((order..values.len())
        .map(|t| poly.iter().enumerate().map(|(j, c)| c * values[t - j]).sum())
        .collect())
}

/// Recover the next level from a differenced value and the preceding levels
///
/// `history` must end at `y_{t-1}` and hold at least `poly.len() - 1` values.
pub fn integrate_step(differenced: f64, history: &[f64], poly: &[f64]) -> f64 {
    let n = history.len();
    differenced
        - poly
            .iter()
            .enumerate()
            .skip(1)
            .map(|(j, c)| c * history[n - j])
            .sum::<f64>()
}
