//! Dense least squares for small regression problems
//!
//! The models here never have more than a few dozen regressors, so the normal
//! equations solved by Gaussian elimination are accurate enough and keep the
//! crate free of a linear algebra dependency.

use crate::{MathError, Result};

/// Pivots smaller than this are treated as zero
const PIVOT_EPSILON: f64 = 1e-10;

/// Solve `a * x = b` for a square system using partial pivoting
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {}x{} system",
            n, n
        )));
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);

        if a[pivot_row][col].abs() < PIVOT_EPSILON {
            return Err(MathError::Singular(format!(
                "Pivot {} is numerically zero",
                col
            )));
        }

        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Solution contains non-finite values".to_string(),
        ));
    }

    Ok(x)
}

/// Ordinary least squares: coefficients minimising `|X beta - y|^2`
///
/// `design` holds one row per observation. Fails when there are fewer
/// observations than regressors or the regressors are collinear.
pub fn least_squares(design: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>> {
    if design.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but response has {}",
            design.len(),
            y.len()
        )));
    }

    let k = match design.first() {
        Some(row) => row.len(),
        None => {
            return Err(MathError::InsufficientData(
                "No observations for regression".to_string(),
            ))
        }
    };

    if k == 0 {
        return Ok(Vec::new());
    }
    if design.len() < k {
        return Err(MathError::InsufficientData(format!(
            "Need at least {} observations for {} regressors, got {}",
            k,
            k,
            design.len()
        )));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in design.iter().zip(y) {
        if row.len() != k {
            return Err(MathError::InvalidInput(
                "Design rows have inconsistent widths".to_string(),
            ));
        }
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    solve(xtx, xty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_least_squares_recovers_line() {
        let design: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        let beta = least_squares(&design, &y).unwrap();
        assert!((beta[0] - 3.0).abs() < 1e-9);
        assert!((beta[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_design_is_singular() {
        let design: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let y = vec![1.0; 5];
        assert!(matches!(
            least_squares(&design, &y),
            Err(MathError::Singular(_))
        ));
    }

    #[test]
    fn test_underdetermined_is_rejected() {
        let design = vec![vec![1.0, 2.0, 3.0]];
        assert!(matches!(
            least_squares(&design, &[1.0]),
            Err(MathError::InsufficientData(_))
        ));
    }
}
