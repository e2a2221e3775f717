//! Seeded synthetic yield observations for demos and tests

use crate::data::{add_months, month_start, ObservationRow};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Shape of a generated series; all values are monthly totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesShape {
    /// Level in the first month
    pub base: f64,
    /// Change per month
    pub trend: f64,
    /// Peak seasonal deviation, reached in April and trough in October
    pub amplitude: f64,
    /// Standard deviation of the monthly noise
    pub noise_sd: f64,
    /// Daily rows emitted per month
    pub samples_per_month: usize,
}

impl Default for SeriesShape {
    fn default() -> Self {
        Self {
            base: 100.0,
            trend: 0.5,
            amplitude: 20.0,
            noise_sd: 2.0,
            samples_per_month: 3,
        }
    }
}

impl SeriesShape {
    /// Expected monthly total, without noise, `index` months after the start
    pub fn expected(&self, index: usize, period: NaiveDate) -> f64 {
        let phase = 2.0 * PI * period.month0() as f64 / 12.0;
        self.base + self.trend * index as f64 + self.amplitude * phase.sin()
    }
}

/// Daily rows for `months` consecutive months starting at `start`
///
/// Each month's total is split evenly across `samples_per_month` rows, so
/// aggregation recovers the noisy monthly total exactly.
pub fn seasonal_observations(
    category: &str,
    start: NaiveDate,
    months: usize,
    shape: SeriesShape,
    seed: u64,
) -> Result<Vec<ObservationRow>> {
    if shape.samples_per_month == 0 || shape.samples_per_month > 28 {
        return Err(ForecastError::InvalidParameter(
            "samples_per_month must be between 1 and 28".to_string(),
        ));
    }
    let noise = Normal::new(0.0, shape.noise_sd.max(0.0))
        .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let first = month_start(start);
    let step = 28 / shape.samples_per_month as u32;
    let mut rows = Vec::with_capacity(months * shape.samples_per_month);

    for index in 0..months {
        let period = add_months(first, index as i32)?;
        let total = shape.expected(index, period) + noise.sample(&mut rng);
        let share = total / shape.samples_per_month as f64;

        for sample in 0..shape.samples_per_month as u32 {
            let date = period.with_day(1 + sample * step).ok_or_else(|| {
                ForecastError::DataError(format!("Invalid day in {}", period))
            })?;
            rows.push(ObservationRow::new(date, category, share));
        }
    }

    Ok(rows)
}
