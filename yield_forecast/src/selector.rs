//! Grid search over seasonal ARIMA orders
//!
//! Every candidate is fitted and scored by AIC. Candidates that fail to fit
//! are logged and skipped. Candidates may be evaluated in parallel; ties are
//! always resolved by enumeration order, never by completion order.

use crate::data::MonthlySeries;
use crate::error::{ForecastError, Result};
use crate::models::{SarimaModel, SarimaOrder, SEASONAL_PERIOD};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Largest order considered by the full grid
pub const MAX_FULL_GRID_ORDER: usize = 3;

/// Which parameter grid to search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridMode {
    /// Seasonal differencing sweep only: D in {0, 1}, every other order 0
    #[default]
    Reduced,
    /// Every order in [0, 3]
    Full,
}

impl GridMode {
    /// Candidate orders in enumeration order (p outermost, Q innermost)
    pub fn candidates(&self) -> Vec<SarimaOrder> {
        let (small, seasonal_d): (Vec<usize>, Vec<usize>) = match self {
            GridMode::Reduced => (vec![0], vec![0, 1]),
            GridMode::Full => (
                (0..=MAX_FULL_GRID_ORDER).collect(),
                (0..=MAX_FULL_GRID_ORDER).collect(),
            ),
        };

        let mut out = Vec::new();
        for &p in &small {
            for &d in &small {
                for &q in &small {
                    for &sp in &small {
                        for &sd in &seasonal_d {
                            for &sq in &small {
                                out.push(SarimaOrder::new((p, d, q), (sp, sd, sq, SEASONAL_PERIOD)));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for GridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridMode::Reduced => write!(f, "reduced"),
            GridMode::Full => write!(f, "full"),
        }
    }
}

impl FromStr for GridMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reduced" => Ok(GridMode::Reduced),
            "full" => Ok(GridMode::Full),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown grid mode '{}', expected reduced or full",
                other
            ))),
        }
    }
}

/// Outcome of a grid search
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Winning orders
    pub order: SarimaOrder,
    /// AIC of the winner
    pub aic: f64,
    /// Position of the winner in enumeration order
    pub index: usize,
    /// Candidates evaluated
    pub evaluated: usize,
    /// Candidates that failed to fit
    pub failed: usize,
}

/// Exhaustive AIC-based selection of seasonal ARIMA orders
#[derive(Debug, Clone)]
pub struct ModelSelector {
    candidates: Vec<SarimaOrder>,
    parallel: bool,
}

impl ModelSelector {
    /// Selector over one of the built-in grids
    pub fn new(mode: GridMode) -> Self {
        Self::with_candidates(mode.candidates())
    }

    /// Selector over an explicit candidate list, searched in the given order
    pub fn with_candidates(candidates: Vec<SarimaOrder>) -> Self {
        Self {
            candidates,
            parallel: true,
        }
    }

    /// Evaluate candidates one at a time on the calling thread
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn candidates(&self) -> &[SarimaOrder] {
        &self.candidates
    }

    /// Lowest-AIC candidate; the earliest one wins ties
    pub fn select_best(&self, series: &MonthlySeries) -> Result<Selection> {
        if series.is_empty() {
            return Err(ForecastError::AggregationEmpty(series.category().to_string()));
        }

        let evaluate = |(index, order): (usize, &SarimaOrder)| -> (usize, Option<f64>) {
            match SarimaModel::new(*order).score(series) {
                Ok(aic) => (index, Some(aic)),
                Err(err) => {
                    debug!(candidate = %order, error = %err, "skipping candidate");
                    (index, None)
                }
            }
        };

        let scores: Vec<(usize, Option<f64>)> = if self.parallel {
            self.candidates.par_iter().enumerate().map(evaluate).collect()
        } else {
            self.candidates.iter().enumerate().map(evaluate).collect()
        };

        let mut best: Option<(usize, f64)> = None;
        let mut failed = 0;
        for &(index, score) in &scores {
            match score {
                Some(aic) => {
                    if best.map_or(true, |(_, current)| aic < current) {
                        best = Some((index, aic));
                    }
                }
                None => failed += 1,
            }
        }

        let (index, aic) = best.ok_or(ForecastError::NoViableConfiguration {
            evaluated: scores.len(),
        })?;
        let order = self.candidates[index];

        info!(
            category = series.category(),
            best = %order,
            aic,
            evaluated = scores.len(),
            failed,
            "grid search finished"
        );

        Ok(Selection {
            order,
            aic,
            index,
            evaluated: scores.len(),
            failed,
        })
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(GridMode::default())
    }
}
