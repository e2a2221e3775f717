//! Aggregation of irregular daily observations into monthly series
//!
//! Values are summed per (category, month). In training mode every category
//! is padded with zero months over the global date range of the input, so all
//! series share the same regular index. In display mode months that sum to
//! exactly zero are dropped instead.

use crate::data::{add_months, month_start, MonthlyPoint, MonthlyRow, MonthlySeries, ObservationRow};
use crate::error::Result;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Converts raw rows into monthly series
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesAggregator;

impl SeriesAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Monthly rows for every category, ordered by month then category
    ///
    /// The gap-fill range is always taken from the whole input, before the
    /// category filter is applied.
    pub fn aggregate_rows(
        &self,
        rows: &[ObservationRow],
        category_filter: Option<&str>,
        fill_gaps: bool,
    ) -> Result<Vec<MonthlyRow>> {
        let (first, last) = match (
            rows.iter().map(|r| r.date).min(),
            rows.iter().map(|r| r.date).max(),
        ) {
            (Some(first), Some(last)) => (month_start(first), month_start(last)),
            _ => return Ok(Vec::new()),
        };

        let mut sums: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();
        let mut categories = BTreeSet::new();
        for row in rows {
            if category_filter.map_or(false, |c| c != row.category) {
                continue;
            }
            categories.insert(row.category.clone());
            *sums
                .entry((month_start(row.date), row.category.clone()))
                .or_insert(0.0) += row.value;
        }

        if fill_gaps {
            let mut month = first;
            while month <= last {
                for category in &categories {
                    sums.entry((month, category.clone())).or_insert(0.0);
                }
                month = add_months(month, 1)?;
            }
        } else {
            sums.retain(|_, value| *value != 0.0);
        }

        debug!(
            rows = rows.len(),
            months = sums.len(),
            fill_gaps,
            "aggregated observations"
        );

        Ok(sums
            .into_iter()
            .map(|((period, category), value)| MonthlyRow {
                period,
                category,
                value,
            })
            .collect())
    }

    /// Monthly series for a single category
    ///
    /// Returns an empty series when nothing matches.
    pub fn aggregate(
        &self,
        rows: &[ObservationRow],
        category: &str,
        fill_gaps: bool,
    ) -> Result<MonthlySeries> {
        let points = self
            .aggregate_rows(rows, Some(category), fill_gaps)?
            .into_iter()
            .map(|row| MonthlyPoint::new(row.period, row.value))
            .collect();

        MonthlySeries::new(category, points)
    }

    /// One series per category present in the input, ordered by category
    pub fn aggregate_all(&self, rows: &[ObservationRow], fill_gaps: bool) -> Result<Vec<MonthlySeries>> {
        let mut grouped: BTreeMap<String, Vec<MonthlyPoint>> = BTreeMap::new();
        for row in self.aggregate_rows(rows, None, fill_gaps)? {
            grouped
                .entry(row.category)
                .or_default()
                .push(MonthlyPoint::new(row.period, row.value));
        }

        grouped
            .into_iter()
            .map(|(category, points)| MonthlySeries::new(category, points))
            .collect()
    }
}
