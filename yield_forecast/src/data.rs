//! Observation rows, monthly series and CSV loading

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// One raw (usually daily) yield observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    /// Identifier assigned by the catalog on persist
    pub uid: Option<i64>,
    /// Calendar date of the observation
    pub date: NaiveDate,
    /// Category (crop type) the value belongs to
    pub category: String,
    /// Yield quantity
    pub value: f64,
}

impl ObservationRow {
    /// Create a row that has not been persisted yet
    pub fn new(date: NaiveDate, category: impl Into<String>, value: f64) -> Self {
        Self {
            uid: None,
            date,
            category: category.into(),
            value,
        }
    }
}

/// A single month of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    /// First day of the month
    pub period: NaiveDate,
    /// Value for the month
    pub value: f64,
}

impl MonthlyPoint {
    pub fn new(period: NaiveDate, value: f64) -> Self {
        Self { period, value }
    }
}

/// One aggregated (month, category) row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    pub period: NaiveDate,
    pub category: String,
    pub value: f64,
}

/// Monthly series for one category, ordered by month
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlySeries {
    category: String,
    points: Vec<MonthlyPoint>,
}

impl MonthlySeries {
    /// Build a series, checking that periods are strictly increasing month starts
    pub fn new(category: impl Into<String>, points: Vec<MonthlyPoint>) -> Result<Self> {
        for point in &points {
            if point.period.day() != 1 {
                return Err(ForecastError::DataError(format!(
                    "Period {} is not the first day of a month",
                    point.period
                )));
            }
        }
        if let Some(pair) = points.windows(2).find(|w| w[0].period >= w[1].period) {
            return Err(ForecastError::DataError(format!(
                "Periods must be strictly increasing: {} is followed by {}",
                pair[0].period, pair[1].period
            )));
        }

        Ok(Self {
            category: category.into(),
            points,
        })
    }

    /// An empty series for a category
    pub fn empty(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            points: Vec::new(),
        }
    }

    /// Consecutive months starting at `start`, one per value
    pub fn from_values(category: impl Into<String>, start: NaiveDate, values: &[f64]) -> Result<Self> {
        let start = month_start(start);
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Ok(MonthlyPoint::new(add_months(start, i as i32)?, v)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(category, points)
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn points(&self) -> &[MonthlyPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values in month order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Periods in month order
    pub fn periods(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.period).collect()
    }

    pub fn first_period(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.period)
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.period)
    }

    /// Value recorded for a month, if present
    pub fn value_at(&self, period: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by(|p| p.period.cmp(&period))
            .ok()
            .map(|i| self.points[i].value)
    }

    /// The last `count` points (all of them when shorter)
    pub fn tail(&self, count: usize) -> Self {
        let start = self.points.len().saturating_sub(count);
        Self {
            category: self.category.clone(),
            points: self.points[start..].to_vec(),
        }
    }

    /// Every month between the first and last period is present
    pub fn is_regular(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| months_between(w[0].period, w[1].period) == 1)
    }
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a date by a signed number of months
pub fn add_months(date: NaiveDate, months: i32) -> Result<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| {
        ForecastError::DataError(format!("Cannot shift {} by {} months", date, months))
    })
}

/// Whole months from `from` to `to` (negative when `to` is earlier)
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Data loader for observation files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load observation rows from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ObservationRow>> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(&df)
    }

    /// Extract observation rows from an existing DataFrame
    pub fn from_dataframe(df: &DataFrame) -> Result<Vec<ObservationRow>> {
        let date_column = Self::detect_column(df, &["date", "period", "time"])?;
        let category_column = Self::detect_column(df, &["category", "crop", "type"])?;
        let value_column = Self::detect_column(df, &["value", "yield"])?;
        let uid_column = Self::detect_column(df, &["uid"]).ok();

        let dates = Self::column_as_dates(df, &date_column)?;
        let categories = Self::column_as_strings(df, &category_column)?;
        let values = Self::column_as_f64(df, &value_column)?;
        let uids = match uid_column {
            Some(name) => Some(Self::column_as_i64(df, &name)?),
            None => None,
        };

        let mut rows = Vec::with_capacity(dates.len());
        for i in 0..dates.len() {
            rows.push(ObservationRow {
                uid: uids.as_ref().and_then(|u| u[i]),
                date: dates[i],
                category: categories[i].clone(),
                value: values[i],
            });
        }

        Ok(rows)
    }

    /// Find the first column whose lowercased name contains one of `needles`
    fn detect_column(df: &DataFrame, needles: &[&str]) -> Result<String> {
        let column_names = df.get_column_names();

        for needle in needles {
            for name in &column_names {
                if name.to_lowercase().contains(needle) {
                    return Ok(name.to_string());
                }
            }
        }

        Err(ForecastError::DataError(format!(
            "No column matching any of {:?} found in data",
            needles
        )))
    }

    fn column_as_dates(df: &DataFrame, column_name: &str) -> Result<Vec<NaiveDate>> {
        let col = df.column(column_name)?;

        match col.dtype() {
            DataType::Utf8 => col
                .utf8()?
                .into_iter()
                .map(|opt| {
                    let raw = opt.ok_or_else(|| {
                        ForecastError::DataError(format!("Missing value in '{}'", column_name))
                    })?;
                    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                        ForecastError::DataError(format!("Invalid date '{}': {}", raw, e))
                    })
                })
                .collect(),
            DataType::Date => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                    .ok_or_else(|| ForecastError::DataError("Invalid epoch".to_string()))?;
                col.date()?
                    .into_iter()
                    .map(|opt| {
                        let days = opt.ok_or_else(|| {
                            ForecastError::DataError(format!("Missing value in '{}'", column_name))
                        })?;
                        epoch
                            .checked_add_signed(chrono::Duration::days(days as i64))
                            .ok_or_else(|| {
                                ForecastError::DataError(format!("Date out of range: {}", days))
                            })
                    })
                    .collect()
            }
            other => Err(ForecastError::DataError(format!(
                "Column '{}' has type {} and cannot be read as dates",
                column_name, other
            ))),
        }
    }

    fn column_as_strings(df: &DataFrame, column_name: &str) -> Result<Vec<String>> {
        let col = df.column(column_name)?.cast(&DataType::Utf8)?;
        col.utf8()?
            .into_iter()
            .map(|opt| {
                opt.map(|s| s.trim().to_string()).ok_or_else(|| {
                    ForecastError::DataError(format!("Missing value in '{}'", column_name))
                })
            })
            .collect()
    }

    fn column_as_f64(df: &DataFrame, column_name: &str) -> Result<Vec<f64>> {
        let col = df.column(column_name)?;
        if !col.dtype().is_numeric() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' cannot be converted to f64",
                column_name
            )));
        }

        let col = col.cast(&DataType::Float64)?;
        col.f64()?
            .into_iter()
            .map(|opt| {
                opt.ok_or_else(|| {
                    ForecastError::DataError(format!("Missing value in '{}'", column_name))
                })
            })
            .collect()
    }

    fn column_as_i64(df: &DataFrame, column_name: &str) -> Result<Vec<Option<i64>>> {
        let col = df.column(column_name)?.cast(&DataType::Int64)?;
        Ok(col.i64()?.into_iter().collect())
    }
}
