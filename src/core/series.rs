//! Monthly series and panels of aligned series.

use crate::core::month::YearMonth;
use crate::error::{ForecastError, Result};
use std::collections::{BTreeMap, HashSet};

/// A named scalar series indexed by calendar month.
///
/// Months are unique and sorted ascending; construction sorts the input and
/// rejects duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    months: Vec<YearMonth>,
    values: Vec<f64>,
}

impl Series {
    /// Create a series, sorting observations by month.
    pub fn new(name: impl Into<String>, months: Vec<YearMonth>, values: Vec<f64>) -> Result<Self> {
        if months.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: months.len(),
                got: values.len(),
            });
        }

        let order = sorted_order(&months)?;
        Ok(Self {
            name: name.into(),
            months: order.iter().map(|&i| months[i]).collect(),
            values: order.iter().map(|&i| values[i]).collect(),
        })
    }

    /// Build a series of contiguous months starting at `start`.
    pub fn from_start(name: impl Into<String>, start: YearMonth, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            months: start.range(values.len()),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The most recent observed month.
    pub fn last_month(&self) -> Option<YearMonth> {
        self.months.last().copied()
    }

    /// The same months carrying different values (e.g. a decomposition component).
    pub fn with_values(&self, name: impl Into<String>, values: Vec<f64>) -> Result<Series> {
        if values.len() != self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        Ok(Series {
            name: name.into(),
            months: self.months.clone(),
            values,
        })
    }

    /// Rows `start..end` of the series.
    pub fn slice(&self, start: usize, end: usize) -> Result<Series> {
        if start > end || end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "slice {start}..{end} out of range for series of length {}",
                self.len()
            )));
        }
        Ok(Series {
            name: self.name.clone(),
            months: self.months[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Index range between the first and last finite values.
    pub fn finite_span(&self) -> std::ops::Range<usize> {
        let start = self.values.iter().position(|v| v.is_finite());
        let end = self.values.iter().rposition(|v| v.is_finite());
        match (start, end) {
            (Some(s), Some(e)) => s..e + 1,
            _ => 0..0,
        }
    }

    /// The series without leading and trailing missing values.
    pub fn trimmed(&self) -> Series {
        let span = self.finite_span();
        Series {
            name: self.name.clone(),
            months: self.months[span.clone()].to_vec(),
            values: self.values[span].to_vec(),
        }
    }
}

/// A table of series sharing one month index.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    months: Vec<YearMonth>,
    columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<f64>,
}

impl Panel {
    /// Create a panel from a month index and named columns aligned to it.
    ///
    /// Rows are reordered so that months ascend.
    pub fn new(months: Vec<YearMonth>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let order = sorted_order(&months)?;
        let mut panel = Panel {
            months: order.iter().map(|&i| months[i]).collect(),
            columns: Vec::with_capacity(columns.len()),
        };

        for (name, values) in columns {
            if values.len() != months.len() {
                return Err(ForecastError::DimensionMismatch {
                    expected: months.len(),
                    got: values.len(),
                });
            }
            let values = order.iter().map(|&i| values[i]).collect();
            panel.push_column(name, values)?;
        }

        Ok(panel)
    }

    /// A single-column panel holding `series`.
    pub fn from_series(series: &Series) -> Self {
        Panel {
            months: series.months.clone(),
            columns: vec![Column {
                name: series.name.clone(),
                values: series.values.clone(),
            }],
        }
    }

    /// Add a column whose values are aligned with the panel's (sorted) months.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.nrows() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.nrows(),
                got: values.len(),
            });
        }
        self.push_column(name.into(), values)?;
        Ok(self)
    }

    fn push_column(&mut self, name: String, values: Vec<f64>) -> Result<()> {
        if self.has_column(&name) {
            return Err(ForecastError::InvalidParameter(format!(
                "duplicate column '{name}'"
            )));
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn nrows(&self) -> usize {
        self.months.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))
    }

    /// Extract one column as a [`Series`].
    pub fn series(&self, name: &str) -> Result<Series> {
        let values = self.column(name)?;
        Ok(Series {
            name: name.to_string(),
            months: self.months.clone(),
            values: values.to_vec(),
        })
    }

    /// A panel restricted to the named columns, in the requested order.
    pub fn select(&self, names: &[&str]) -> Result<Panel> {
        let mut columns = Vec::with_capacity(names.len());
        for &name in names {
            columns.push(Column {
                name: name.to_string(),
                values: self.column(name)?.to_vec(),
            });
        }
        Ok(Panel {
            months: self.months.clone(),
            columns,
        })
    }

    /// Rows `start..end` of every column.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Panel> {
        if start > end || end > self.nrows() {
            return Err(ForecastError::InvalidParameter(format!(
                "row range {start}..{end} out of range for panel with {} rows",
                self.nrows()
            )));
        }
        Ok(Panel {
            months: self.months[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values[start..end].to_vec(),
                })
                .collect(),
        })
    }

    /// Align two panels on the months they share.
    ///
    /// Column names must not collide.
    pub fn inner_join(&self, other: &Panel) -> Result<Panel> {
        let other_rows: BTreeMap<YearMonth, usize> = other
            .months
            .iter()
            .enumerate()
            .map(|(i, m)| (*m, i))
            .collect();

        let pairs: Vec<(usize, usize)> = self
            .months
            .iter()
            .enumerate()
            .filter_map(|(i, m)| other_rows.get(m).map(|&j| (i, j)))
            .collect();

        let mut joined = Panel {
            months: pairs.iter().map(|&(i, _)| self.months[i]).collect(),
            columns: Vec::with_capacity(self.ncols() + other.ncols()),
        };
        for c in &self.columns {
            let values = pairs.iter().map(|&(i, _)| c.values[i]).collect();
            joined.push_column(c.name.clone(), values)?;
        }
        for c in &other.columns {
            let values = pairs.iter().map(|&(_, j)| c.values[j]).collect();
            joined.push_column(c.name.clone(), values)?;
        }
        Ok(joined)
    }

    /// Rescale the named columns to `[0, 1]`; other columns are untouched.
    ///
    /// A constant column maps to all zeros.
    pub fn min_max_scaled(&self, names: &[&str]) -> Result<Panel> {
        for &name in names {
            self.column(name)?;
        }

        let columns = self
            .columns
            .iter()
            .map(|c| {
                if !names.contains(&c.name.as_str()) {
                    return c.clone();
                }
                let min = c.values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = c.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                let values = c
                    .values
                    .iter()
                    .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
                    .collect();
                Column {
                    name: c.name.clone(),
                    values,
                }
            })
            .collect();

        Ok(Panel {
            months: self.months.clone(),
            columns,
        })
    }
}

/// Permutation that sorts `months` ascending; fails on duplicates.
fn sorted_order(months: &[YearMonth]) -> Result<Vec<usize>> {
    let mut seen = HashSet::with_capacity(months.len());
    for m in months {
        if !seen.insert(*m) {
            return Err(ForecastError::DuplicateMonth(m.to_string()));
        }
    }
    let mut order: Vec<usize> = (0..months.len()).collect();
    order.sort_by_key(|&i| months[i]);
    Ok(order)
}
