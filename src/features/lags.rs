//! Lagged feature construction.

use crate::core::{Panel, YearMonth};
use crate::error::{ForecastError, Result};
use std::collections::BTreeSet;

/// A non-empty set of strictly positive lag orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagSet(BTreeSet<usize>);

impl LagSet {
    /// Build a lag set. Zero lags and empty sets are rejected.
    pub fn new(lags: impl IntoIterator<Item = usize>) -> Result<Self> {
        let set: BTreeSet<usize> = lags.into_iter().collect();
        if set.is_empty() {
            return Err(ForecastError::InvalidParameter("lag set is empty".into()));
        }
        if set.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "lag 0 would copy the column onto itself".into(),
            ));
        }
        Ok(Self(set))
    }

    /// Lags `1..=max`.
    pub fn up_to(max: usize) -> Result<Self> {
        Self::new(1..=max)
    }

    /// Largest lag; also the number of rows lost at the start of a panel.
    pub fn max(&self) -> usize {
        self.0.iter().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lags in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl Default for LagSet {
    fn default() -> Self {
        Self((1..=12).collect())
    }
}

/// Provenance of one column in a [`LaggedFeaturePanel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagColumn {
    pub name: String,
    pub source: String,
    /// `None` for an un-shifted original column.
    pub lag: Option<usize>,
}

/// A panel of lagged columns with incomplete leading rows removed.
#[derive(Debug, Clone, PartialEq)]
pub struct LaggedFeaturePanel {
    months: Vec<YearMonth>,
    columns: Vec<LagColumn>,
    rows: Vec<Vec<f64>>,
}

impl LaggedFeaturePanel {
    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn columns(&self) -> &[LagColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Row-major values, one inner vector per month.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| ForecastError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let j = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[j]).collect())
    }

    /// Feature rows made of the shifted columns only, with `target` as label.
    ///
    /// Returns `(features, labels, feature_columns)`.
    pub fn supervised(&self, target: &str) -> Result<(Vec<Vec<f64>>, Vec<f64>, Vec<LagColumn>)> {
        let y = self.column(target)?;
        let keep: Vec<usize> = (0..self.ncols())
            .filter(|&j| self.columns[j].lag.is_some())
            .collect();
        let features = self
            .rows
            .iter()
            .map(|r| keep.iter().map(|&j| r[j]).collect())
            .collect();
        let columns = keep.iter().map(|&j| self.columns[j].clone()).collect();
        Ok((features, y, columns))
    }
}

/// For each panel column and each lag, add `<name>_<lag>` holding the value
/// `lag` months earlier, then drop rows that are not fully populated.
///
/// Column order is, per source column: the original (unless
/// `drop_original`), then its lags ascending. Rows containing any missing
/// value are dropped, so a fully observed panel loses exactly `lags.max()`
/// leading rows.
pub fn build_lags(panel: &Panel, lags: &LagSet, drop_original: bool) -> Result<LaggedFeaturePanel> {
    let n = panel.nrows();
    let depth = lags.max();
    if n < depth + 1 {
        return Err(ForecastError::InsufficientHistory {
            needed: depth + 1,
            got: n,
        });
    }

    let mut columns = Vec::new();
    let mut sources: Vec<(&[f64], usize)> = Vec::new();
    for name in panel.column_names() {
        let values = panel.column(name)?;
        if !drop_original {
            columns.push(LagColumn {
                name: name.to_string(),
                source: name.to_string(),
                lag: None,
            });
            sources.push((values, 0));
        }
        for lag in lags.iter() {
            columns.push(LagColumn {
                name: format!("{name}_{lag}"),
                source: name.to_string(),
                lag: Some(lag),
            });
            sources.push((values, lag));
        }
    }

    let mut months = Vec::with_capacity(n - depth);
    let mut rows = Vec::with_capacity(n - depth);
    for t in depth..n {
        let row: Vec<f64> = sources.iter().map(|(v, lag)| v[t - lag]).collect();
        if row.iter().all(|v| v.is_finite()) {
            months.push(panel.months()[t]);
            rows.push(row);
        }
    }

    Ok(LaggedFeaturePanel {
        months,
        columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(n: usize) -> Panel {
        Panel::new(
            YearMonth::new(2020, 1).unwrap().range(n),
            vec![
                ("y".to_string(), (0..n).map(|i| i as f64).collect()),
                ("x".to_string(), (0..n).map(|i| 100.0 + i as f64).collect()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn lag_set_rejects_zero_and_empty() {
        assert!(LagSet::new([0, 1]).is_err());
        assert!(LagSet::new(Vec::new()).is_err());
        let lags = LagSet::new([3, 1, 3]).unwrap();
        assert_eq!(lags.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(lags.max(), 3);
        assert_eq!(LagSet::default().max(), 12);
    }

    #[test]
    fn shifts_values_and_drops_leading_rows() {
        let lags = LagSet::new([1, 2]).unwrap();
        let out = build_lags(&panel(6), &lags, false).unwrap();
        assert_eq!(out.nrows(), 4);
        assert_eq!(
            out.column_names(),
            vec!["y", "y_1", "y_2", "x", "x_1", "x_2"]
        );
        assert_eq!(out.rows()[0], vec![2.0, 1.0, 0.0, 102.0, 101.0, 100.0]);
        assert_eq!(out.months()[0], YearMonth::new(2020, 3).unwrap());
    }

    #[test]
    fn drop_original_keeps_only_shifted_columns() {
        let lags = LagSet::new([1]).unwrap();
        let out = build_lags(&panel(3), &lags, true).unwrap();
        assert_eq!(out.column_names(), vec!["y_1", "x_1"]);
        assert_eq!(out.column("y_1").unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn insufficient_history() {
        let lags = LagSet::default();
        assert!(matches!(
            build_lags(&panel(12), &lags, false),
            Err(ForecastError::InsufficientHistory { needed: 13, got: 12 })
        ));
        assert_eq!(build_lags(&panel(13), &lags, false).unwrap().nrows(), 1);
    }

    #[test]
    fn rows_with_missing_values_are_dropped() {
        let p = Panel::new(
            YearMonth::new(2020, 1).unwrap().range(5),
            vec![("y".to_string(), vec![1.0, 2.0, f64::NAN, 4.0, 5.0])],
        )
        .unwrap();
        let out = build_lags(&p, &LagSet::new([1]).unwrap(), false).unwrap();
        // Rows t=2 (value missing) and t=3 (lag missing) are gone.
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.months()[1], YearMonth::new(2020, 5).unwrap());
    }

    #[test]
    fn supervised_split_uses_lag_columns() {
        let lags = LagSet::new([1, 2]).unwrap();
        let out = build_lags(&panel(5), &lags, false).unwrap();
        let (x, y, cols) = out.supervised("y").unwrap();
        assert_eq!(y, vec![2.0, 3.0, 4.0]);
        assert_eq!(x[0], vec![1.0, 0.0, 101.0, 100.0]);
        assert_eq!(cols.len(), 4);
        assert_eq!(cols[2].source, "x");
        assert_eq!(cols[2].lag, Some(1));
    }
}
