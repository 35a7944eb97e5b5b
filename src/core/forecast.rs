//! Forecast results: per-model forecasts, per-target tables and the combined output.

use crate::core::month::{is_contiguous, YearMonth};
use crate::error::{ForecastError, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Point forecasts keyed by the future months they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    months: Vec<YearMonth>,
    values: Vec<f64>,
}

impl Forecast {
    /// Create an empty forecast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forecast values for the months following `last_observed`.
    pub fn after(last_observed: YearMonth, values: Vec<f64>) -> Self {
        Self {
            months: last_observed.succ().range(values.len()),
            values,
        }
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Number of forecast steps.
    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Element-wise sum with another component, keeping the months.
    pub fn plus(&self, component: &[f64]) -> Result<Forecast> {
        if component.len() != self.horizon() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.horizon(),
                got: component.len(),
            });
        }
        Ok(Forecast {
            months: self.months.clone(),
            values: self
                .values
                .iter()
                .zip(component)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }
}

/// The five model families whose forecasts make up a target's output columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelFamily {
    LinearRegression,
    SeasonalNaive,
    XGBoost,
    Sarima,
    SarimaXGBoost,
}

impl ModelFamily {
    /// All families in output column order.
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::LinearRegression,
        ModelFamily::SeasonalNaive,
        ModelFamily::XGBoost,
        ModelFamily::Sarima,
        ModelFamily::SarimaXGBoost,
    ];

    /// Column suffix used in the output table.
    pub fn label(&self) -> &'static str {
        match self {
            ModelFamily::LinearRegression => "Linear Regression Forecast",
            ModelFamily::SeasonalNaive => "Seasonal Naives Forecast",
            ModelFamily::XGBoost => "XGBoost Forecast",
            ModelFamily::Sarima => "SARIMA Forecast",
            ModelFamily::SarimaXGBoost => "SARIMA & XGBoost Forecast",
        }
    }

    /// Output column name for `target`.
    pub fn column_name(&self, target: &str) -> String {
        format!("{target} {}", self.label())
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One future month with the forecasts of every successful family.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub month: YearMonth,
    pub values: Vec<(ModelFamily, f64)>,
}

/// Forecasts of one target series, one column per successful model family.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    target: String,
    months: Vec<YearMonth>,
    columns: Vec<(ModelFamily, Vec<f64>)>,
}

impl ForecastTable {
    /// An empty table for the `horizon` months after `last_observed`.
    pub fn new(target: impl Into<String>, last_observed: YearMonth, horizon: usize) -> Self {
        Self {
            target: target.into(),
            months: last_observed.succ().range(horizon),
            columns: Vec::new(),
        }
    }

    /// Add a family's forecast.
    ///
    /// The forecast must cover exactly the table's months and contain only
    /// finite values; anything else is rejected rather than written.
    pub fn insert(&mut self, family: ModelFamily, forecast: &Forecast) -> Result<()> {
        if forecast.months() != self.months.as_slice() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.months.len(),
                got: forecast.horizon(),
            });
        }
        if forecast.values().iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(format!(
                "{family} produced non-finite forecast values"
            )));
        }
        self.columns.retain(|(f, _)| *f != family);
        self.columns.push((family, forecast.values().to_vec()));
        self.columns.sort_by_key(|(f, _)| *f);
        Ok(())
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn horizon(&self) -> usize {
        self.months.len()
    }

    pub fn families(&self) -> Vec<ModelFamily> {
        self.columns.iter().map(|(f, _)| *f).collect()
    }

    pub fn column(&self, family: ModelFamily) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(f, _)| *f == family)
            .map(|(_, v)| v.as_slice())
    }

    /// Output column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|(f, _)| f.column_name(&self.target))
            .collect()
    }

    /// Row view of the table.
    pub fn rows(&self) -> Vec<ForecastRow> {
        self.months
            .iter()
            .enumerate()
            .map(|(i, &month)| ForecastRow {
                month,
                values: self.columns.iter().map(|(f, v)| (*f, v[i])).collect(),
            })
            .collect()
    }

    pub fn is_contiguous(&self) -> bool {
        is_contiguous(&self.months)
    }
}

/// Forecast tables of several targets outer-joined on `year_month`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedForecast {
    months: Vec<YearMonth>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl CombinedForecast {
    /// Merge tables; cells for months a table does not cover are `None`.
    pub fn from_tables(tables: &[ForecastTable]) -> Self {
        let months: Vec<YearMonth> = tables
            .iter()
            .flat_map(|t| t.months().iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns = Vec::new();
        for table in tables {
            for (family, values) in &table.columns {
                let cells = months
                    .iter()
                    .map(|m| {
                        table
                            .months
                            .iter()
                            .position(|tm| tm == m)
                            .map(|i| values[i])
                    })
                    .collect();
                columns.push((family.column_name(table.target()), cells));
            }
        }

        Self { months, columns }
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    /// Header row: `year_month` followed by every forecast column.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once("year_month".to_string())
            .chain(self.columns.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Cells of row `i` in header order, excluding the month.
    pub fn row_cells(&self, i: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|(_, v)| v[i]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        YearMonth::parse(s).unwrap()
    }

    #[test]
    fn forecast_months_start_after_last_observation() {
        let f = Forecast::after(ym("2023-11"), vec![1.0, 2.0, 3.0]);
        let months: Vec<String> = f.months().iter().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2023-12", "2024-01", "2024-02"]);
        assert_eq!(f.horizon(), 3);
    }

    #[test]
    fn plus_requires_matching_length() {
        let f = Forecast::after(ym("2023-11"), vec![1.0, 2.0]);
        assert_eq!(f.plus(&[1.0, 1.0]).unwrap().values(), &[2.0, 3.0]);
        assert!(f.plus(&[1.0]).is_err());
    }

    #[test]
    fn column_names_are_prefixed_by_target() {
        assert_eq!(
            ModelFamily::SarimaXGBoost.column_name("Cpi Values"),
            "Cpi Values SARIMA & XGBoost Forecast"
        );
        assert_eq!(
            ModelFamily::SeasonalNaive.column_name("WTI Prices"),
            "WTI Prices Seasonal Naives Forecast"
        );
    }

    #[test]
    fn table_rejects_non_finite_and_misaligned_forecasts() {
        let mut table = ForecastTable::new("cpi", ym("2024-01"), 2);
        let bad = Forecast::after(ym("2024-01"), vec![1.0, f64::NAN]);
        assert!(table.insert(ModelFamily::Sarima, &bad).is_err());

        let shifted = Forecast::after(ym("2024-02"), vec![1.0, 2.0]);
        assert!(table.insert(ModelFamily::Sarima, &shifted).is_err());

        assert!(table.families().is_empty());
    }

    #[test]
    fn table_keeps_family_order() {
        let mut table = ForecastTable::new("cpi", ym("2024-01"), 2);
        let f = Forecast::after(ym("2024-01"), vec![1.0, 2.0]);
        table.insert(ModelFamily::Sarima, &f).unwrap();
        table.insert(ModelFamily::LinearRegression, &f).unwrap();
        assert_eq!(
            table.families(),
            vec![ModelFamily::LinearRegression, ModelFamily::Sarima]
        );
        let rows = table.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].month, ym("2024-03"));
        assert!(table.is_contiguous());
    }

    #[test]
    fn combined_forecast_null_fills_uncovered_months() {
        let mut a = ForecastTable::new("a", ym("2024-01"), 2);
        a.insert(
            ModelFamily::SeasonalNaive,
            &Forecast::after(ym("2024-01"), vec![1.0, 2.0]),
        )
        .unwrap();
        let mut b = ForecastTable::new("b", ym("2024-02"), 2);
        b.insert(
            ModelFamily::SeasonalNaive,
            &Forecast::after(ym("2024-02"), vec![5.0, 6.0]),
        )
        .unwrap();

        let combined = CombinedForecast::from_tables(&[a, b]);
        assert_eq!(combined.months().len(), 3);
        assert_eq!(
            combined.headers(),
            vec![
                "year_month",
                "a Seasonal Naives Forecast",
                "b Seasonal Naives Forecast"
            ]
        );
        assert_eq!(
            combined.column("b Seasonal Naives Forecast").unwrap(),
            &[None, Some(5.0), Some(6.0)]
        );
        assert_eq!(combined.row_cells(2), vec![None, Some(6.0)]);
    }
}
