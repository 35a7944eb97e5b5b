//! Seasonal Naive forecasting model.
//!
//! Forecasts by repeating the value from the same month of the previous cycle.

use crate::core::{Forecast, Series, YearMonth};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use tracing::debug;

/// Repeat the last `period` observations cyclically over `horizon` steps.
///
/// Step `h` takes `history[n - period + (h % period)]`. With fewer than
/// `period` observations the whole history is cycled instead.
pub fn seasonal_naive_values(history: &[f64], period: usize, horizon: usize) -> Vec<f64> {
    let n = history.len();
    let cycle = period.min(n);
    if cycle == 0 {
        return Vec::new();
    }
    (0..horizon).map(|h| history[n - cycle + (h % cycle)]).collect()
}

/// Seasonal Naive forecaster.
#[derive(Debug, Clone)]
pub struct SeasonalNaive {
    period: usize,
    history: Option<Vec<f64>>,
    last_month: Option<YearMonth>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
}

impl SeasonalNaive {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            history: None,
            last_month: None,
            fitted: None,
            residuals: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Default for SeasonalNaive {
    fn default() -> Self {
        Self::new(12)
    }
}

impl Forecaster for SeasonalNaive {
    fn fit(&mut self, series: &Series) -> Result<()> {
        let values = series.values();
        let last = series.last_month().ok_or(ForecastError::EmptyData)?;
        if self.period == 0 {
            return Err(ForecastError::InvalidParameter(
                "seasonal period must be positive".into(),
            ));
        }
        if values.len() < self.period {
            debug!(
                series = series.name(),
                observations = values.len(),
                period = self.period,
                "short history, cycling all observations"
            );
        }

        let fitted: Vec<f64> = (0..values.len())
            .map(|i| {
                if i < self.period {
                    f64::NAN
                } else {
                    values[i - self.period]
                }
            })
            .collect();
        let residuals = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();

        self.history = Some(values.to_vec());
        self.last_month = Some(last);
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let (history, last) = match (&self.history, self.last_month) {
            (Some(h), Some(m)) => (h, m),
            _ => return Err(ForecastError::FitRequired),
        };
        debug!(period = self.period, horizon = horizon, "SeasonalNaive forecasting");
        Ok(Forecast::after(
            last,
            seasonal_naive_values(history, self.period, horizon),
        ))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "SeasonalNaive"
    }
}
