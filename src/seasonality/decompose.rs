//! Trend / seasonal / residual split of a monthly series.

use crate::core::{Series, YearMonth};
use crate::error::{ForecastError, Result};
use crate::seasonality::stl::Stl;
use std::ops::Range;
use tracing::debug;

/// Additive components aligned 1:1 with the input series.
///
/// Positions outside the finite interior of the input are `NaN` in every
/// component.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    months: Vec<YearMonth>,
    observed: Vec<f64>,
    trend: Vec<f64>,
    seasonal: Vec<f64>,
    residual: Vec<f64>,
    interior: Range<usize>,
    period: usize,
}

impl Decomposition {
    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    pub fn trend(&self) -> &[f64] {
        &self.trend
    }

    pub fn seasonal(&self) -> &[f64] {
        &self.seasonal
    }

    pub fn residual(&self) -> &[f64] {
        &self.residual
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Index range where components are defined.
    pub fn interior(&self) -> Range<usize> {
        self.interior.clone()
    }

    /// `observed - seasonal - residual`.
    pub fn deseasonalized(&self) -> Vec<f64> {
        (0..self.observed.len())
            .map(|i| self.observed[i] - self.seasonal[i] - self.residual[i])
            .collect()
    }

    /// `trend + seasonal + residual`.
    pub fn reconstruct(&self) -> Vec<f64> {
        (0..self.observed.len())
            .map(|i| self.trend[i] + self.seasonal[i] + self.residual[i])
            .collect()
    }

    /// The deseasonalized interior as a series named `name`.
    pub fn deseasonalized_series(&self, name: &str) -> Result<Series> {
        self.interior_series(name, self.deseasonalized())
    }

    /// The residual interior as a series named `name`.
    pub fn residual_series(&self, name: &str) -> Result<Series> {
        self.interior_series(name, self.residual.clone())
    }

    fn interior_series(&self, name: &str, values: Vec<f64>) -> Result<Series> {
        let r = self.interior();
        Series::new(name, self.months[r.clone()].to_vec(), values[r].to_vec())
    }

    /// Seasonal values to add back over `horizon` future steps.
    pub fn seasonal_tail(&self, horizon: usize) -> Vec<f64> {
        self.cyclic_tail(&self.seasonal, horizon)
    }

    /// Residual values to add back over `horizon` future steps.
    pub fn residual_tail(&self, horizon: usize) -> Vec<f64> {
        self.cyclic_tail(&self.residual, horizon)
    }

    /// Step `h` takes the component value one full period before the
    /// forecast month, cycling through the last observed period.
    fn cyclic_tail(&self, component: &[f64], horizon: usize) -> Vec<f64> {
        let tail = &component[self.interior.end - self.period..self.interior.end];
        (0..horizon).map(|h| tail[h % self.period]).collect()
    }
}

/// Runs STL on the finite interior of a series.
#[derive(Debug, Clone, Default)]
pub struct Decomposer {
    stl: Stl,
}

impl Decomposer {
    pub fn new(period: usize) -> Self {
        Self {
            stl: Stl::new(period),
        }
    }

    pub fn with_stl(stl: Stl) -> Self {
        Self { stl }
    }

    pub fn period(&self) -> usize {
        self.stl.period()
    }

    /// Decompose `series`.
    ///
    /// Leading and trailing missing values (left by differencing upstream)
    /// are skipped and padded back as `NaN`. Missing values inside the
    /// series, or fewer than two full periods, fail with a decomposition error.
    pub fn decompose(&self, series: &Series) -> Result<Decomposition> {
        let interior = series.finite_span();
        let values = &series.values()[interior.clone()];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Decomposition(format!(
                "'{}' has missing values inside the observed range",
                series.name()
            )));
        }

        let components = self.stl.decompose(values)?;
        debug!(
            series = series.name(),
            period = self.period(),
            seasonal_strength = components.seasonal_strength(),
            trend_strength = components.trend_strength(),
            "decomposed series"
        );

        let n = series.len();
        let pad = |part: Vec<f64>| {
            let mut full = vec![f64::NAN; n];
            full[interior.clone()].copy_from_slice(&part);
            full
        };

        Ok(Decomposition {
            months: series.months().to_vec(),
            observed: series.values().to_vec(),
            trend: pad(components.trend),
            seasonal: pad(components.seasonal),
            residual: pad(components.remainder),
            interior: interior.clone(),
            period: self.period(),
        })
    }
}
