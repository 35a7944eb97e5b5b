//! SARIMA with a gradient-boosted correction of its residuals.

use crate::config::BoosterSearchConfig;
use crate::core::{Forecast, Panel, Series};
use crate::error::{ForecastError, Result};
use crate::features::LagSet;
use crate::forecast::LagForecaster;
use crate::models::arima::{Sarima, SarimaSpec};
use crate::models::boosting::TunedBooster;
use crate::models::Forecaster;
use std::collections::BTreeMap;
use tracing::debug;

const RESIDUAL: &str = "sarima_residual";
const FITTED: &str = "sarima_fitted";

/// SARIMA mean forecast plus a boosted forecast of the SARIMA residuals.
///
/// The booster sees lags of the residuals and of the SARIMA fitted values.
/// During the rollout the SARIMA forecast stands in for future fitted values.
#[derive(Debug, Clone)]
pub struct HybridSarimaBooster {
    sarima: Sarima,
    booster: LagForecaster<TunedBooster>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
}

impl HybridSarimaBooster {
    pub fn new(spec: SarimaSpec, lags: LagSet, search: BoosterSearchConfig) -> Self {
        Self {
            sarima: Sarima::new(spec),
            booster: LagForecaster::new(TunedBooster::new(search), lags),
            fitted: None,
            residuals: None,
        }
    }

    pub fn sarima(&self) -> &Sarima {
        &self.sarima
    }

    pub fn booster(&self) -> &LagForecaster<TunedBooster> {
        &self.booster
    }

    pub fn fit_exog(&mut self, series: &Series, exog: &[Vec<f64>]) -> Result<()> {
        self.sarima.fit_exog(series, exog)?;
        let (sarima_fitted, sarima_resid) =
            match (self.sarima.fitted_values(), self.sarima.residuals()) {
                (Some(f), Some(r)) => (f.to_vec(), r.to_vec()),
                _ => return Err(ForecastError::FitRequired),
            };

        let panel = Panel::new(
            series.months().to_vec(),
            vec![
                (RESIDUAL.to_string(), sarima_resid.clone()),
                (FITTED.to_string(), sarima_fitted.clone()),
            ],
        )?;
        self.booster.fit_panel(&panel, RESIDUAL)?;

        let correction = self.booster.fitted_values().unwrap_or(&[]);
        let fitted: Vec<f64> = sarima_fitted
            .iter()
            .zip(correction)
            .map(|(f, c)| f + c)
            .collect();
        let residuals = series
            .values()
            .iter()
            .zip(&fitted)
            .map(|(y, f)| y - f)
            .collect();
        debug!(series = series.name(), "fitted SARIMA residual booster");

        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    pub fn predict_exog(&self, horizon: usize, future_exog: &[Vec<f64>]) -> Result<Forecast> {
        let base = self.sarima.predict_exog(horizon, future_exog)?;
        let mut future = BTreeMap::new();
        future.insert(FITTED.to_string(), base.values().to_vec());
        let correction = self.booster.predict_with_covariates(horizon, &future)?;
        base.plus(correction.values())
    }
}

impl Forecaster for HybridSarimaBooster {
    fn fit(&mut self, series: &Series) -> Result<()> {
        self.fit_exog(series, &[])
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.predict_exog(horizon, &[])
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "SARIMA & XGBoost"
    }
}
