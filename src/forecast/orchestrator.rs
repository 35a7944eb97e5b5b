//! Runs every model family for a target series and assembles the output table.
//!
//! Component forecasts are recombined with one rule: the seasonal or residual
//! value added back at step `h` is the component's value one period earlier,
//! repeating cyclically over the last observed period.
//!
//! Failures are isolated per family. A family that fails is recorded in
//! [`TargetForecast::outcomes`] and left out of the table; the other
//! families still run.

use crate::config::ForecastConfig;
use crate::core::{CombinedForecast, Forecast, ForecastTable, ModelFamily, Panel, Series};
use crate::error::{ForecastError, Result};
use crate::features::{build_lags, LagSet};
use crate::forecast::LagForecaster;
use crate::models::{
    seasonal_naive_values, Forecaster, HybridSarimaBooster, LinearLagRegressor, Regressor, Sarima,
    SarimaSpec, SeasonalNaive, TunedBooster,
};
use crate::seasonality::{Decomposer, Decomposition};
use crate::utils::{calculate_metrics, train_test_split_index, AccuracyMetrics};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Result of one model family for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyOutcome {
    pub family: ModelFamily,
    pub result: Result<Vec<f64>>,
}

impl FamilyOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// One-step accuracy of a lag model on the chronological tail of its data.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldoutEvaluation {
    pub family: ModelFamily,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: AccuracyMetrics,
}

/// Everything produced for one target series.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetForecast {
    pub target: String,
    /// Successful families only.
    pub table: ForecastTable,
    /// One entry per family, in output column order.
    pub outcomes: Vec<FamilyOutcome>,
    pub evaluations: Vec<HoldoutEvaluation>,
}

impl TargetForecast {
    pub fn outcome(&self, family: ModelFamily) -> Option<&FamilyOutcome> {
        self.outcomes.iter().find(|o| o.family == family)
    }

    pub fn succeeded(&self, family: ModelFamily) -> bool {
        self.outcome(family).is_some_and(FamilyOutcome::is_ok)
    }

    /// Families that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (ModelFamily, &ForecastError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.family, e)))
    }
}

/// Forecasts for several targets plus the targets that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchForecast {
    pub targets: Vec<TargetForecast>,
    pub skipped: Vec<(String, ForecastError)>,
}

impl BatchForecast {
    /// All tables outer-joined on `year_month`.
    pub fn combined(&self) -> CombinedForecast {
        let tables: Vec<ForecastTable> = self.targets.iter().map(|t| t.table.clone()).collect();
        CombinedForecast::from_tables(&tables)
    }
}

/// Per-target forecasting pipeline driven by an explicit [`ForecastConfig`].
#[derive(Debug, Clone)]
pub struct ForecastOrchestrator {
    config: ForecastConfig,
}

impl ForecastOrchestrator {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast `target` with every model family.
    ///
    /// Returns `Err` only when the target cannot be attempted at all: invalid
    /// configuration, no orders for the target, or no such column. Model
    /// failures are reported inside the returned [`TargetForecast`].
    pub fn run_target(&self, panel: &Panel, target: &str) -> Result<TargetForecast> {
        self.config.validate()?;
        let model = self.config.model_for(target)?;
        let lags = self.config.lag_set()?;
        let horizon = self.config.horizon;
        let period = self.config.period;

        let raw = panel.series(target)?;
        let span = raw.finite_span();
        let series = raw.trimmed();
        let last = series.last_month().ok_or(ForecastError::EmptyData)?;

        // Lag models need `max(lag) + 1` rows whatever happens to decomposition.
        let lag_history = if series.len() < lags.max() + 1 {
            Err(ForecastError::InsufficientHistory {
                needed: lags.max() + 1,
                got: series.len(),
            })
        } else {
            Ok(())
        };

        let decomposition = Decomposer::new(period).decompose(&series);
        if let Err(e) = &decomposition {
            warn!(series = target, error = %e, "decomposition failed");
        }
        let lag_decomposition = lag_history.and_then(|_| {
            decomposition.as_ref().map_err(ForecastError::clone)
        });

        let trend_forecast = lag_decomposition
            .clone()
            .and_then(|d| self.trend_forecast(d, target, &lags));

        let mut results: Vec<(ModelFamily, Result<Forecast>)> = Vec::with_capacity(5);

        results.push((
            ModelFamily::LinearRegression,
            lag_decomposition.clone().and_then(|d| {
                let trend = trend_forecast.clone()?;
                trend
                    .plus(&d.seasonal_tail(horizon))?
                    .plus(&d.residual_tail(horizon))
            }),
        ));

        results.push((ModelFamily::SeasonalNaive, {
            let mut naive = SeasonalNaive::new(period);
            naive.fit(&series).and_then(|_| naive.predict(horizon))
        }));

        results.push((
            ModelFamily::XGBoost,
            lag_decomposition
                .and_then(|d| self.residual_booster_forecast(d, target, &lags, &trend_forecast)),
        ));

        let spec = SarimaSpec::from_config(model);
        let exog = exogenous(panel, &model.exogenous, span, period, horizon);

        results.push((
            ModelFamily::Sarima,
            exog.clone().and_then(|(history, future)| {
                let mut sarima = Sarima::new(spec);
                sarima.fit_exog(&series, &history)?;
                sarima.predict_exog(horizon, &future)
            }),
        ));

        results.push((
            ModelFamily::SarimaXGBoost,
            exog.and_then(|(history, future)| {
                let mut hybrid =
                    HybridSarimaBooster::new(spec, lags.clone(), self.config.booster.clone());
                hybrid.fit_exog(&series, &history)?;
                hybrid.predict_exog(horizon, &future)
            }),
        ));

        let mut table = ForecastTable::new(target, last, horizon);
        let outcomes: Vec<FamilyOutcome> = results
            .into_iter()
            .map(|(family, forecast)| {
                let result = forecast.and_then(|f| {
                    table.insert(family, &f)?;
                    Ok(f.into_values())
                });
                if let Err(e) = &result {
                    warn!(series = target, family = %family, error = %e, "model family failed");
                }
                FamilyOutcome { family, result }
            })
            .collect();

        let evaluations = match &decomposition {
            Ok(d) => self.evaluate(d, target, &lags),
            Err(_) => Vec::new(),
        };

        info!(
            series = target,
            last_observed = %last,
            horizon,
            succeeded = table.families().len(),
            failed = outcomes.iter().filter(|o| !o.is_ok()).count(),
            "target forecast complete"
        );

        Ok(TargetForecast {
            target: target.to_string(),
            table,
            outcomes,
            evaluations,
        })
    }

    /// Forecast each target independently. Targets that cannot be attempted
    /// are logged and listed in [`BatchForecast::skipped`]; output order
    /// follows `targets` either way.
    pub fn run_batch(&self, panel: &Panel, targets: &[&str]) -> BatchForecast {
        let runs: Vec<(String, Result<TargetForecast>)> = if self.config.parallel {
            targets
                .par_iter()
                .map(|t| (t.to_string(), self.run_target(panel, t)))
                .collect()
        } else {
            targets
                .iter()
                .map(|t| (t.to_string(), self.run_target(panel, t)))
                .collect()
        };

        let mut batch = BatchForecast::default();
        for (target, run) in runs {
            match run {
                Ok(forecast) => batch.targets.push(forecast),
                Err(e) => {
                    warn!(series = %target, error = %e, "skipping target");
                    batch.skipped.push((target, e));
                }
            }
        }
        batch
    }

    /// Linear lag model on the deseasonalized series.
    fn trend_forecast(&self, d: &Decomposition, target: &str, lags: &LagSet) -> Result<Forecast> {
        let trend = d.deseasonalized_series(target)?;
        let mut model = LagForecaster::new(LinearLagRegressor::new(), lags.clone());
        model.fit(&trend)?;
        model.predict(self.config.horizon)
    }

    /// Boosted lag model on the residual component, with trend and season added back.
    fn residual_booster_forecast(
        &self,
        d: &Decomposition,
        target: &str,
        lags: &LagSet,
        trend_forecast: &Result<Forecast>,
    ) -> Result<Forecast> {
        let horizon = self.config.horizon;
        let residual = d.residual_series(target)?;
        let mut model = LagForecaster::new(TunedBooster::new(self.config.booster.clone()), lags.clone());
        model.fit(&residual)?;
        let residual_forecast = model.predict(horizon)?;
        let trend = trend_forecast.as_ref().map_err(ForecastError::clone)?;
        residual_forecast
            .plus(trend.values())?
            .plus(&d.seasonal_tail(horizon))
    }

    /// One-step hold-out metrics for the lag-based families.
    fn evaluate(&self, d: &Decomposition, target: &str, lags: &LagSet) -> Vec<HoldoutEvaluation> {
        let fraction = self.config.test_fraction;
        let runs = [
            (
                ModelFamily::LinearRegression,
                d.deseasonalized_series(target).and_then(|s| {
                    holdout(LinearLagRegressor::new(), &s, lags, fraction)
                }),
            ),
            (
                ModelFamily::XGBoost,
                d.residual_series(target).and_then(|s| {
                    holdout(TunedBooster::new(self.config.booster.clone()), &s, lags, fraction)
                }),
            ),
        ];

        runs.into_iter()
            .filter_map(|(family, run)| match run {
                Ok((train_rows, test_rows, metrics)) => {
                    debug!(
                        series = target,
                        family = %family,
                        rmse = metrics.rmse,
                        r_squared = metrics.r_squared,
                        "hold-out evaluation"
                    );
                    Some(HoldoutEvaluation {
                        family,
                        train_rows,
                        test_rows,
                        metrics,
                    })
                }
                Err(e) => {
                    debug!(series = target, family = %family, error = %e, "hold-out evaluation skipped");
                    None
                }
            })
            .collect()
    }
}

/// Fit on the head of the lagged panel and score one-step predictions on its tail.
fn holdout<R: Regressor>(
    mut model: R,
    series: &Series,
    lags: &LagSet,
    test_fraction: f64,
) -> Result<(usize, usize, AccuracyMetrics)> {
    let lagged = build_lags(&Panel::from_series(series), lags, false)?;
    let (x, y, _) = lagged.supervised(series.name())?;
    let split = train_test_split_index(y.len(), test_fraction)?;
    model.fit(&x[..split], &y[..split])?;
    let predicted = model.predict(&x[split..])?;
    let metrics = calculate_metrics(&y[split..], &predicted)?;
    Ok((split, y.len() - split, metrics))
}

/// Exogenous history over the target's observed span, and seasonal-naive
/// continuations of each column over the horizon.
fn exogenous(
    panel: &Panel,
    names: &[String],
    span: std::ops::Range<usize>,
    period: usize,
    horizon: usize,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    let mut history = Vec::with_capacity(names.len());
    let mut future = Vec::with_capacity(names.len());
    for name in names {
        let values = panel.column(name)?[span.clone()].to_vec();
        let missing = values.iter().filter(|v| !v.is_finite()).count();
        if missing > 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "exogenous column '{name}' has {missing} missing values over the target's observed months"
            )));
        }
        future.push(seasonal_naive_values(&values, period, horizon));
        history.push(values);
    }
    Ok((history, future))
}
