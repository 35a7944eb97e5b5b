//! Hyperparameter selection for the boosted trees.

use super::tree::{BoosterParams, GradientBoostedRegressor};
use crate::config::BoosterSearchConfig;
use crate::error::{ForecastError, Result};
use crate::models::Regressor;
use crate::utils::{forward_chaining_splits, rmse};
use rayon::prelude::*;
use tracing::debug;

/// Smallest training window a fold may have.
const MIN_FOLD_TRAIN: usize = 4;

/// Cross-validated score of one grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub params: BoosterParams,
    /// Mean RMSE over the folds; `NaN` if any fold failed.
    pub rmse: f64,
}

/// Result of a grid search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best: BoosterParams,
    /// `None` when the data was too short to cross-validate and the first
    /// grid point was used as is.
    pub best_rmse: Option<f64>,
    /// Every candidate in grid order.
    pub scores: Vec<CandidateScore>,
}

/// Grid search over learning rate, depth and leaf regularization, scored
/// with forward-chaining folds.
#[derive(Debug, Clone, Default)]
pub struct BoosterSearch {
    config: BoosterSearchConfig,
}

impl BoosterSearch {
    pub fn new(config: BoosterSearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BoosterSearchConfig {
        &self.config
    }

    /// Grid points in a fixed order: learning rate, then depth, alpha, lambda.
    pub fn candidates(&self) -> Vec<BoosterParams> {
        let c = &self.config;
        let mut out = Vec::new();
        for &learning_rate in &c.learning_rates {
            for &max_depth in &c.max_depths {
                for &reg_alpha in &c.reg_alphas {
                    for &reg_lambda in &c.reg_lambdas {
                        out.push(BoosterParams {
                            n_rounds: c.max_rounds,
                            learning_rate,
                            max_depth,
                            reg_alpha,
                            reg_lambda,
                            subsample: c.subsample,
                            seed: c.seed,
                            ..BoosterParams::default()
                        });
                    }
                }
            }
        }
        out
    }

    /// Score every candidate and pick the lowest mean RMSE.
    ///
    /// Candidates are evaluated in parallel; folds within a candidate run in
    /// chronological order. Ties keep the earlier grid point.
    pub fn search(&self, x: &[Vec<f64>], y: &[f64]) -> Result<SearchOutcome> {
        self.config.validate()?;
        let candidates = self.candidates();
        let first = candidates
            .first()
            .copied()
            .ok_or_else(|| ForecastError::Configuration("empty booster grid".into()))?;

        let splits = match forward_chaining_splits(y.len(), self.config.folds, MIN_FOLD_TRAIN) {
            Ok(splits) => splits,
            Err(e) => {
                debug!(rows = y.len(), error = %e, "too little data for booster search, using first grid point");
                return Ok(SearchOutcome {
                    best: first,
                    best_rmse: None,
                    scores: Vec::new(),
                });
            }
        };

        let scores: Vec<CandidateScore> = candidates
            .par_iter()
            .map(|params| {
                let fold_scores: Result<Vec<f64>> = splits
                    .iter()
                    .map(|split| {
                        let mut model = GradientBoostedRegressor::new(*params);
                        model.fit(&x[split.train.clone()], &y[split.train.clone()])?;
                        let pred = model.predict(&x[split.test.clone()])?;
                        rmse(&y[split.test.clone()], &pred)
                    })
                    .collect();
                let rmse = match fold_scores {
                    Ok(s) => s.iter().sum::<f64>() / s.len() as f64,
                    Err(_) => f64::NAN,
                };
                CandidateScore {
                    params: *params,
                    rmse,
                }
            })
            .collect();

        let best = scores
            .iter()
            .filter(|s| s.rmse.is_finite())
            .fold(None::<&CandidateScore>, |best, s| match best {
                Some(b) if b.rmse <= s.rmse => Some(b),
                _ => Some(s),
            })
            .ok_or_else(|| ForecastError::ModelFit("every booster candidate failed".into()))?;

        debug!(
            learning_rate = best.params.learning_rate,
            max_depth = best.params.max_depth,
            reg_alpha = best.params.reg_alpha,
            reg_lambda = best.params.reg_lambda,
            cv_rmse = best.rmse,
            candidates = scores.len(),
            "booster search winner"
        );

        Ok(SearchOutcome {
            best: best.params,
            best_rmse: Some(best.rmse),
            scores,
        })
    }

    /// Fit `params` on the whole window, early-stopping on its tail.
    ///
    /// Falls back to a plain fit when the window is too short to hold out
    /// a validation tail.
    pub fn refit(
        &self,
        params: BoosterParams,
        x: &[Vec<f64>],
        y: &[f64],
    ) -> Result<GradientBoostedRegressor> {
        let n = y.len();
        let n_valid = ((n as f64) * self.config.validation_fraction).round() as usize;
        let mut model = GradientBoostedRegressor::new(params);
        if n_valid == 0 || n < n_valid + 2 {
            model.fit(x, y)?;
        } else {
            let cut = n - n_valid;
            model.fit_with_early_stopping(
                &x[..cut],
                &y[..cut],
                &x[cut..],
                &y[cut..],
                self.config.early_stopping_rounds,
            )?;
        }
        Ok(model)
    }
}

/// A boosted regressor that tunes itself with [`BoosterSearch`] on every fit.
#[derive(Debug, Clone, Default)]
pub struct TunedBooster {
    search: BoosterSearch,
    outcome: Option<SearchOutcome>,
    model: Option<GradientBoostedRegressor>,
}

impl TunedBooster {
    pub fn new(config: BoosterSearchConfig) -> Self {
        Self {
            search: BoosterSearch::new(config),
            outcome: None,
            model: None,
        }
    }

    /// Search result from the last fit.
    pub fn outcome(&self) -> Option<&SearchOutcome> {
        self.outcome.as_ref()
    }

    pub fn model(&self) -> Option<&GradientBoostedRegressor> {
        self.model.as_ref()
    }
}

impl Regressor for TunedBooster {
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
        if target.is_empty() {
            return Err(ForecastError::ModelFit(
                "gradient boosting needs at least one training row".into(),
            ));
        }
        let outcome = self.search.search(features, target)?;
        let model = self.search.refit(outcome.best, features, target)?;
        self.outcome = Some(outcome);
        self.model = Some(model);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        self.model
            .as_ref()
            .ok_or(ForecastError::FitRequired)?
            .predict_row(row)
    }

    fn name(&self) -> &str {
        "XGBoost"
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![(i % 12) as f64, (i as f64 * 0.7).sin()])
            .collect();
        let y = x.iter().map(|r| 3.0 * r[0] - 2.0 * r[1]).collect();
        (x, y)
    }

    fn small_grid() -> BoosterSearchConfig {
        BoosterSearchConfig {
            learning_rates: vec![0.1, 0.3],
            max_depths: vec![1, 3],
            reg_alphas: vec![0.0],
            reg_lambdas: vec![1.0],
            max_rounds: 40,
            ..BoosterSearchConfig::default()
        }
    }

    #[test]
    fn grid_order_is_stable() {
        let search = BoosterSearch::new(small_grid());
        let c = search.candidates();
        assert_eq!(c.len(), 4);
        assert_eq!((c[0].learning_rate, c[0].max_depth), (0.1, 1));
        assert_eq!((c[1].learning_rate, c[1].max_depth), (0.1, 3));
        assert_eq!((c[3].learning_rate, c[3].max_depth), (0.3, 3));
        assert!(c.iter().all(|p| p.n_rounds == 40));
    }

    #[test]
    fn search_scores_every_candidate_and_picks_minimum() {
        let (x, y) = data(60);
        let outcome = BoosterSearch::new(small_grid()).search(&x, &y).unwrap();
        assert_eq!(outcome.scores.len(), 4);
        let min = outcome
            .scores
            .iter()
            .map(|s| s.rmse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.best_rmse, Some(min));
        assert!(outcome.scores.iter().any(|s| s.params == outcome.best));
    }

    #[test]
    fn search_is_deterministic() {
        let (x, y) = data(48);
        let search = BoosterSearch::new(small_grid());
        assert_eq!(search.search(&x, &y).unwrap(), search.search(&x, &y).unwrap());
    }

    #[test]
    fn short_data_falls_back_to_first_candidate() {
        let (x, y) = data(5);
        let outcome = BoosterSearch::new(small_grid()).search(&x, &y).unwrap();
        assert_eq!(outcome.best_rmse, None);
        assert_eq!(outcome.best.learning_rate, 0.1);
        assert_eq!(outcome.best.max_depth, 1);
    }

    #[test]
    fn tuned_booster_fits_and_predicts() {
        let (x, y) = data(60);
        let mut model = TunedBooster::new(small_grid());
        assert!(!model.is_fitted());
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());
        let tree_count = model.model().unwrap().n_trees();
        assert!(tree_count >= 1 && tree_count <= 40);
        let pred = model.predict(&x).unwrap();
        assert_eq!(pred.len(), 60);
        assert!(pred.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn invalid_grid_is_a_configuration_error() {
        let (x, y) = data(30);
        let config = BoosterSearchConfig {
            learning_rates: Vec::new(),
            ..BoosterSearchConfig::default()
        };
        assert!(matches!(
            BoosterSearch::new(config).search(&x, &y),
            Err(ForecastError::Configuration(_))
        ));
    }
}
