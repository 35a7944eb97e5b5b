//! Second-order gradient-boosted regression trees (squared error).
//!
//! - leaf weight `w* = -G / (H + λ)`, with soft-thresholding of `G` by `α`
//! - split gain `½ [G_L²/(H_L+λ) + G_R²/(H_R+λ) - G²/(H+λ)]`, kept only above `γ`
//! - children must carry at least `min_child_weight` hessian mass

use crate::error::{ForecastError, Result};
use crate::models::Regressor;
use crate::utils::rmse;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hyperparameters of a single boosted ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights.
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights.
    pub reg_alpha: f64,
    /// Minimum gain required to split.
    pub gamma: f64,
    /// Row share drawn (without replacement) for each tree.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf { weight } => *weight,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn leaf_weight(g_sum: f64, h_sum: f64, params: &BoosterParams) -> f64 {
    let g = if g_sum > params.reg_alpha {
        g_sum - params.reg_alpha
    } else if g_sum < -params.reg_alpha {
        g_sum + params.reg_alpha
    } else {
        return 0.0;
    };
    -g / (h_sum + params.reg_lambda)
}

fn build_tree(
    x: &[Vec<f64>],
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    depth: usize,
    params: &BoosterParams,
) -> Node {
    let g_sum: f64 = rows.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = rows.iter().map(|&i| hess[i]).sum();
    let weight = leaf_weight(g_sum, h_sum, params);

    if depth >= params.max_depth || rows.len() < 2 || h_sum < 2.0 * params.min_child_weight {
        return Node::Leaf { weight };
    }

    let n_features = x[rows[0]].len();
    let best = (0..n_features)
        .into_par_iter()
        .filter_map(|f| best_split(x, grad, hess, rows, f, params))
        .reduce_with(|a, b| {
            // Ties go to the lower feature index so results do not depend on scheduling.
            if b.gain > a.gain || (b.gain == a.gain && b.feature < a.feature) {
                b
            } else {
                a
            }
        });

    match best {
        Some(split) if split.gain > params.gamma => {
            let (left, right): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&i| x[i][split.feature] <= split.threshold);
            if left.is_empty() || right.is_empty() {
                return Node::Leaf { weight };
            }
            Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: Box::new(build_tree(x, grad, hess, &left, depth + 1, params)),
                right: Box::new(build_tree(x, grad, hess, &right, depth + 1, params)),
            }
        }
        _ => Node::Leaf { weight },
    }
}

/// Exact greedy search over the sorted values of one feature.
fn best_split(
    x: &[Vec<f64>],
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    feature: usize,
    params: &BoosterParams,
) -> Option<SplitCandidate> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

    let g_total: f64 = sorted.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| hess[i]).sum();
    let lambda = params.reg_lambda;
    let parent = g_total * g_total / (h_total + lambda);

    let (mut g_left, mut h_left) = (0.0, 0.0);
    let mut best: Option<SplitCandidate> = None;
    for pos in 0..sorted.len() - 1 {
        let (i, next) = (sorted[pos], sorted[pos + 1]);
        g_left += grad[i];
        h_left += hess[i];
        if x[next][feature] - x[i][feature] < 1e-12 {
            continue;
        }
        let (g_right, h_right) = (g_total - g_left, h_total - h_left);
        if h_left < params.min_child_weight || h_right < params.min_child_weight {
            continue;
        }
        let gain = 0.5
            * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                - parent);
        if best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                threshold: (x[i][feature] + x[next][feature]) / 2.0,
                gain,
            });
        }
    }
    best
}

fn subsample(rng: &mut StdRng, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut rows = rand::seq::index::sample(rng, n, k.min(n)).into_vec();
    rows.sort_unstable();
    rows
}

/// Squared-error gradient boosting regressor.
#[derive(Debug, Clone)]
pub struct GradientBoostedRegressor {
    params: BoosterParams,
    base_score: f64,
    trees: Vec<Node>,
    n_features: Option<usize>,
    validation_rmse: Vec<f64>,
}

impl GradientBoostedRegressor {
    pub fn new(params: BoosterParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            n_features: None,
            validation_rmse: Vec::new(),
        }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    /// Number of trees in the fitted ensemble.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Validation RMSE after each round of the last early-stopped fit.
    pub fn validation_rmse(&self) -> &[f64] {
        &self.validation_rmse
    }

    /// Fit, tracking validation RMSE each round and keeping only the rounds
    /// up to the best one. Stops after `patience` rounds without improvement.
    pub fn fit_with_early_stopping(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        valid_x: &[Vec<f64>],
        valid_y: &[f64],
        patience: usize,
    ) -> Result<()> {
        self.validation_rmse.clear();
        let mut valid_pred: Option<Vec<f64>> = None;
        let mut best_round = 0usize;
        let mut best_score = f64::INFINITY;

        self.boost(x, y, |model, tree| {
            let preds = valid_pred.get_or_insert_with(|| vec![model.base_score; valid_x.len()]);
            for (p, row) in preds.iter_mut().zip(valid_x) {
                *p += model.params.learning_rate * tree.predict(row);
            }
            let score = rmse(valid_y, preds).unwrap_or(f64::INFINITY);
            model.validation_rmse.push(score);
            let round = model.validation_rmse.len();
            if score < best_score {
                best_score = score;
                best_round = round;
            }
            round - best_round < patience.max(1)
        })?;

        self.trees.truncate(best_round.max(1));
        debug!(
            rounds = self.validation_rmse.len(),
            kept = self.trees.len(),
            best_rmse = best_score,
            "early stopping"
        );
        Ok(())
    }

    /// Core boosting loop. `after_round` sees each new tree and returns
    /// whether to continue.
    fn boost<F>(&mut self, x: &[Vec<f64>], y: &[f64], mut after_round: F) -> Result<()>
    where
        F: FnMut(&mut Self, &Node) -> bool,
    {
        if x.is_empty() {
            return Err(ForecastError::ModelFit(
                "gradient boosting needs at least one training row".into(),
            ));
        }
        if x.len() != y.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        let width = x[0].len();
        if x.iter().any(|r| r.len() != width) {
            return Err(ForecastError::ModelFit("ragged feature rows".into()));
        }
        if y.iter().chain(x.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(
                "gradient boosting input contains non-finite values".into(),
            ));
        }

        let n = y.len();
        self.n_features = Some(width);
        self.base_score = y.iter().sum::<f64>() / n as f64;
        self.trees.clear();

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut preds = vec![self.base_score; n];
        let hess = vec![1.0; n];

        for _ in 0..self.params.n_rounds {
            let grad: Vec<f64> = preds.iter().zip(y).map(|(p, t)| p - t).collect();
            let rows = subsample(&mut rng, n, self.params.subsample);
            let tree = build_tree(x, &grad, &hess, &rows, 0, &self.params);

            for (p, row) in preds.iter_mut().zip(x) {
                *p += self.params.learning_rate * tree.predict(row);
            }
            let keep_going = after_round(self, &tree);
            self.trees.push(tree);
            if !keep_going {
                break;
            }
        }
        Ok(())
    }
}

impl Default for GradientBoostedRegressor {
    fn default() -> Self {
        Self::new(BoosterParams::default())
    }
}

impl Regressor for GradientBoostedRegressor {
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
        self.validation_rmse.clear();
        self.boost(features, target, |_, _| true)
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let width = self.n_features.ok_or(ForecastError::FitRequired)?;
        if row.len() != width {
            return Err(ForecastError::DimensionMismatch {
                expected: width,
                got: row.len(),
            });
        }
        Ok(self.base_score
            + self
                .trees
                .iter()
                .map(|t| self.params.learning_rate * t.predict(row))
                .sum::<f64>())
    }

    fn name(&self) -> &str {
        "XGBoost"
    }

    fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn regression_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![i as f64 * 0.1, ((i * 7) % 11) as f64])
            .collect();
        let y = x.iter().map(|r| 2.0 * r[0] + 0.5 * r[1] + 1.0).collect();
        (x, y)
    }

    fn r_squared(model: &GradientBoostedRegressor, x: &[Vec<f64>], y: &[f64]) -> f64 {
        let pred = model.predict(x).unwrap();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let ss_res: f64 = pred.iter().zip(y).map(|(p, t)| (p - t).powi(2)).sum();
        let ss_tot: f64 = y.iter().map(|t| (t - mean).powi(2)).sum();
        1.0 - ss_res / ss_tot
    }

    #[test]
    fn fits_smooth_target() {
        let (x, y) = regression_data(80);
        let mut model = GradientBoostedRegressor::new(BoosterParams {
            n_rounds: 100,
            learning_rate: 0.3,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(r_squared(&model, &x, &y) > 0.95);
        assert_eq!(model.n_trees(), 100);
    }

    #[test]
    fn l1_soft_threshold_zeroes_small_gradients() {
        let params = BoosterParams {
            reg_alpha: 5.0,
            reg_lambda: 1.0,
            ..Default::default()
        };
        assert_eq!(leaf_weight(3.0, 10.0, &params), 0.0);
        assert_relative_eq!(leaf_weight(-16.0, 10.0, &params), 1.0);
    }

    #[test]
    fn large_gamma_keeps_single_leaf() {
        let (x, y) = regression_data(30);
        let mut model = GradientBoostedRegressor::new(BoosterParams {
            n_rounds: 5,
            gamma: 1e12,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        // Every tree is a single leaf, so all rows get the same prediction.
        assert!(pred.iter().all(|p| (p - pred[0]).abs() < 1e-12));
    }

    #[test]
    fn seeded_subsampling_is_deterministic() {
        let (x, y) = regression_data(60);
        let params = BoosterParams {
            n_rounds: 20,
            subsample: 0.6,
            seed: 7,
            ..Default::default()
        };
        let mut a = GradientBoostedRegressor::new(params);
        let mut b = GradientBoostedRegressor::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn early_stopping_truncates_to_best_round() {
        let (x, y) = regression_data(100);
        let (train_x, valid_x) = x.split_at(80);
        let (train_y, valid_y) = y.split_at(80);
        let mut model = GradientBoostedRegressor::new(BoosterParams {
            n_rounds: 300,
            learning_rate: 0.3,
            ..Default::default()
        });
        model
            .fit_with_early_stopping(train_x, train_y, valid_x, valid_y, 5)
            .unwrap();

        let history = model.validation_rmse();
        assert!(!history.is_empty());
        assert!(model.n_trees() <= history.len());
        let best = history.iter().copied().fold(f64::INFINITY, f64::min);
        assert_relative_eq!(history[model.n_trees() - 1], best);
    }

    #[test]
    fn rejects_bad_input() {
        let mut model = GradientBoostedRegressor::default();
        assert!(matches!(model.fit(&[], &[]), Err(ForecastError::ModelFit(_))));
        assert!(model
            .fit(&[vec![1.0], vec![f64::NAN]], &[1.0, 2.0])
            .is_err());
        assert!(matches!(
            GradientBoostedRegressor::default().predict_row(&[1.0]),
            Err(ForecastError::FitRequired)
        ));
    }
}
