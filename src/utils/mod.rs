//! Numerical support shared by the models.

pub mod cross_validation;
pub mod metrics;
pub mod ols;
pub mod optimization;

pub use cross_validation::{forward_chaining_splits, train_test_split_index, ForwardChainingSplit};
pub use metrics::{calculate_metrics, rmse, AccuracyMetrics};
pub use ols::{ols_fit, ols_residuals, OlsFit};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
