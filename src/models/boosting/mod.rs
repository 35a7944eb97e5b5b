//! Gradient-boosted regression trees and their hyperparameter search.

mod search;
mod tree;

pub use search::{BoosterSearch, CandidateScore, SearchOutcome, TunedBooster};
pub use tree::{BoosterParams, GradientBoostedRegressor};
