//! Multi-step forecasting: the recursive rollout and the per-target pipeline.

pub mod iterative;
pub mod orchestrator;

pub use iterative::{IterativeForecaster, LagForecaster, LagRing, LagState};
pub use orchestrator::{
    BatchForecast, FamilyOutcome, ForecastOrchestrator, HoldoutEvaluation, TargetForecast,
};
