//! Error types for the macrocast library.

use thiserror::Error;

/// Result type alias for forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while preparing data, fitting models or forecasting.
///
/// Failures are isolated per (series, model family) by the orchestrator, so the
/// type is `Clone + PartialEq` and can be stored next to successful outcomes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Not enough observations for the requested lag depth or model.
    #[error("insufficient history: need at least {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    /// Seasonal decomposition could not be computed.
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    /// A model could not be fitted (non-convergence, degenerate data, ...).
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// Missing or invalid configuration for a requested target.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A month key could not be parsed.
    #[error("invalid month key: {0}")]
    InvalidMonth(String),

    /// The same month appears twice in one index.
    #[error("duplicate month key: {0}")]
    DuplicateMonth(String),

    /// A named column is not present in the panel.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Reading or writing a file failed.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = ForecastError::EmptyData;
        assert_eq!(err.to_string(), "empty input data");

        let err = ForecastError::InsufficientHistory { needed: 13, got: 10 };
        assert_eq!(
            err.to_string(),
            "insufficient history: need at least 13 observations, got 10"
        );

        let err = ForecastError::ModelFit("objective diverged".to_string());
        assert_eq!(err.to_string(), "model fit failed: objective diverged");

        let err = ForecastError::Configuration("no orders for 'Cpi Values'".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: no orders for 'Cpi Values'"
        );

        let err = ForecastError::DimensionMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = ForecastError::Decomposition("too short".into());
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "panel.csv");
        let err: ForecastError = io.into();
        assert!(matches!(err, ForecastError::Io(_)));
    }
}
