//! Stationarity testing.

pub mod stationarity;

pub use stationarity::{
    adf_test, AdfResult, ColumnStationarity, CriticalValues, StationarityAnalyzer,
    StationarityReport,
};
