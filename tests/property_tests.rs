//! Property-based tests for the pipeline's universal invariants.
//!
//! Inputs are randomly generated monthly series; case counts are kept small
//! because several properties fit models.

use macrocast::config::StationarityConfig;
use macrocast::core::{is_contiguous, Panel, Series, YearMonth};
use macrocast::features::{build_lags, LagSet};
use macrocast::forecast::LagForecaster;
use macrocast::models::{Forecaster, LinearLagRegressor, SeasonalNaive};
use macrocast::seasonality::Decomposer;
use macrocast::validation::StationarityAnalyzer;
use proptest::prelude::*;

fn start() -> YearMonth {
    YearMonth::new(2000, 1).unwrap()
}

fn make_series(values: &[f64]) -> Series {
    Series::from_start("y", start(), values.to_vec())
}

/// Values with a little drift so no series is exactly constant.
fn values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        prop::collection::vec(1.0..1000.0_f64, len).prop_map(|mut v| {
            for (i, val) in v.iter_mut().enumerate() {
                *val += i as f64 * 0.01;
            }
            v
        })
    })
}

/// Trend plus a 12-month cycle plus bounded noise.
fn seasonal_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        (
            10.0..200.0_f64,
            -1.0..1.0_f64,
            1.0..20.0_f64,
            prop::collection::vec(-1.0..1.0_f64, len),
        )
            .prop_map(move |(base, slope, amplitude, noise)| {
                (0..len)
                    .map(|i| {
                        let t = i as f64;
                        base + slope * t
                            + amplitude * (2.0 * std::f64::consts::PI * t / 12.0).sin()
                            + noise[i]
                    })
                    .collect()
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn build_lags_drops_exactly_max_lag_rows(
        values in values_strategy(13, 80),
        max_lag in 1usize..=12,
        drop_original in any::<bool>(),
    ) {
        let panel = Panel::from_series(&make_series(&values));
        let lags = LagSet::up_to(max_lag).unwrap();
        let lagged = build_lags(&panel, &lags, drop_original).unwrap();
        prop_assert_eq!(lagged.nrows(), values.len() - max_lag);
        let expected_cols = max_lag + usize::from(!drop_original);
        prop_assert_eq!(lagged.ncols(), expected_cols);
        prop_assert!(lagged.months().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn seasonal_naive_reproduces_last_cycle(values in values_strategy(12, 60)) {
        let mut model = SeasonalNaive::new(12);
        model.fit(&make_series(&values)).unwrap();
        let forecast = model.predict(12).unwrap();
        prop_assert_eq!(forecast.values(), &values[values.len() - 12..]);
    }

    #[test]
    fn stationarity_analyzer_makes_at_most_three_passes(values in values_strategy(20, 80)) {
        let panel = Panel::from_series(&make_series(&values));
        let report = StationarityAnalyzer::new(StationarityConfig::default())
            .analyze_all(&panel)
            .unwrap();
        prop_assert!(report.passes <= 3);
        prop_assert_eq!(report.panel.nrows(), values.len() - report.passes);
        prop_assert!(report.panel.column("y").unwrap().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn decomposition_round_trips(values in seasonal_strategy(24, 96)) {
        let series = make_series(&values);
        let decomposition = Decomposer::new(12).decompose(&series).unwrap();
        for (rebuilt, observed) in decomposition.reconstruct().iter().zip(&values) {
            prop_assert!((rebuilt - observed).abs() < 1e-8);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn iterative_forecast_has_requested_length_and_months(
        values in seasonal_strategy(20, 60),
        horizon in 1usize..30,
    ) {
        let series = make_series(&values);
        let mut model = LagForecaster::new(LinearLagRegressor::new(), LagSet::up_to(3).unwrap());
        model.fit(&series).unwrap();
        let forecast = model.predict(horizon).unwrap();

        prop_assert_eq!(forecast.horizon(), horizon);
        prop_assert_eq!(forecast.months().len(), horizon);
        let last = series.last_month().unwrap();
        prop_assert_eq!(forecast.months()[0], last.succ());
        prop_assert!(is_contiguous(forecast.months()));
    }
}
