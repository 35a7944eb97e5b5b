//! End-to-end tests of the forecasting pipeline.

use macrocast::config::{BoosterSearchConfig, ForecastConfig, SeriesModelConfig, StationarityConfig};
use macrocast::core::{ModelFamily, Panel, Series, YearMonth};
use macrocast::error::ForecastError;
use macrocast::features::LagSet;
use macrocast::forecast::{ForecastOrchestrator, LagForecaster};
use macrocast::io::{read_panel_csv, write_forecast_csv};
use macrocast::models::{Forecaster, LinearLagRegressor, SeasonalNaive, TunedBooster};
use macrocast::validation::StationarityAnalyzer;
use std::fs;

/// 100, 102, 101, 105, 107, 106, 110, ...: a mild trend with a 3-month wobble.
fn scenario_a_values(n: usize) -> Vec<f64> {
    let mut values = vec![100.0, 102.0, 101.0];
    while values.len() < n {
        let next = values[values.len() - 3] + 5.0;
        values.push(next);
    }
    values
}

fn quick_booster() -> BoosterSearchConfig {
    BoosterSearchConfig {
        max_rounds: 25,
        ..BoosterSearchConfig::single(0.3, 2)
    }
}

fn panel_of(name: &str, start: YearMonth, values: Vec<f64>) -> Panel {
    Panel::from_series(&Series::from_start(name, start, values))
}

#[test]
fn scenario_a_linear_table_covers_following_year() {
    let start = YearMonth::new(2019, 1).unwrap();
    let panel = panel_of("Cpi Values", start, scenario_a_values(36));
    let config = ForecastConfig::default()
        .with_series("Cpi Values", SeriesModelConfig::new([1, 1, 0], [0, 0, 0, 12]))
        .with_booster(quick_booster());

    let result = ForecastOrchestrator::new(config)
        .run_target(&panel, "Cpi Values")
        .unwrap();

    let table = &result.table;
    assert_eq!(table.horizon(), 12);
    assert!(table.is_contiguous());
    let expected: Vec<YearMonth> = YearMonth::new(2022, 1).unwrap().range(12);
    assert_eq!(table.months(), expected.as_slice());

    let linear = table.column(ModelFamily::LinearRegression).unwrap();
    assert_eq!(linear.len(), 12);
    assert!(linear.iter().all(|v| v.is_finite()));
    assert!(table
        .column_names()
        .contains(&"Cpi Values Linear Regression Forecast".to_string()));
}

#[test]
fn scenario_b_short_series_fails_lag_models_but_not_seasonal_naive() {
    let series = Series::from_start("ppi", YearMonth::new(2023, 1).unwrap(), (1..=10).map(f64::from).collect());

    let mut linear = LagForecaster::new(LinearLagRegressor::new(), LagSet::default());
    assert!(matches!(
        linear.fit(&series),
        Err(ForecastError::InsufficientHistory { needed: 13, got: 10 })
    ));

    let mut booster = LagForecaster::new(TunedBooster::new(quick_booster()), LagSet::default());
    assert!(matches!(
        booster.fit(&series),
        Err(ForecastError::InsufficientHistory { .. })
    ));

    let mut naive = SeasonalNaive::new(12);
    naive.fit(&series).unwrap();
    let forecast = naive.predict(12).unwrap();
    assert_eq!(forecast.horizon(), 12);
    assert_eq!(forecast.values()[0], 1.0);
    assert_eq!(forecast.values()[10], 1.0);
    assert_eq!(forecast.months()[0], YearMonth::new(2023, 11).unwrap());
}

#[test]
fn scenario_b_orchestrator_keeps_seasonal_naive_column() {
    let panel = panel_of("ppi", YearMonth::new(2023, 1).unwrap(), (1..=10).map(f64::from).collect());
    let config = ForecastConfig::default()
        .with_series("ppi", SeriesModelConfig::new([1, 0, 0], [0, 0, 0, 12]))
        .with_booster(quick_booster());
    let result = ForecastOrchestrator::new(config).run_target(&panel, "ppi").unwrap();

    assert!(result.succeeded(ModelFamily::SeasonalNaive));
    for family in [ModelFamily::LinearRegression, ModelFamily::XGBoost] {
        assert!(
            matches!(
                result.outcome(family).unwrap().result,
                Err(ForecastError::InsufficientHistory { needed: 13, got: 10 })
            ),
            "{family}: {:?}",
            result.outcome(family)
        );
    }
    assert_eq!(result.table.families().first(), Some(&ModelFamily::SeasonalNaive));
}

#[test]
fn scenario_c_constant_series_terminates_non_stationary() {
    let panel = panel_of("flat", YearMonth::new(2010, 1).unwrap(), vec![42.0; 60]);
    let report = StationarityAnalyzer::new(StationarityConfig::default())
        .analyze_all(&panel)
        .unwrap();

    assert_eq!(report.passes, 3);
    let column = report.column("flat").unwrap();
    assert!(!column.is_stationary);
    assert!(column.degenerate);
    assert_eq!(column.differences, 3);
    assert_eq!(report.panel.nrows(), 57);
}

#[test]
fn sarima_failure_leaves_other_columns_intact() {
    let values: Vec<f64> = (0..30)
        .map(|t| {
            let t = t as f64;
            250.0 + 0.7 * t + 3.0 * (t * std::f64::consts::PI / 6.0).cos() + (t * 1.3).sin()
        })
        .collect();
    let panel = panel_of("WTI Prices", YearMonth::new(2020, 1).unwrap(), values);
    let config = ForecastConfig::default()
        .with_series("WTI Prices", SeriesModelConfig::new([1, 1, 1], [1, 1, 1, 12]))
        .with_booster(quick_booster());

    let result = ForecastOrchestrator::new(config)
        .run_target(&panel, "WTI Prices")
        .unwrap();

    assert!(matches!(
        result.outcome(ModelFamily::Sarima).unwrap().result,
        Err(ForecastError::ModelFit(_))
    ));
    assert!(!result.succeeded(ModelFamily::SarimaXGBoost));
    for family in [
        ModelFamily::LinearRegression,
        ModelFamily::SeasonalNaive,
        ModelFamily::XGBoost,
    ] {
        assert!(result.succeeded(family), "{family}: {:?}", result.outcome(family));
        assert_eq!(result.table.column(family).map(<[f64]>::len), Some(12));
    }
    assert_eq!(result.table.column(ModelFamily::Sarima), None);
}

#[test]
fn csv_round_trip_through_cli_formats() {
    let dir = tempfile::tempdir().unwrap();
    let panel_path = dir.path().join("panel.csv");
    let output_path = dir.path().join("out").join("forecast.csv");

    let mut text = String::from("date,Cpi Values,Unemployment\n");
    let start = YearMonth::new(2018, 1).unwrap();
    let cpi = scenario_a_values(48);
    for (i, month) in start.range(48).iter().enumerate() {
        text.push_str(&format!("{month}-01,{},{}\n", cpi[i], 4.0 + (i % 5) as f64 * 0.1));
    }
    fs::write(&panel_path, text).unwrap();

    let config = ForecastConfig::from_json_str(
        r#"{
            "horizon": 6,
            "series": {
                "Cpi Values": { "order": [1, 1, 0], "seasonal_order": [0, 0, 0, 12] },
                "Unemployment": { "order": [1, 0, 0], "seasonal_order": [0, 0, 0, 12], "trend": "constant" }
            },
            "booster": { "learning_rates": [0.3], "max_depths": [2], "reg_alphas": [0.0], "max_rounds": 20 }
        }"#,
    )
    .unwrap();

    let panel = read_panel_csv(&panel_path).unwrap();
    let batch = ForecastOrchestrator::new(config).run_batch(&panel, &["Cpi Values", "Unemployment", "Gas"]);
    assert_eq!(batch.targets.len(), 2);
    assert_eq!(batch.skipped.len(), 1);
    assert!(matches!(batch.skipped[0].1, ForecastError::Configuration(_)));

    write_forecast_csv(&batch.combined(), &output_path).unwrap();
    let written = fs::read_to_string(&output_path).unwrap();
    let mut lines = written.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("year_month,Cpi Values Linear Regression Forecast"));
    assert!(header.contains("Unemployment Seasonal Naives Forecast"));
    assert_eq!(lines.next().unwrap().split(',').next(), Some("2022-01"));
    assert_eq!(written.lines().count(), 7);
}
