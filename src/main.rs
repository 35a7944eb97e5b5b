//! Command-line entry point for macrocast.

use clap::{Parser, Subcommand};
use macrocast::config::{ForecastConfig, StationarityConfig};
use macrocast::io::{read_panel_csv, write_forecast_csv};
use macrocast::validation::StationarityAnalyzer;
use macrocast::{ForecastError, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "macrocast")]
#[command(about = "Multi-model monthly forecasts for macroeconomic series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast target series with every model family
    Forecast {
        /// Panel CSV: month column first, then numeric series
        #[arg(short, long)]
        panel: PathBuf,

        /// JSON run configuration with per-series SARIMA orders
        #[arg(short, long)]
        config: PathBuf,

        /// Output CSV for the combined forecast table
        #[arg(short, long)]
        output: PathBuf,

        /// Series to forecast (default: every configured series in the panel)
        #[arg(short, long)]
        target: Vec<String>,
    },

    /// Report unit-root diagnostics with iterative differencing
    Stationarity {
        /// Panel CSV: month column first, then numeric series
        #[arg(short, long)]
        panel: PathBuf,

        /// Columns to test (default: all)
        #[arg(short = 'k', long)]
        column: Vec<String>,

        /// JSON run configuration; its `stationarity` section sets the test
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Significance level for the ADF test (overrides the configuration)
        #[arg(short, long)]
        significance: Option<f64>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Forecast {
            panel,
            config,
            output,
            target,
        } => run_forecast(panel, config, output, target),
        Commands::Stationarity {
            panel,
            column,
            config,
            significance,
        } => stationarity_settings(config.as_deref(), significance)
            .and_then(|settings| run_stationarity(panel, column, settings)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "macrocast failed");
            ExitCode::FAILURE
        }
    }
}

fn run_forecast(
    panel_path: PathBuf,
    config_path: PathBuf,
    output: PathBuf,
    targets: Vec<String>,
) -> Result<()> {
    let panel = read_panel_csv(&panel_path)?;
    let config = ForecastConfig::from_json_file(&config_path)?;
    info!(
        panel = %panel_path.display(),
        rows = panel.nrows(),
        columns = panel.ncols(),
        "loaded panel"
    );

    let targets: Vec<String> = if targets.is_empty() {
        config
            .series
            .keys()
            .filter(|name| panel.has_column(name))
            .cloned()
            .collect()
    } else {
        targets
    };
    if targets.is_empty() {
        return Err(ForecastError::Configuration(
            "no configured series found in the panel".to_string(),
        ));
    }

    let orchestrator = macrocast::forecast::ForecastOrchestrator::new(config);
    let names: Vec<&str> = targets.iter().map(String::as_str).collect();
    let batch = orchestrator.run_batch(&panel, &names);

    for target in &batch.targets {
        for evaluation in &target.evaluations {
            info!(
                series = %target.target,
                family = %evaluation.family,
                mae = evaluation.metrics.mae,
                rmse = evaluation.metrics.rmse,
                r_squared = evaluation.metrics.r_squared,
                "hold-out accuracy"
            );
        }
    }

    let combined = batch.combined();
    write_forecast_csv(&combined, &output)?;
    info!(
        output = %output.display(),
        targets = batch.targets.len(),
        skipped = batch.skipped.len(),
        "wrote forecasts"
    );
    Ok(())
}

/// Stationarity settings from the run configuration, if any, with the
/// command-line significance taking precedence.
fn stationarity_settings(
    config_path: Option<&Path>,
    significance: Option<f64>,
) -> Result<StationarityConfig> {
    let mut settings = match config_path {
        Some(path) => ForecastConfig::from_json_file(path)?.stationarity,
        None => StationarityConfig::default(),
    };
    if let Some(significance) = significance {
        if !(significance > 0.0 && significance < 1.0) {
            return Err(ForecastError::Configuration(format!(
                "significance must be in (0, 1), got {significance}"
            )));
        }
        settings.significance = significance;
    }
    Ok(settings)
}

fn run_stationarity(
    panel_path: PathBuf,
    columns: Vec<String>,
    settings: StationarityConfig,
) -> Result<()> {
    let panel = read_panel_csv(&panel_path)?;
    let analyzer = StationarityAnalyzer::new(settings);
    let report = if columns.is_empty() {
        analyzer.analyze_all(&panel)?
    } else {
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        analyzer.analyze(&panel, &names)?
    };

    println!(
        "{:<32} {:>10} {:>10} {:>6} {:>11}",
        "column", "adf", "p-value", "diffs", "stationary"
    );
    for c in &report.columns {
        println!(
            "{:<32} {:>10.4} {:>10.4} {:>6} {:>11}",
            c.name,
            c.statistic,
            c.p_value,
            c.differences,
            if c.degenerate {
                "degenerate"
            } else if c.is_stationary {
                "yes"
            } else {
                "no"
            }
        );
    }
    info!(passes = report.passes, "stationarity analysis complete");
    Ok(())
}
