//! CSV input and output.
//!
//! Panels are read from files whose first column is the month (or a date in
//! that month) and whose remaining columns are numeric. Forecasts are written
//! as a `year_month` column followed by one column per target and family.

use crate::core::{CombinedForecast, Panel, YearMonth};
use crate::error::{ForecastError, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

/// Read a panel from a CSV file.
pub fn read_panel_csv(path: impl AsRef<Path>) -> Result<Panel> {
    let file = fs::File::open(path.as_ref())?;
    read_panel(file)
}

/// Read a panel from any CSV source.
///
/// Empty or non-numeric cells become `NaN`.
pub fn read_panel<R: Read>(source: R) -> Result<Panel> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(ForecastError::InvalidParameter(
            "panel CSV needs a month column and at least one value column".to_string(),
        ));
    }

    let names: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    let mut months = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for record in reader.records() {
        let record = record?;
        let key = record.get(0).unwrap_or_default();
        months.push(YearMonth::parse(key)?);
        for (j, column) in columns.iter_mut().enumerate() {
            let value = record
                .get(j + 1)
                .and_then(|cell| cell.trim().parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            column.push(value);
        }
    }

    if months.is_empty() {
        return Err(ForecastError::EmptyData);
    }

    Panel::new(months, names.into_iter().zip(columns).collect())
}

/// Write a combined forecast to a CSV file, creating parent directories.
pub fn write_forecast_csv(forecast: &CombinedForecast, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    write_forecast(forecast, file)
}

/// Write a combined forecast as CSV. Missing cells are left empty.
pub fn write_forecast<W: Write>(forecast: &CombinedForecast, sink: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(forecast.headers())?;

    for (i, month) in forecast.months().iter().enumerate() {
        let mut record = vec![month.to_string()];
        record.extend(
            forecast
                .row_cells(i)
                .into_iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Forecast, ForecastTable, ModelFamily};

    #[test]
    fn reads_dates_and_missing_cells() {
        let csv = "date,Cpi Values,WTI Prices\n\
                   2020-02-01,258.7,50.5\n\
                   2020-01-01,257.9,\n\
                   2020-03-01,258.1,29.2\n";
        let panel = read_panel(csv.as_bytes()).unwrap();
        assert_eq!(panel.nrows(), 3);
        assert_eq!(panel.column_names(), vec!["Cpi Values", "WTI Prices"]);
        assert_eq!(panel.months()[0].to_string(), "2020-01");
        assert_eq!(panel.column("Cpi Values").unwrap(), &[257.9, 258.7, 258.1]);
        assert!(panel.column("WTI Prices").unwrap()[0].is_nan());
    }

    #[test]
    fn rejects_bad_month_keys() {
        let csv = "date,x\nnot-a-date,1.0\n";
        assert!(matches!(
            read_panel(csv.as_bytes()),
            Err(ForecastError::InvalidMonth(_))
        ));
    }

    #[test]
    fn rejects_header_only_input() {
        let csv = "date,x\n";
        assert!(matches!(read_panel(csv.as_bytes()), Err(ForecastError::EmptyData)));
    }

    #[test]
    fn writes_empty_cells_for_missing_values() {
        let last = YearMonth::parse("2023-12").unwrap();
        let mut a = ForecastTable::new("a", last, 2);
        a.insert(ModelFamily::SeasonalNaive, &Forecast::after(last, vec![1.5, 2.0]))
            .unwrap();
        let mut b = ForecastTable::new("b", last.succ(), 1);
        b.insert(ModelFamily::Sarima, &Forecast::after(last.succ(), vec![3.0]))
            .unwrap();

        let mut out = Vec::new();
        write_forecast(&CombinedForecast::from_tables(&[a, b]), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "year_month,a Seasonal Naives Forecast,b SARIMA Forecast"
        );
        assert_eq!(lines[1], "2024-01,1.5,");
        assert_eq!(lines[2], "2024-02,2,3");
    }

    #[test]
    fn file_round_trip_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("forecast.csv");
        let last = YearMonth::parse("2023-12").unwrap();
        let mut table = ForecastTable::new("cpi", last, 1);
        table
            .insert(ModelFamily::LinearRegression, &Forecast::after(last, vec![1.0]))
            .unwrap();
        write_forecast_csv(&CombinedForecast::from_tables(&[table]), &path).unwrap();
        assert!(path.exists());
    }
}
