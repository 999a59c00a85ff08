//! CSV file price adapter.
//!
//! Reads `<directory>/<SYMBOL>.csv` with a header row. The date column is
//! `date`; the price column is the first of `adjusted`, `adj_close`,
//! `adjusted_close` or `close` present. Empty, `NA`, `NaN` and `null` prices
//! are gaps.

use crate::domain::error::ArimaTraderError;
use crate::domain::series::RawPoint;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

const PRICE_COLUMNS: [&str; 4] = ["adjusted", "adj_close", "adjusted_close", "close"];

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn parse_price(raw: &str, date: NaiveDate) -> Result<Option<f64>, ArimaTraderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || ["na", "nan", "null"].contains(&trimmed.to_lowercase().as_str()) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|e| ArimaTraderError::Data {
            reason: format!("invalid price '{}' at {}: {}", trimmed, date, e),
        })
}

impl DataPort for CsvPriceAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<RawPoint>, ArimaTraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| ArimaTraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let date_idx = headers
            .iter()
            .position(|h| h == "date")
            .ok_or_else(|| ArimaTraderError::Data {
                reason: format!("{}: missing date column", path.display()),
            })?;
        let price_idx = PRICE_COLUMNS
            .iter()
            .find_map(|name| headers.iter().position(|h| h == name))
            .ok_or_else(|| ArimaTraderError::Data {
                reason: format!(
                    "{}: no price column (expected one of {})",
                    path.display(),
                    PRICE_COLUMNS.join(", ")
                ),
            })?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result?;

            let date_str = record.get(date_idx).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                ArimaTraderError::Data {
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            if start_date.is_some_and(|s| date < s) || end_date.is_some_and(|e| date > e) {
                continue;
            }

            let value = parse_price(record.get(price_idx).unwrap_or_default(), date)?;
            points.push(RawPoint { date, value });
        }

        points.sort_by_key(|p| p.date);
        tracing::debug!(symbol, rows = points.len(), file = %path.display(), "read prices");
        Ok(points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ArimaTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ArimaTraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
