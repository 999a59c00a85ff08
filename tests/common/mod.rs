#![allow(dead_code)]

use arimatrader::domain::engine::{FittedModel, ForecastEngine};
use arimatrader::domain::error::ArimaTraderError;
use arimatrader::domain::pipeline::PipelineResult;
use arimatrader::domain::series::{ModelOrder, PriceSeries, RawPoint, TimePoint};
use arimatrader::ports::data_port::DataPort;
use arimatrader::ports::report_port::ReportPort;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<RawPoint>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_points(mut self, symbol: &str, points: Vec<RawPoint>) -> Self {
        self.data.insert(symbol.to_string(), points);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<RawPoint>, ArimaTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ArimaTraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|p| start_date.is_none_or(|s| p.date >= s))
            .filter(|p| end_date.is_none_or(|e| p.date <= e))
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, ArimaTraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Records every report request instead of writing files.
pub struct MockReportPort {
    pub calls: RefCell<Vec<(String, PathBuf, usize)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write(
        &self,
        result: &PipelineResult,
        symbol: &str,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ArimaTraderError> {
        self.calls.borrow_mut().push((
            symbol.to_string(),
            output_dir.to_path_buf(),
            result.forecasts.len(),
        ));
        Ok(Vec::new())
    }
}

/// Wraps an engine and records the values of every window it is asked to fit.
pub struct SpyEngine<E> {
    pub inner: E,
    pub windows: Mutex<Vec<Vec<f64>>>,
}

impl<E> SpyEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn windows(&self) -> Vec<Vec<f64>> {
        self.windows.lock().unwrap().clone()
    }
}

impl<E: ForecastEngine> ForecastEngine for SpyEngine<E> {
    type Model = E::Model;

    fn fit(&self, window: &PriceSeries, order: ModelOrder) -> Result<E::Model, ArimaTraderError> {
        self.windows.lock().unwrap().push(window.values());
        self.inner.fit(window, order)
    }
}

/// Forecasts the last observed value; never fails.
pub struct NaiveEngine;

pub struct NaiveModel {
    order: ModelOrder,
    last: f64,
    observations: usize,
}

impl FittedModel for NaiveModel {
    fn order(&self) -> ModelOrder {
        self.order
    }

    fn statistics(&self) -> arimatrader::domain::engine::FitStatistics {
        arimatrader::domain::engine::FitStatistics {
            log_likelihood: 0.0,
            parameters: 1,
            observations: self.observations,
        }
    }

    fn forecast(&self, horizon: usize) -> Result<Vec<f64>, ArimaTraderError> {
        Ok(vec![self.last; horizon])
    }

    fn forecast_intervals(
        &self,
        horizon: usize,
        _level: f64,
    ) -> Result<Vec<arimatrader::domain::engine::IntervalForecast>, ArimaTraderError> {
        Ok((0..horizon)
            .map(|_| arimatrader::domain::engine::IntervalForecast {
                point: self.last,
                lower: self.last,
                upper: self.last,
            })
            .collect())
    }
}

impl ForecastEngine for NaiveEngine {
    type Model = NaiveModel;

    fn fit(&self, window: &PriceSeries, order: ModelOrder) -> Result<NaiveModel, ArimaTraderError> {
        let last = window.last_value().ok_or_else(|| ArimaTraderError::InsufficientData {
            context: "naive forecast".into(),
            have: 0,
            need: 1,
        })?;
        Ok(NaiveModel {
            order,
            last,
            observations: window.len(),
        })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fridays starting 2020-01-03.
pub fn weekly_dates(count: usize) -> Vec<NaiveDate> {
    (0..count)
        .map(|i| date(2020, 1, 3) + chrono::Duration::weeks(i as i64))
        .collect()
}

pub fn weekly_series(values: &[f64]) -> PriceSeries {
    PriceSeries::new(
        weekly_dates(values.len())
            .into_iter()
            .zip(values)
            .map(|(d, &v)| TimePoint::new(d, v))
            .collect(),
    )
    .unwrap()
}

pub fn weekly_raw(values: &[Option<f64>]) -> Vec<RawPoint> {
    weekly_dates(values.len())
        .into_iter()
        .zip(values)
        .map(|(date, &value)| RawPoint { date, value })
        .collect()
}

/// Deterministic random walk with drift, starting at `start`.
pub fn random_walk(count: usize, start: f64, seed: u64) -> Vec<f64> {
    let mut state = seed;
    let mut price = start;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let u = (state >> 11) as f64 / (1u64 << 53) as f64;
            price += 0.1 + 2.0 * (u - 0.5);
            price
        })
        .collect()
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
