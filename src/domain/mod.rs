//! Core domain types and logic: series handling, ARIMA modelling, rolling
//! forecasts, signals and evaluation.

pub mod series;
pub mod resample;
pub mod differencing;
pub mod regression;
pub mod stationarity;
pub mod optimize;
pub mod engine;
pub mod arima;
pub mod order_selection;
pub mod rolling;
pub mod signal;
pub mod metrics;
pub mod config_validation;
pub mod pipeline;
pub mod error;
