//! Expanding-window one-step-ahead forecasting over a test period.
//!
//! For each test point the model is refitted on every observation strictly
//! before it, then forecasts one step. The window grows by the actual value
//! only after the forecast for that step is recorded.

use crate::domain::engine::{FittedModel, ForecastEngine};
use crate::domain::error::ArimaTraderError;
use crate::domain::series::{ModelOrder, PriceSeries};
use chrono::NaiveDate;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One forecast step: the actual price at `date` and the prediction made for
/// it from data strictly before `date`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRecord {
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
    /// True when the fit failed and a fallback value was used.
    pub substituted: bool,
}

/// What to do when a window's fit fails to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvergencePolicy {
    #[default]
    Abort,
    /// Reuse the previous prediction, or the last observed price on the first step.
    CarryForward,
}

impl FromStr for ConvergencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(ConvergencePolicy::Abort),
            "carry_forward" => Ok(ConvergencePolicy::CarryForward),
            other => Err(format!("unknown convergence policy '{}'", other)),
        }
    }
}

/// Receives progress from the rolling loop. All methods default to no-ops.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _total: usize) {}
    fn on_step(&self, _completed: usize, _total: usize, _record: &ForecastRecord) {}
    fn on_substitution(&self, _record: &ForecastRecord, _cause: &ArimaTraderError) {}
    fn on_finish(&self, _completed: usize) {}
}

pub struct NullObserver;

impl ProgressObserver for NullObserver {}

/// Cooperative cancellation flag shared between the caller and the loop.
/// The loop checks it between steps and stops with [`ArimaTraderError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fits `order` on `window` and returns the one-step-ahead point forecast.
pub fn forecast_step<E: ForecastEngine>(
    engine: &E,
    window: &PriceSeries,
    order: ModelOrder,
) -> Result<f64, ArimaTraderError> {
    let model = engine.fit(window, order)?;
    let forecast = model.forecast(1)?;
    let value = forecast.first().copied().ok_or_else(|| ArimaTraderError::Convergence {
        order,
        window_end: window.last_date(),
        window_len: window.len(),
        reason: "model returned no forecast".into(),
    })?;
    if !value.is_finite() {
        return Err(ArimaTraderError::Convergence {
            order,
            window_end: window.last_date(),
            window_len: window.len(),
            reason: format!("non-finite forecast {}", value),
        });
    }
    Ok(value)
}

pub struct RollingForecaster<'a, E> {
    engine: &'a E,
    policy: ConvergencePolicy,
    observer: &'a dyn ProgressObserver,
    cancel: CancellationToken,
}

impl<'a, E: ForecastEngine> RollingForecaster<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            policy: ConvergencePolicy::Abort,
            observer: &NullObserver,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: ConvergencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Produces one record per test point, in test order.
    pub fn run(
        &self,
        train: &PriceSeries,
        test: &PriceSeries,
        order: ModelOrder,
    ) -> Result<Vec<ForecastRecord>, ArimaTraderError> {
        if let (Some(last_train), Some(first_test)) = (train.last_date(), test.first_date()) {
            if first_test <= last_train {
                return Err(ArimaTraderError::InvalidSeries {
                    reason: format!(
                        "test period starts {} but training ends {}",
                        first_test, last_train
                    ),
                });
            }
        }

        let total = test.len();
        self.observer.on_start(total);
        tracing::info!(%order, train = train.len(), steps = total, "rolling forecast started");

        let (records, _) = test.points().iter().try_fold(
            (Vec::with_capacity(total), train.clone()),
            |(mut records, window), point| {
                if self.cancel.is_cancelled() {
                    tracing::warn!(completed = records.len(), total, "rolling forecast cancelled");
                    return Err(ArimaTraderError::Cancelled {
                        completed: records.len(),
                        total,
                    });
                }

                let record = match forecast_step(self.engine, &window, order) {
                    Ok(predicted) => ForecastRecord {
                        date: point.date,
                        actual: point.value,
                        predicted,
                        substituted: false,
                    },
                    Err(cause @ ArimaTraderError::Convergence { .. })
                        if self.policy == ConvergencePolicy::CarryForward =>
                    {
                        let Some(fallback) = records
                            .last()
                            .map(|r: &ForecastRecord| r.predicted)
                            .or_else(|| window.last_value())
                        else {
                            return Err(cause);
                        };
                        let record = ForecastRecord {
                            date: point.date,
                            actual: point.value,
                            predicted: fallback,
                            substituted: true,
                        };
                        tracing::warn!(date = %point.date, fallback, "fit failed, carrying forward");
                        self.observer.on_substitution(&record, &cause);
                        record
                    }
                    Err(e) => return Err(e),
                };

                records.push(record);
                self.observer.on_step(records.len(), total, &record);
                let window = window.appended(*point)?;
                Ok((records, window))
            },
        )?;

        self.observer.on_finish(records.len());
        let substituted = records.iter().filter(|r| r.substituted).count();
        tracing::info!(steps = records.len(), substituted, "rolling forecast finished");
        Ok(records)
    }
}
