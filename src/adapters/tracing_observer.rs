//! Progress observer that reports the rolling loop through `tracing`.

use crate::domain::error::ArimaTraderError;
use crate::domain::rolling::{ForecastRecord, ProgressObserver};

/// Logs at `info` every `every` steps and on completion; substitutions at `warn`.
pub struct TracingObserver {
    every: usize,
}

impl TracingObserver {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressObserver for TracingObserver {
    fn on_start(&self, total: usize) {
        tracing::info!(total, "forecasting test period");
    }

    fn on_step(&self, completed: usize, total: usize, record: &ForecastRecord) {
        if completed % self.every == 0 || completed == total {
            tracing::info!(
                completed,
                total,
                date = %record.date,
                predicted = record.predicted,
                actual = record.actual,
                "forecast progress"
            );
        }
    }

    fn on_substitution(&self, record: &ForecastRecord, cause: &ArimaTraderError) {
        tracing::warn!(date = %record.date, fallback = record.predicted, %cause, "substituted forecast");
    }
}
