//! Directional signals from consecutive forecasts.

use crate::domain::error::ArimaTraderError;
use crate::domain::rolling::ForecastRecord;
use chrono::NaiveDate;
use std::fmt;

/// Position taken for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Long,
    Short,
}

impl Signal {
    /// Long on a non-negative predicted return, short otherwise.
    pub fn from_predicted_return(predicted_return: f64) -> Self {
        if predicted_return >= 0.0 {
            Signal::Long
        } else {
            Signal::Short
        }
    }

    pub fn direction(&self) -> i8 {
        match self {
            Signal::Long => 1,
            Signal::Short => -1,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.direction())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRecord {
    pub forecast: ForecastRecord,
    pub predicted_return: f64,
    pub actual_return: f64,
    pub signal: Signal,
    pub strategy_return: f64,
}

/// Simple return `current / previous - 1`; undefined for a zero or
/// non-finite previous value.
fn simple_return(current: f64, previous: f64, what: &str, date: NaiveDate) -> Result<f64, ArimaTraderError> {
    let value = current / previous - 1.0;
    if previous == 0.0 || !value.is_finite() {
        return Err(ArimaTraderError::InvalidSeries {
            reason: format!("{what} return undefined at {date} ({current} from {previous})"),
        });
    }
    Ok(value)
}

/// Turns aligned forecast records into signal records. Output has one record
/// fewer than the input: the first period has no prior value to return from.
pub fn generate_signals(records: &[ForecastRecord]) -> Result<Vec<SignalRecord>, ArimaTraderError> {
    records
        .windows(2)
        .map(|pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            if cur.date <= prev.date {
                return Err(ArimaTraderError::InvalidSeries {
                    reason: format!("forecast at {} does not follow {}", cur.date, prev.date),
                });
            }
            let predicted_return = simple_return(cur.predicted, prev.predicted, "predicted", cur.date)?;
            let actual_return = simple_return(cur.actual, prev.actual, "actual", cur.date)?;
            let signal = Signal::from_predicted_return(predicted_return);
            Ok(SignalRecord {
                forecast: *cur,
                predicted_return,
                actual_return,
                signal,
                strategy_return: f64::from(signal.direction()) * actual_return,
            })
        })
        .collect()
}
