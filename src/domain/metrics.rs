//! Strategy and benchmark performance, plus forecast accuracy.

use super::error::SharpeUndefined;
use super::rolling::ForecastRecord;
use super::signal::{Signal, SignalRecord};
use chrono::NaiveDate;

pub const DEFAULT_ANNUALIZATION_FACTOR: u32 = 252;

/// Standard deviations at or below this are treated as zero.
const ZERO_STDDEV: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub date: NaiveDate,
    pub period_return: f64,
    pub cumulative: f64,
    pub drawdown: f64,
}

/// Compounded return curve with its drawdown profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnCurve {
    pub points: Vec<CurvePoint>,
    pub total_return: f64,
    pub max_drawdown: f64,
    /// `None` with fewer than two returns.
    pub annualized_volatility: Option<f64>,
}

impl ReturnCurve {
    pub fn compute(dates: &[NaiveDate], returns: &[f64], annualization_factor: u32) -> Self {
        let cumulative = cumulative_returns(returns);
        let drawdown = drawdowns(&cumulative);
        let max_drawdown = drawdown.iter().copied().fold(0.0_f64, f64::min);
        let total_return = cumulative.last().copied().unwrap_or(1.0) - 1.0;
        let annualized_volatility = sample_stddev(returns)
            .map(|sd| sd * f64::from(annualization_factor).sqrt());

        let points = dates
            .iter()
            .zip(returns)
            .zip(cumulative.iter().zip(&drawdown))
            .map(|((&date, &period_return), (&cumulative, &drawdown))| CurvePoint {
                date,
                period_return,
                cumulative,
                drawdown,
            })
            .collect();

        ReturnCurve {
            points,
            total_return,
            max_drawdown,
            annualized_volatility,
        }
    }

    pub fn cumulative(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.cumulative).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub strategy: ReturnCurve,
    /// Buy-and-hold: always long.
    pub benchmark: ReturnCurve,
    pub sharpe_ratio: Result<f64, SharpeUndefined>,
    pub benchmark_sharpe_ratio: Result<f64, SharpeUndefined>,
    pub periods: usize,
    pub long_periods: usize,
    pub annualization_factor: u32,
}

impl PerformanceSummary {
    pub fn evaluate(signals: &[SignalRecord], annualization_factor: u32) -> Self {
        let dates: Vec<NaiveDate> = signals.iter().map(|s| s.forecast.date).collect();
        let strategy_returns: Vec<f64> = signals.iter().map(|s| s.strategy_return).collect();
        let benchmark_returns: Vec<f64> = signals.iter().map(|s| s.actual_return).collect();

        let strategy_sharpe = sharpe_ratio(&strategy_returns, annualization_factor);
        if let Err(e) = &strategy_sharpe {
            tracing::warn!(error = %e, "strategy sharpe ratio undefined");
        }

        PerformanceSummary {
            strategy: ReturnCurve::compute(&dates, &strategy_returns, annualization_factor),
            benchmark: ReturnCurve::compute(&dates, &benchmark_returns, annualization_factor),
            sharpe_ratio: strategy_sharpe,
            benchmark_sharpe_ratio: sharpe_ratio(&benchmark_returns, annualization_factor),
            periods: signals.len(),
            long_periods: signals.iter().filter(|s| s.signal == Signal::Long).count(),
            annualization_factor,
        }
    }
}

/// `cum[i] = cum[i-1] * (1 + r[i])` from a base of 1.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0_f64, |cum, r| {
            *cum *= 1.0 + r;
            Some(*cum)
        })
        .collect()
}

/// Drawdown against the running peak, which starts at 1.
pub fn drawdowns(cumulative: &[f64]) -> Vec<f64> {
    let mut peak = 1.0_f64;
    cumulative
        .iter()
        .map(|&c| {
            if c > peak {
                peak = c;
            }
            if c == peak { 0.0 } else { c / peak - 1.0 }
        })
        .collect()
}

fn sample_stddev(returns: &[f64]) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Annualized Sharpe ratio, `mean * A / (stddev * sqrt(A))`, with sample
/// standard deviation and no risk-free rate.
pub fn sharpe_ratio(returns: &[f64], annualization_factor: u32) -> Result<f64, SharpeUndefined> {
    let observations = returns.len();
    let stddev = sample_stddev(returns).ok_or_else(|| SharpeUndefined {
        observations,
        reason: "need at least two returns".into(),
    })?;
    if !stddev.is_finite() || stddev <= ZERO_STDDEV {
        return Err(SharpeUndefined {
            observations,
            reason: "zero standard deviation".into(),
        });
    }
    let a = f64::from(annualization_factor);
    let mean = returns.iter().sum::<f64>() / observations as f64;
    Ok(mean * a / (stddev * a.sqrt()))
}

/// Error statistics of the rolling one-step forecasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastAccuracy {
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error, as a fraction.
    pub mape: f64,
    /// Fraction of steps whose predicted direction (vs. the previous actual)
    /// matched the realized direction. `None` with fewer than two records.
    pub hit_rate: Option<f64>,
    pub observations: usize,
}

impl ForecastAccuracy {
    pub fn compute(records: &[ForecastRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let n = records.len() as f64;
        let errors: Vec<f64> = records.iter().map(|r| r.predicted - r.actual).collect();
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mape = records
            .iter()
            .zip(&errors)
            .map(|(r, e)| (e / r.actual).abs())
            .sum::<f64>()
            / n;

        let hit_rate = (records.len() >= 2).then(|| {
            let hits = records
                .windows(2)
                .filter(|w| {
                    let predicted_up = w[1].predicted >= w[0].actual;
                    let actual_up = w[1].actual >= w[0].actual;
                    predicted_up == actual_up
                })
                .count();
            hits as f64 / (records.len() - 1) as f64
        });

        Some(ForecastAccuracy {
            rmse,
            mae,
            mape,
            hit_rate,
            observations: records.len(),
        })
    }
}
