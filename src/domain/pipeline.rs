//! End-to-end run: raw prices to performance summary.
//!
//! Stages run strictly in order and any error before the rolling forecast
//! aborts the run. An undefined Sharpe ratio is carried in the summary rather
//! than failing the run.

use crate::domain::config_validation::PipelineConfig;
use crate::domain::engine::ForecastEngine;
use crate::domain::error::ArimaTraderError;
use crate::domain::metrics::{ForecastAccuracy, PerformanceSummary};
use crate::domain::order_selection::{OrderSelector, SearchSpace, Selection};
use crate::domain::resample::resample;
use crate::domain::rolling::{CancellationToken, ForecastRecord, ProgressObserver, RollingForecaster};
use crate::domain::series::{sanitize, PriceSeries, RawPoint};
use crate::domain::signal::{generate_signals, SignalRecord};
use crate::domain::stationarity::{DifferencingDecision, StationarityTester};

/// Cleaned series split into training and test periods.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub series: PriceSeries,
    pub filled: usize,
    pub train: PriceSeries,
    pub test: PriceSeries,
}

/// Resamples, forward-fills and splits the raw observations.
pub fn prepare(raw: &[RawPoint], config: &PipelineConfig) -> Result<PreparedSeries, ArimaTraderError> {
    let resampled = resample(raw, config.frequency);
    let sanitized = sanitize(&resampled)?;
    if let Some(bad) = sanitized.series.points().iter().find(|p| p.value <= 0.0) {
        return Err(ArimaTraderError::InvalidSeries {
            reason: format!("non-positive price {} at {}", bad.value, bad.date),
        });
    }
    let (train, test) = sanitized.series.split_at_fraction(config.train_fraction)?;
    tracing::info!(
        frequency = %config.frequency,
        observations = sanitized.series.len(),
        filled = sanitized.filled,
        train = train.len(),
        test = test.len(),
        "prepared price series"
    );
    Ok(PreparedSeries {
        series: sanitized.series,
        filled: sanitized.filled,
        train,
        test,
    })
}

/// Differencing degree and model order chosen on the training window.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderChoice {
    pub differencing: DifferencingDecision,
    pub selection: Selection,
}

pub fn choose_order<E>(
    engine: &E,
    train: &PriceSeries,
    config: &PipelineConfig,
) -> Result<OrderChoice, ArimaTraderError>
where
    E: ForecastEngine + Sync,
{
    let tester = StationarityTester::new(config.differencing_significance, config.max_d);
    // A constant or perfectly trending window makes the unit-root regression
    // singular; no order can be chosen for it.
    let differencing = tester
        .choose_differencing(&train.values())
        .map_err(|e| match e {
            ArimaTraderError::Degenerate { reason, .. } => ArimaTraderError::ModelSelection {
                window_end: train.last_date(),
                window_len: train.len(),
                reason: format!("unit-root regression on training window: {reason}"),
            },
            other => other,
        })?;
    tracing::info!(
        d = differencing.d,
        stationary = differencing.stationary,
        "differencing degree chosen"
    );

    let space = SearchSpace::new(config.max_p, config.max_q, vec![differencing.d]);
    let selection = OrderSelector::new(engine, &config.criterion, space)
        .with_strategy(config.search)
        .with_parallel(config.parallel)
        .select(train)?;

    Ok(OrderChoice {
        differencing,
        selection,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub prepared: PreparedSeries,
    pub order: OrderChoice,
    pub forecasts: Vec<ForecastRecord>,
    pub signals: Vec<SignalRecord>,
    pub summary: PerformanceSummary,
    pub accuracy: Option<ForecastAccuracy>,
}

pub fn run_pipeline<E>(
    engine: &E,
    raw: &[RawPoint],
    config: &PipelineConfig,
    observer: &dyn ProgressObserver,
    cancel: CancellationToken,
) -> Result<PipelineResult, ArimaTraderError>
where
    E: ForecastEngine + Sync,
{
    let prepared = prepare(raw, config)?;
    let order = choose_order(engine, &prepared.train, config)?;

    let forecasts = RollingForecaster::new(engine)
        .with_policy(config.convergence_policy)
        .with_observer(observer)
        .with_cancellation(cancel)
        .run(&prepared.train, &prepared.test, order.selection.order)?;

    let signals = generate_signals(&forecasts)?;
    let summary = PerformanceSummary::evaluate(&signals, config.annualization_factor);
    let accuracy = ForecastAccuracy::compute(&forecasts);

    Ok(PipelineResult {
        prepared,
        order,
        forecasts,
        signals,
        summary,
        accuracy,
    })
}
