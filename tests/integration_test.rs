//! End-to-end tests of the forecasting pipeline through its ports.

mod common;

use arimatrader::adapters::csv_report_adapter::CsvReportAdapter;
use arimatrader::domain::arima::ArimaEngine;
use arimatrader::domain::config_validation::PipelineConfig;
use arimatrader::domain::error::ArimaTraderError;
use arimatrader::domain::pipeline::run_pipeline;
use arimatrader::domain::rolling::{
    CancellationToken, ConvergencePolicy, NullObserver, RollingForecaster,
};
use arimatrader::domain::series::ModelOrder;
use arimatrader::domain::signal::Signal;
use arimatrader::ports::data_port::DataPort;
use arimatrader::ports::report_port::ReportPort;
use common::*;

fn small_config() -> PipelineConfig {
    PipelineConfig {
        max_p: 2,
        max_q: 2,
        convergence_policy: ConvergencePolicy::CarryForward,
        ..PipelineConfig::default()
    }
}

mod rolling_windows {
    use super::*;

    #[test]
    fn each_fit_sees_train_plus_revealed_actuals() {
        let engine = SpyEngine::new(ArimaEngine::default());
        let train = weekly_series(&[100.0, 101.0, 99.0]);
        let all = weekly_series(&[100.0, 101.0, 99.0, 102.0, 104.0]);
        let (_, test) = all.split_at_fraction(0.6).unwrap();

        let records = RollingForecaster::new(&engine)
            .run(&train, &test, ModelOrder::new(1, 1, 0))
            .unwrap();

        let windows = engine.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], vec![100.0, 101.0, 99.0]);
        assert_eq!(windows[1], vec![100.0, 101.0, 99.0, 102.0]);
        assert_eq!(records.len(), 2);
        assert!(records[0].date < records[1].date);
        assert_eq!(records[0].actual, 102.0);
        assert_eq!(records[1].actual, 104.0);
        for record in &records {
            assert!(!record.substituted);
            assert!(record.predicted.is_finite());
        }
    }

    #[test]
    fn no_window_contains_its_target_date() {
        let values = random_walk(30, 50.0, 7);
        let series = weekly_series(&values);
        let (train, test) = series.split_at_fraction(0.7).unwrap();
        let engine = SpyEngine::new(NaiveEngine);

        let records = RollingForecaster::new(&engine)
            .run(&train, &test, ModelOrder::new(0, 1, 0))
            .unwrap();

        for (step, (window, record)) in engine.windows().iter().zip(&records).enumerate() {
            assert_eq!(window.len(), train.len() + step);
            let last_seen = if step == 0 {
                train.last_value().unwrap()
            } else {
                test.values()[step - 1]
            };
            assert_eq!(record.predicted, last_seen);
        }
    }
}

mod full_pipeline {
    use super::*;

    #[test]
    fn random_walk_runs_end_to_end() {
        let values = random_walk(60, 100.0, 42);
        let raw = weekly_raw(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>());
        let config = small_config();

        let result = run_pipeline(
            &ArimaEngine::default(),
            &raw,
            &config,
            &NullObserver,
            CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(result.prepared.train.len(), 48);
        assert_eq!(result.prepared.test.len(), 12);
        assert_eq!(result.forecasts.len(), 12);
        assert!(result.forecasts.iter().all(|r| !r.substituted));
        assert_eq!(result.signals.len(), 11);
        assert_eq!(result.summary.periods, 11);
        assert!(result.order.differencing.d <= config.max_d);
        assert_eq!(result.order.selection.order.d, result.order.differencing.d);
        assert!(result.order.selection.order.p <= 2);
        assert!(result.order.selection.order.q <= 2);
        assert!(result.summary.strategy.max_drawdown <= 0.0);
        assert!(result.summary.benchmark.max_drawdown <= 0.0);
        assert!(result.accuracy.is_some());
        for s in &result.signals {
            assert!(matches!(s.signal, Signal::Long | Signal::Short));
        }
    }

    #[test]
    fn default_config_completes_without_substitution() {
        let config = PipelineConfig::default();
        assert_eq!(config.convergence_policy, ConvergencePolicy::Abort);

        for seed in [1, 2, 6] {
            let values = random_walk(260, 100.0, seed);
            let raw = weekly_raw(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>());
            let result = run_pipeline(
                &ArimaEngine::default(),
                &raw,
                &config,
                &NullObserver,
                CancellationToken::new(),
            )
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"));

            assert_eq!(result.forecasts.len(), result.prepared.test.len());
            assert!(result.forecasts.iter().all(|r| !r.substituted));
            assert_eq!(result.signals.len(), result.forecasts.len() - 1);
        }
    }

    #[test]
    fn benchmark_matches_buy_and_hold() {
        let values = random_walk(40, 80.0, 3);
        let raw = weekly_raw(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>());
        let result = run_pipeline(
            &NaiveEngine,
            &raw,
            &small_config(),
            &NullObserver,
            CancellationToken::new(),
        )
        .unwrap();

        let test = result.prepared.test.values();
        let expected = test[test.len() - 1] / test[0] - 1.0;
        assert!((result.summary.benchmark.total_return - expected).abs() < 1e-9);
    }

    #[test]
    fn gaps_are_filled_before_modelling() {
        let mut values: Vec<Option<f64>> = random_walk(40, 80.0, 11).into_iter().map(Some).collect();
        values[5] = None;
        values[6] = None;
        let raw = weekly_raw(&values);
        let result = run_pipeline(
            &NaiveEngine,
            &raw,
            &small_config(),
            &NullObserver,
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(result.prepared.filled, 2);
        let filled = result.prepared.series.values();
        assert_eq!(filled[5], filled[4]);
        assert_eq!(filled[6], filled[4]);
    }

    #[test]
    fn leading_gap_aborts_before_forecasting() {
        let mut values: Vec<Option<f64>> = random_walk(40, 80.0, 5).into_iter().map(Some).collect();
        values[0] = None;
        let engine = SpyEngine::new(NaiveEngine);
        let err = run_pipeline(
            &engine,
            &weekly_raw(&values),
            &small_config(),
            &NullObserver,
            CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ArimaTraderError::InsufficientData { .. }));
        assert!(engine.windows().is_empty());
    }

    #[test]
    fn cancelled_run_reports_progress() {
        let values = random_walk(40, 80.0, 9);
        let raw = weekly_raw(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>());
        let token = CancellationToken::new();
        token.cancel();
        let err = run_pipeline(&NaiveEngine, &raw, &small_config(), &NullObserver, token).unwrap_err();
        assert!(matches!(err, ArimaTraderError::Cancelled { completed: 0, total: 8 }));
    }
}

mod data_and_reports {
    use super::*;

    #[test]
    fn mock_data_port_feeds_pipeline() {
        let values = random_walk(40, 80.0, 13);
        let port = MockDataPort::new()
            .with_points("SPY", weekly_raw(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>()))
            .with_error("BAD", "connection refused");

        let raw = port.fetch_prices("SPY", None, None).unwrap();
        assert_eq!(raw.len(), 40);
        assert!(port.fetch_prices("BAD", None, None).is_err());

        let result = run_pipeline(
            &NaiveEngine,
            &raw,
            &small_config(),
            &NullObserver,
            CancellationToken::new(),
        )
        .unwrap();
        let report = MockReportPort::new();
        report
            .write(&result, "SPY", std::path::Path::new("out"))
            .unwrap();
        let calls = report.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "SPY");
        assert_eq!(calls[0].2, result.forecasts.len());
    }

    #[test]
    fn csv_report_writes_three_files() {
        let values = random_walk(40, 80.0, 21);
        let raw = weekly_raw(&values.iter().map(|&v| Some(v)).collect::<Vec<_>>());
        let result = run_pipeline(
            &NaiveEngine,
            &raw,
            &small_config(),
            &NullObserver,
            CancellationToken::new(),
        )
        .unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("report");
        let written = CsvReportAdapter.write(&result, "SPY", &out).unwrap();
        assert_eq!(written.len(), 3);

        let forecasts = std::fs::read_to_string(out.join("forecasts.csv")).unwrap();
        assert_eq!(forecasts.lines().count(), result.forecasts.len() + 1);
        assert!(forecasts.starts_with("date,actual,predicted,substituted"));

        let signals = std::fs::read_to_string(out.join("signals.csv")).unwrap();
        assert_eq!(signals.lines().count(), result.signals.len() + 1);

        let summary = std::fs::read_to_string(out.join("summary.csv")).unwrap();
        assert!(summary.contains("symbol,SPY"));
        assert!(summary.contains("order,\"ARIMA(0,"));
    }
}
