//! CSV report writer: `forecasts.csv`, `signals.csv` and `summary.csv`.

use crate::domain::error::ArimaTraderError;
use crate::domain::pipeline::PipelineResult;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvReportAdapter;

fn fmt_f64(value: f64) -> String {
    format!("{:.6}", value)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(fmt_f64).unwrap_or_default()
}

impl CsvReportAdapter {
    fn write_forecasts(result: &PipelineResult, path: &Path) -> Result<(), ArimaTraderError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["date", "actual", "predicted", "substituted"])?;
        for r in &result.forecasts {
            wtr.write_record([
                r.date.to_string(),
                fmt_f64(r.actual),
                fmt_f64(r.predicted),
                r.substituted.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_signals(result: &PipelineResult, path: &Path) -> Result<(), ArimaTraderError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record([
            "date",
            "actual",
            "predicted",
            "predicted_return",
            "actual_return",
            "signal",
            "strategy_return",
            "strategy_cumulative",
            "strategy_drawdown",
            "benchmark_cumulative",
            "benchmark_drawdown",
        ])?;
        let curves = result
            .summary
            .strategy
            .points
            .iter()
            .zip(&result.summary.benchmark.points);
        for (s, (strategy, benchmark)) in result.signals.iter().zip(curves) {
            wtr.write_record([
                s.forecast.date.to_string(),
                fmt_f64(s.forecast.actual),
                fmt_f64(s.forecast.predicted),
                fmt_f64(s.predicted_return),
                fmt_f64(s.actual_return),
                s.signal.direction().to_string(),
                fmt_f64(s.strategy_return),
                fmt_f64(strategy.cumulative),
                fmt_f64(strategy.drawdown),
                fmt_f64(benchmark.cumulative),
                fmt_f64(benchmark.drawdown),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_summary(
        result: &PipelineResult,
        symbol: &str,
        path: &Path,
    ) -> Result<(), ArimaTraderError> {
        let summary = &result.summary;
        let selection = &result.order.selection;
        let mut rows: Vec<(&str, String)> = vec![
            ("symbol", symbol.to_string()),
            ("observations", result.prepared.series.len().to_string()),
            ("filled", result.prepared.filled.to_string()),
            ("train", result.prepared.train.len().to_string()),
            ("test", result.prepared.test.len().to_string()),
            ("differencing_stationary", result.order.differencing.stationary.to_string()),
            ("order", selection.order.to_string()),
            ("criterion", selection.criterion.to_string()),
            ("criterion_value", fmt_f64(selection.score)),
            ("candidates", selection.evaluated.len().to_string()),
            (
                "substituted",
                result.forecasts.iter().filter(|r| r.substituted).count().to_string(),
            ),
            ("periods", summary.periods.to_string()),
            ("long_periods", summary.long_periods.to_string()),
            ("strategy_total_return", fmt_f64(summary.strategy.total_return)),
            ("strategy_max_drawdown", fmt_f64(summary.strategy.max_drawdown)),
            ("strategy_volatility", fmt_opt(summary.strategy.annualized_volatility)),
            ("strategy_sharpe", fmt_opt(summary.sharpe_ratio.clone().ok())),
            ("benchmark_total_return", fmt_f64(summary.benchmark.total_return)),
            ("benchmark_max_drawdown", fmt_f64(summary.benchmark.max_drawdown)),
            ("benchmark_volatility", fmt_opt(summary.benchmark.annualized_volatility)),
            ("benchmark_sharpe", fmt_opt(summary.benchmark_sharpe_ratio.clone().ok())),
            ("annualization_factor", summary.annualization_factor.to_string()),
        ];
        if let Some(acc) = &result.accuracy {
            rows.push(("rmse", fmt_f64(acc.rmse)));
            rows.push(("mae", fmt_f64(acc.mae)));
            rows.push(("mape", fmt_f64(acc.mape)));
            rows.push(("hit_rate", fmt_opt(acc.hit_rate)));
        }

        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["metric", "value"])?;
        for (metric, value) in rows {
            wtr.write_record([metric, value.as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &PipelineResult,
        symbol: &str,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ArimaTraderError> {
        fs::create_dir_all(output_dir)?;

        let forecasts = output_dir.join("forecasts.csv");
        let signals = output_dir.join("signals.csv");
        let summary = output_dir.join("summary.csv");

        Self::write_forecasts(result, &forecasts)?;
        Self::write_signals(result, &signals)?;
        Self::write_summary(result, symbol, &summary)?;

        tracing::info!(dir = %output_dir.display(), "report written");
        Ok(vec![forecasts, signals, summary])
    }
}
