//! CLI definition and dispatch.

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::tracing_observer::TracingObserver;
use crate::domain::arima::ArimaEngine;
use crate::domain::config_validation::{parse_date, validate_config, PipelineConfig};
use crate::domain::error::ArimaTraderError;
use crate::domain::pipeline::{choose_order, prepare, run_pipeline, PipelineResult};
use crate::domain::rolling::CancellationToken;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_OUTPUT_DIR: &str = "out";
const PROGRESS_EVERY: usize = 10;

#[derive(Parser, Debug)]
#[command(
    name = "arimatrader",
    about = "ARIMA walk-forward forecaster and directional strategy evaluator"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Select an order, run the rolling forecast and evaluate the strategy
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Test stationarity and select the model order on the training window
    SelectOrder {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Installs the stderr log subscriber. `RUST_LOG` applies unless `-v` is given.
pub fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Run {
            config,
            symbol,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_forecast(&config, symbol.as_deref(), output.as_deref())
            }
        }
        Command::SelectOrder { config, symbol } => run_select_order(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ArimaTraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Where to read prices from and for which symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub directory: PathBuf,
    pub symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub fn build_data_request(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
) -> Result<DataRequest, ArimaTraderError> {
    let symbol = resolve_symbol(symbol_override, config).ok_or_else(|| {
        ArimaTraderError::ConfigMissing {
            section: "data".into(),
            key: "symbol".into(),
        }
    })?;
    let directory = config
        .get_non_empty("data", "directory")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    Ok(DataRequest {
        directory,
        symbol,
        start_date: parse_date(config, "start_date")?,
        end_date: parse_date(config, "end_date")?,
    })
}

pub fn resolve_symbol(symbol_override: Option<&str>, config: &dyn ConfigPort) -> Option<String> {
    symbol_override
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| config.get_non_empty("data", "symbol"))
        .map(|s| s.to_uppercase())
}

pub fn output_directory(config: &dyn ConfigPort, output_override: Option<&Path>) -> PathBuf {
    output_override
        .map(Path::to_path_buf)
        .or_else(|| config.get_non_empty("output", "directory").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

fn run_forecast(
    config_path: &Path,
    symbol_override: Option<&str>,
    output_override: Option<&Path>,
) -> Result<(), ArimaTraderError> {
    let adapter = load_config(config_path)?;
    let config = PipelineConfig::from_config(&adapter)?;
    let request = build_data_request(&adapter, symbol_override)?;
    let output_dir = output_directory(&adapter, output_override);

    let data_port = CsvPriceAdapter::new(request.directory.clone());
    run_forecast_pipeline(&data_port, &CsvReportAdapter, &request, &config, &output_dir)?;
    Ok(())
}

/// Fetches prices, runs the full pipeline, prints the summary and writes the report.
pub fn run_forecast_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    request: &DataRequest,
    config: &PipelineConfig,
    output_dir: &Path,
) -> Result<PipelineResult, ArimaTraderError> {
    let raw = data_port.fetch_prices(&request.symbol, request.start_date, request.end_date)?;
    eprintln!("Loaded {} observations for {}", raw.len(), request.symbol);

    let engine = ArimaEngine::default();
    let observer = TracingObserver::new(PROGRESS_EVERY);
    let result = run_pipeline(&engine, &raw, config, &observer, CancellationToken::new())?;

    print_summary(&result, &request.symbol);

    let written = report_port.write(&result, &request.symbol, output_dir)?;
    eprintln!();
    for path in &written {
        eprintln!("Report written to: {}", path.display());
    }
    Ok(result)
}

fn fmt_pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

pub fn print_summary(result: &PipelineResult, symbol: &str) {
    let summary = &result.summary;
    let selection = &result.order.selection;

    eprintln!("\n=== {} ===", symbol);
    eprintln!(
        "Observations:     {} ({} filled), train {}, test {}",
        result.prepared.series.len(),
        result.prepared.filled,
        result.prepared.train.len(),
        result.prepared.test.len()
    );
    eprintln!(
        "Model:            {} ({} {:.2}, {} candidates)",
        selection.order,
        selection.criterion.to_uppercase(),
        selection.score,
        selection.evaluated.len()
    );
    if !result.order.differencing.stationary {
        eprintln!("                  warning: unit root not rejected at max_d");
    }
    let substituted = result.forecasts.iter().filter(|r| r.substituted).count();
    if substituted > 0 {
        eprintln!("Substituted:      {} forecasts", substituted);
    }

    eprintln!("\n=== Strategy vs Buy-and-Hold ===");
    eprintln!(
        "Total Return:     {:>10}  {:>10}",
        fmt_pct(summary.strategy.total_return),
        fmt_pct(summary.benchmark.total_return)
    );
    eprintln!(
        "Max Drawdown:     {:>10}  {:>10}",
        fmt_pct(summary.strategy.max_drawdown),
        fmt_pct(summary.benchmark.max_drawdown)
    );
    let sharpe = |s: &Result<f64, _>| match s {
        Ok(v) => format!("{:.2}", v),
        Err(_) => "undefined".to_string(),
    };
    eprintln!(
        "Sharpe Ratio:     {:>10}  {:>10}",
        sharpe(&summary.sharpe_ratio),
        sharpe(&summary.benchmark_sharpe_ratio)
    );
    if let Err(e) = &summary.sharpe_ratio {
        eprintln!("                  {}", e);
    }
    eprintln!(
        "Long Periods:     {} of {}",
        summary.long_periods, summary.periods
    );

    if let Some(acc) = &result.accuracy {
        eprintln!("\n=== Forecast Accuracy ===");
        eprintln!("RMSE:             {:.4}", acc.rmse);
        eprintln!("MAE:              {:.4}", acc.mae);
        eprintln!("MAPE:             {}", fmt_pct(acc.mape));
        if let Some(hit) = acc.hit_rate {
            eprintln!("Hit Rate:         {}", fmt_pct(hit));
        }
    }
}

pub fn run_dry_run(config_path: &Path) -> Result<(), ArimaTraderError> {
    let adapter = load_config(config_path)?;
    let config = PipelineConfig::from_config(&adapter)?;
    let request = build_data_request(&adapter, None)?;
    eprintln!("Config validated successfully");

    eprintln!("\nData:");
    eprintln!("  symbol:    {}", request.symbol);
    eprintln!("  file:      {}", request.directory.join(format!("{}.csv", request.symbol)).display());
    eprintln!("  frequency: {}", config.frequency);
    eprintln!("\nModel search:");
    eprintln!("  max order: ({}, {}, {})", config.max_p, config.max_d, config.max_q);
    eprintln!("  criterion: {}", config.criterion);
    eprintln!("  search:    {:?}, parallel {}", config.search, config.parallel);
    eprintln!("  on convergence failure: {:?}", config.convergence_policy);

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_select_order(config_path: &Path, symbol_override: Option<&str>) -> Result<(), ArimaTraderError> {
    let adapter = load_config(config_path)?;
    let config = PipelineConfig::from_config(&adapter)?;
    let request = build_data_request(&adapter, symbol_override)?;
    let data_port = CsvPriceAdapter::new(request.directory.clone());

    let raw = data_port.fetch_prices(&request.symbol, request.start_date, request.end_date)?;
    let prepared = prepare(&raw, &config)?;
    let choice = choose_order(&ArimaEngine::default(), &prepared.train, &config)?;

    for (d, test) in choice.differencing.tests.iter().enumerate() {
        eprintln!(
            "ADF d={}: statistic {:.3}, p-value {:.3}, lags {}",
            d, test.statistic, test.p_value, test.lags
        );
    }
    for candidate in &choice.selection.evaluated {
        match candidate.score {
            Some(score) => println!("{}\t{:.3}", candidate.order, score),
            None => println!("{}\tfailed", candidate.order),
        }
    }
    eprintln!(
        "Selected {} by {} ({:.3})",
        choice.selection.order, choice.selection.criterion, choice.selection.score
    );
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ArimaTraderError> {
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;
    build_data_request(&adapter, None)?;
    eprintln!("Configuration is valid.");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), ArimaTraderError> {
    let adapter = load_config(config_path)?;
    let directory = adapter
        .get_non_empty("data", "directory")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let symbols = CsvPriceAdapter::new(directory.clone()).list_symbols()?;

    if symbols.is_empty() {
        eprintln!("No symbols found in {}", directory.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}
