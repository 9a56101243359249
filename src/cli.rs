//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_task, BacktestConfig, DEFAULT_INITIAL_CAPITAL};
use crate::domain::config_validation::{
    parse_lookback_years, validate_backtest_config, validate_strategy_config,
    DEFAULT_LOOKBACK_YEARS,
};
use crate::domain::error::RsitraderError;
use crate::domain::indicator::rsi::DEFAULT_RSI_WINDOW;
use crate::domain::orchestrator::{BacktestTask, BatchReport, Orchestrator, DEFAULT_WORKERS};
use crate::domain::strategy::{StrategyParams, DEFAULT_LOWER_BOUND, DEFAULT_UPPER_BOUND};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT: &str = "backtest_results.csv";

#[derive(Parser, Debug)]
#[command(name = "rsitrader", about = "Batch RSI oscillator backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest every instrument in the data directory
    Backtest {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated lookback windows, e.g. "10,5,1"
        #[arg(short, long)]
        years: Option<String>,
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List instruments found in the data directory
    ListInstruments {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub years: Option<String>,
    pub workers: Option<usize>,
}

/// Fully resolved, validated settings for one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub data_dir: PathBuf,
    pub output: PathBuf,
    pub lookback_years: Vec<u32>,
    pub workers: usize,
    pub backtest: BacktestConfig,
    pub params: StrategyParams,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
            years,
            workers,
        } => run_backtest(
            config.as_ref(),
            Overrides {
                data_dir,
                output,
                years,
                workers,
            },
        ),
        Command::Validate { config } => run_validate(&config),
        Command::ListInstruments { data_dir, config } => {
            run_list_instruments(data_dir, config.as_ref())
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RsitraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| RsitraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn load_optional_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, RsitraderError> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            load_config(p)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

fn fail(err: &RsitraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.0),
    }
}

pub fn build_strategy_params(config: &dyn ConfigPort) -> StrategyParams {
    StrategyParams {
        rsi_window: config.get_int("strategy", "rsi_window", DEFAULT_RSI_WINDOW as i64) as usize,
        lower_bound: config.get_double("strategy", "lower_bound", DEFAULT_LOWER_BOUND),
        upper_bound: config.get_double("strategy", "upper_bound", DEFAULT_UPPER_BOUND),
    }
}

/// Validates the config, then layers command-line overrides on top.
pub fn build_settings(
    config: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<RunSettings, RsitraderError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;

    let data_dir = overrides.data_dir.clone().unwrap_or_else(|| {
        PathBuf::from(
            config
                .get_string("backtest", "data_dir")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        )
    });
    let output = overrides.output.clone().unwrap_or_else(|| {
        PathBuf::from(
            config
                .get_string("backtest", "output")
                .unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
        )
    });

    let years = match &overrides.years {
        Some(y) => y.clone(),
        None => config
            .get_string("backtest", "lookback_years")
            .unwrap_or_else(|| DEFAULT_LOOKBACK_YEARS.to_string()),
    };
    let lookback_years = parse_lookback_years(&years)?;

    let workers = match overrides.workers {
        Some(w) => w,
        None => config.get_int("backtest", "workers", DEFAULT_WORKERS as i64) as usize,
    };
    let workers = Orchestrator::new(workers)?.workers();

    let params = build_strategy_params(config);
    params.validate()?;

    Ok(RunSettings {
        data_dir,
        output,
        lookback_years,
        workers,
        backtest: build_backtest_config(config),
        params,
    })
}

/// One task per loadable instrument per lookback window.
///
/// Instruments whose data cannot be loaded are skipped with a warning.
pub fn build_tasks(
    data_port: &dyn DataPort,
    settings: &RunSettings,
) -> Result<Vec<BacktestTask>, RsitraderError> {
    let instruments = data_port.list_instruments()?;
    let mut tasks = Vec::with_capacity(instruments.len() * settings.lookback_years.len());

    for instrument in instruments {
        let series = match data_port.fetch_series(&instrument) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                warn!(%instrument, error = %e, "skipping instrument");
                continue;
            }
        };
        for &years in &settings.lookback_years {
            tasks.push(BacktestTask::new(
                instrument.clone(),
                Arc::clone(&series),
                years,
                settings.params,
            ));
        }
    }
    Ok(tasks)
}

/// Loads tasks, runs them on the worker pool and writes the aggregate table.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    settings: &RunSettings,
) -> Result<BatchReport, RsitraderError> {
    let tasks = build_tasks(data_port, settings)?;
    if tasks.is_empty() {
        warn!(data_dir = %settings.data_dir.display(), "no instruments to backtest");
    }

    let orchestrator = Orchestrator::new(settings.workers)?;
    let batch = orchestrator.run(&tasks, |task| run_task(task, &settings.backtest))?;

    report_port.write(&batch.results, &settings.output)?;
    info!(
        rows = batch.results.len(),
        output = %settings.output.display(),
        "results written"
    );
    Ok(batch)
}

fn run_backtest(config_path: Option<&PathBuf>, overrides: Overrides) -> ExitCode {
    let started = Instant::now();

    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    let settings = match build_settings(&adapter, &overrides) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Backtesting {} with RSI({}) {}/{}, lookback {:?} years, {} workers",
        settings.data_dir.display(),
        settings.params.rsi_window,
        settings.params.lower_bound,
        settings.params.upper_bound,
        settings.lookback_years,
        settings.workers,
    );

    let data_port = CsvAdapter::new(settings.data_dir.clone());
    let batch = match run_backtest_pipeline(&data_port, &CsvReportAdapter::new(), &settings) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };

    eprintln!("\n=== Batch Results ===");
    eprintln!("Completed:        {}", batch.results.len());
    eprintln!("Failed:           {}", batch.failures.len());
    for failure in &batch.failures {
        eprintln!(
            "  {} ({}y): {}",
            failure.instrument, failure.lookback_years, failure.error
        );
    }
    eprintln!("Results written to: {}", settings.output.display());
    println!("Time Taken: {:.2} s", started.elapsed().as_secs_f64());

    if batch.results.is_empty() && !batch.failures.is_empty() {
        return ExitCode::from(5);
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    match build_settings(&adapter, &Overrides::default()) {
        Ok(settings) => {
            eprintln!("Configuration is valid");
            eprintln!("  data_dir:        {}", settings.data_dir.display());
            eprintln!("  output:          {}", settings.output.display());
            eprintln!("  lookback_years:  {:?}", settings.lookback_years);
            eprintln!("  workers:         {}", settings.workers);
            eprintln!("  initial_capital: {}", settings.backtest.initial_capital);
            eprintln!("  risk_free_rate:  {}", settings.backtest.risk_free_rate);
            eprintln!(
                "  strategy:        RSI({}) enter below {}, exit above {}",
                settings.params.rsi_window,
                settings.params.lower_bound,
                settings.params.upper_bound
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_list_instruments(data_dir: Option<PathBuf>, config_path: Option<&PathBuf>) -> ExitCode {
    let data_dir = match data_dir {
        Some(d) => d,
        None => match load_optional_config(config_path) {
            Ok(adapter) => PathBuf::from(
                adapter
                    .get_string("backtest", "data_dir")
                    .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            Err(e) => return fail(&e),
        },
    };

    match CsvAdapter::new(data_dir).list_instruments() {
        Ok(instruments) => {
            for instrument in &instruments {
                println!("{instrument}");
            }
            eprintln!("{} instruments", instruments.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
