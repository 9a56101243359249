//! Aggregate CSV result sink.
//!
//! One row per completed task, in the order given. Undefined statistics are
//! written as empty cells.

use std::path::Path;

use serde::Serialize;

use crate::domain::error::RsitraderError;
use crate::domain::result::BacktestResult;
use crate::ports::report_port::ReportPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const HEADERS: [&str; 33] = [
    "Ticker",
    "Lookback (years)",
    "Return [%]",
    "Buy & Hold Return [%]",
    "Return (Ann.) [%]",
    "Volatility (Ann.) [%]",
    "CAGR [%]",
    "Sharpe Ratio",
    "Sortino Ratio",
    "Calmar Ratio",
    "Alpha [%]",
    "Beta",
    "Max Drawdown [%]",
    "Avg Drawdown [%]",
    "Max Drawdown Duration (days)",
    "Avg Drawdown Duration (days)",
    "Exposure Time [%]",
    "Equity Final [$]",
    "Equity Peak [$]",
    "Win Rate [%]",
    "# Trades",
    "Best Trade [%]",
    "Worst Trade [%]",
    "Avg Trade [%]",
    "Max Trade Duration (days)",
    "Avg Trade Duration (days)",
    "Profit Factor",
    "Expectancy [%]",
    "SQN",
    "Kelly Criterion",
    "Start Date",
    "End Date",
    "Duration (Years of data)",
];

/// Field order must match [`HEADERS`].
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    ticker: &'a str,
    lookback_years: u32,
    total_return_pct: f64,
    buy_hold_return_pct: f64,
    annualized_return_pct: Option<f64>,
    annualized_volatility_pct: Option<f64>,
    cagr_pct: Option<f64>,
    sharpe_ratio: Option<f64>,
    sortino_ratio: Option<f64>,
    calmar_ratio: Option<f64>,
    alpha_pct: Option<f64>,
    beta: Option<f64>,
    max_drawdown_pct: f64,
    avg_drawdown_pct: Option<f64>,
    max_drawdown_duration_days: Option<f64>,
    avg_drawdown_duration_days: Option<f64>,
    exposure_time_pct: f64,
    equity_final: f64,
    equity_peak: f64,
    win_rate_pct: Option<f64>,
    trade_count: usize,
    best_trade_pct: Option<f64>,
    worst_trade_pct: Option<f64>,
    avg_trade_pct: Option<f64>,
    max_trade_duration_days: Option<f64>,
    avg_trade_duration_days: Option<f64>,
    profit_factor: Option<f64>,
    expectancy_pct: Option<f64>,
    sqn: Option<f64>,
    kelly_criterion: Option<f64>,
    start: String,
    end: String,
    data_years: i64,
}

impl<'a> From<&'a BacktestResult> for ResultRow<'a> {
    fn from(r: &'a BacktestResult) -> Self {
        ResultRow {
            ticker: &r.instrument,
            lookback_years: r.lookback_years,
            total_return_pct: r.total_return_pct,
            buy_hold_return_pct: r.buy_hold_return_pct,
            annualized_return_pct: r.annualized_return_pct,
            annualized_volatility_pct: r.annualized_volatility_pct,
            cagr_pct: r.cagr_pct,
            sharpe_ratio: r.sharpe_ratio,
            sortino_ratio: r.sortino_ratio,
            calmar_ratio: r.calmar_ratio,
            alpha_pct: r.alpha_pct,
            beta: r.beta,
            max_drawdown_pct: r.max_drawdown_pct,
            avg_drawdown_pct: r.avg_drawdown_pct,
            max_drawdown_duration_days: r.max_drawdown_duration_days,
            avg_drawdown_duration_days: r.avg_drawdown_duration_days,
            exposure_time_pct: r.exposure_time_pct,
            equity_final: r.equity_final,
            equity_peak: r.equity_peak,
            win_rate_pct: r.win_rate_pct,
            trade_count: r.trade_count,
            best_trade_pct: r.best_trade_pct,
            worst_trade_pct: r.worst_trade_pct,
            avg_trade_pct: r.avg_trade_pct,
            max_trade_duration_days: r.max_trade_duration_days,
            avg_trade_duration_days: r.avg_trade_duration_days,
            profit_factor: r.profit_factor,
            expectancy_pct: r.expectancy_pct,
            sqn: r.sqn,
            kelly_criterion: r.kelly_criterion,
            start: r.start.format(TIMESTAMP_FORMAT).to_string(),
            end: r.end.format(TIMESTAMP_FORMAT).to_string(),
            data_years: r.data_years,
        }
    }
}

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    /// Writes the table to any writer; the header row is always present.
    pub fn write_to<W: std::io::Write>(
        &self,
        results: &[BacktestResult],
        writer: W,
    ) -> Result<(), RsitraderError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        wtr.write_record(HEADERS).map_err(csv_error)?;
        for result in results {
            wtr.serialize(ResultRow::from(result)).map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> RsitraderError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => RsitraderError::Io(io),
        other => RsitraderError::Data {
            reason: format!("failed to serialize result row: {other:?}"),
        },
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, results: &[BacktestResult], output_path: &Path) -> Result<(), RsitraderError> {
        let file = std::fs::File::create(output_path)?;
        self.write_to(results, file)
    }
}
