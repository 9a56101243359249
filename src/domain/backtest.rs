//! Single-instrument backtest runner.
//!
//! Replays one price series through the crossing state machine, fills at the
//! signal bar's close, marks equity on every bar and force-closes any open
//! position on the final bar for reporting.

use tracing::{debug, warn};

use super::error::RsitraderError;
use super::execution::{EntryResult, enter_long, exit_position};
use super::indicator::OscillatorSeries;
use super::indicator::rsi::calculate_rsi;
use super::metrics::Metrics;
use super::ohlcv::PriceSeries;
use super::orchestrator::BacktestTask;
use super::portfolio::Portfolio;
use super::result::BacktestResult;
use super::signal::{SignalEvent, SignalKind, generate_signals};
use super::strategy::StrategyParams;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 50_000.0;

/// Run-wide parameters shared read-only by every task.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub portfolio: Portfolio,
    pub oscillator: OscillatorSeries,
    pub signals: Vec<SignalEvent>,
}

pub fn run_backtest(
    series: &PriceSeries,
    params: &StrategyParams,
    initial_capital: f64,
) -> BacktestRun {
    let bars = series.bars();
    let oscillator = calculate_rsi(&series.closes(), params.rsi_window);
    let signals = generate_signals(bars, &oscillator, params);

    let mut portfolio = Portfolio::new(initial_capital);
    let mut pending = signals.iter().peekable();

    for (index, bar) in bars.iter().enumerate() {
        if let Some(event) = pending.next_if(|e| e.index == index) {
            match event.kind {
                SignalKind::Enter => {
                    match enter_long(&mut portfolio, bar.close, bar.timestamp, index) {
                        EntryResult::Entered { .. } => {}
                        skipped => warn!(
                            instrument = %series.instrument(),
                            index,
                            result = ?skipped,
                            "entry signal not filled"
                        ),
                    }
                }
                SignalKind::Exit => {
                    exit_position(&mut portfolio, bar.close, bar.timestamp, index, false);
                }
            }
        }
        portfolio.mark(bar.timestamp, bar.close);
    }

    if let Some(last) = bars.last() {
        exit_position(&mut portfolio, last.close, last.timestamp, bars.len() - 1, true);
    }

    BacktestRun {
        portfolio,
        oscillator,
        signals,
    }
}

/// Runs one task end to end and produces its rounded result record.
///
/// Degenerate data (too few bars, no trades) yields a result with undefined
/// fields; only malformed prices are reported as errors.
pub fn run_task(
    task: &BacktestTask,
    config: &BacktestConfig,
) -> Result<BacktestResult, RsitraderError> {
    let series = task.series.trailing_years(task.lookback_years);

    if let Some(bar) = series
        .bars()
        .iter()
        .find(|b| !b.close.is_finite() || b.close <= 0.0)
    {
        return Err(RsitraderError::Data {
            reason: format!("non-positive close {} at {}", bar.close, bar.timestamp),
        });
    }

    let run = run_backtest(&series, &task.params, config.initial_capital);
    debug!(
        instrument = %task.instrument,
        bars = series.len(),
        indicator = %run.oscillator.indicator_type,
        defined = run.oscillator.valid_count(),
        signals = run.signals.len(),
        trades = run.portfolio.closed_trades.len(),
        "backtest complete"
    );

    let metrics = Metrics::compute(&run.portfolio, &series, config.risk_free_rate);
    Ok(BacktestResult::from_metrics(
        &task.instrument,
        task.lookback_years,
        &metrics,
    ))
}
