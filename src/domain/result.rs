//! Rounded per-task result record.

use chrono::NaiveDateTime;

use super::metrics::Metrics;

const PCT_DECIMALS: u32 = 2;
const FINE_DECIMALS: u32 = 4;

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    // Normalize -0.0 so it prints as 0.
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn round_opt(value: Option<f64>, decimals: u32) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| round_to(v, decimals))
}

/// One row of the aggregate table. `None` marks an undefined statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub instrument: String,
    pub lookback_years: u32,
    pub total_return_pct: f64,
    pub buy_hold_return_pct: f64,
    pub annualized_return_pct: Option<f64>,
    pub annualized_volatility_pct: Option<f64>,
    pub cagr_pct: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub alpha_pct: Option<f64>,
    pub beta: Option<f64>,
    pub max_drawdown_pct: f64,
    pub avg_drawdown_pct: Option<f64>,
    pub max_drawdown_duration_days: Option<f64>,
    pub avg_drawdown_duration_days: Option<f64>,
    pub exposure_time_pct: f64,
    pub equity_final: f64,
    pub equity_peak: f64,
    pub win_rate_pct: Option<f64>,
    pub trade_count: usize,
    pub best_trade_pct: Option<f64>,
    pub worst_trade_pct: Option<f64>,
    pub avg_trade_pct: Option<f64>,
    pub max_trade_duration_days: Option<f64>,
    pub avg_trade_duration_days: Option<f64>,
    pub profit_factor: Option<f64>,
    pub expectancy_pct: Option<f64>,
    pub sqn: Option<f64>,
    pub kelly_criterion: Option<f64>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub data_years: i64,
}

impl BacktestResult {
    pub fn from_metrics(instrument: &str, lookback_years: u32, m: &Metrics) -> Self {
        let pct = |v: f64| round_to(v, PCT_DECIMALS);
        let pct_opt = |v: Option<f64>| round_opt(v, PCT_DECIMALS);

        BacktestResult {
            instrument: instrument.to_string(),
            lookback_years,
            total_return_pct: pct(m.total_return_pct),
            buy_hold_return_pct: pct(m.buy_hold_return_pct),
            annualized_return_pct: pct_opt(m.annualized_return_pct),
            annualized_volatility_pct: pct_opt(m.annualized_volatility_pct),
            cagr_pct: pct_opt(m.cagr_pct),
            sharpe_ratio: pct_opt(m.sharpe_ratio),
            sortino_ratio: pct_opt(m.sortino_ratio),
            calmar_ratio: pct_opt(m.calmar_ratio),
            alpha_pct: pct_opt(m.alpha_pct),
            beta: round_opt(m.beta, FINE_DECIMALS),
            max_drawdown_pct: pct(m.max_drawdown_pct),
            avg_drawdown_pct: pct_opt(m.avg_drawdown_pct),
            max_drawdown_duration_days: pct_opt(m.max_drawdown_duration_days),
            avg_drawdown_duration_days: pct_opt(m.avg_drawdown_duration_days),
            exposure_time_pct: pct(m.exposure_time_pct),
            equity_final: pct(m.equity_final),
            equity_peak: pct(m.equity_peak),
            win_rate_pct: pct_opt(m.win_rate_pct),
            trade_count: m.trade_count,
            best_trade_pct: pct_opt(m.best_trade_pct),
            worst_trade_pct: pct_opt(m.worst_trade_pct),
            avg_trade_pct: pct_opt(m.avg_trade_pct),
            max_trade_duration_days: pct_opt(m.max_trade_duration_days),
            avg_trade_duration_days: pct_opt(m.avg_trade_duration_days),
            profit_factor: pct_opt(m.profit_factor),
            expectancy_pct: pct_opt(m.expectancy_pct),
            sqn: pct_opt(m.sqn),
            kelly_criterion: round_opt(m.kelly_criterion, FINE_DECIMALS),
            start: m.start,
            end: m.end,
            data_years: m.data_years,
        }
    }
}
