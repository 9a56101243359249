//! Performance metrics and statistics.
//!
//! Everything here is full precision; rounding happens when the
//! [`BacktestResult`](super::result::BacktestResult) record is built.
//! Ratios whose denominator is zero or whose inputs are missing come back as
//! `None` instead of NaN/inf.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Weekday};

use super::ohlcv::PriceSeries;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::ClosedTrade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;
const DAYS_PER_YEAR: f64 = 365.25;
const WEEKEND_SHARE_THRESHOLD: f64 = 0.6 * 2.0 / 7.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub data_years: i64,
    pub exposure_time_pct: f64,
    pub equity_final: f64,
    pub equity_peak: f64,
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
    pub trade_count: usize,
    pub win_rate_pct: Option<f64>,
    pub best_trade_pct: Option<f64>,
    pub worst_trade_pct: Option<f64>,
    pub avg_trade_pct: Option<f64>,
    pub max_trade_duration_days: Option<f64>,
    pub avg_trade_duration_days: Option<f64>,
    pub profit_factor: Option<f64>,
    pub expectancy_pct: Option<f64>,
    pub sqn: Option<f64>,
    pub kelly_criterion: Option<f64>,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, series: &PriceSeries, risk_free_rate: f64) -> Self {
        let curve = &portfolio.equity_curve;
        let initial_capital = portfolio.initial_capital;
        let start = series.first_timestamp();
        let end = series.last_timestamp();
        let closes = series.closes();

        let equities: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        let equity_final = equities.last().copied().unwrap_or(initial_capital);
        let equity_peak = equities.iter().copied().fold(initial_capital, f64::max);

        let total_return_pct = if initial_capital > 0.0 {
            (equity_final - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };
        let buy_hold_return_pct = (closes[closes.len() - 1] - closes[0]) / closes[0] * 100.0;

        let exposure_time_pct = if curve.is_empty() {
            0.0
        } else {
            curve.iter().filter(|p| p.in_market).count() as f64 / curve.len() as f64 * 100.0
        };

        let daily = daily_equity(curve);
        let annual_days = annual_trading_days(&daily);
        let day_returns = pct_changes(&daily.iter().map(|(_, e)| *e).collect::<Vec<_>>());
        let (annualized_return, annualized_volatility) =
            annualize(&day_returns, annual_days);

        let cagr = compute_cagr(initial_capital, equity_final, end - start);

        let sharpe_ratio = match (annualized_return, annualized_volatility) {
            (Some(ret), Some(vol)) if vol > 0.0 => Some((ret - risk_free_rate) / vol),
            _ => None,
        };
        let sortino_ratio = annualized_return.and_then(|ret| {
            let downside = downside_deviation(&day_returns)? * annual_days.sqrt();
            (downside > 0.0).then(|| (ret - risk_free_rate) / downside)
        });

        let drawdowns = compute_drawdowns(curve);
        let calmar_ratio = annualized_return
            .filter(|_| drawdowns.max > 0.0)
            .map(|ret| ret / drawdowns.max);

        let beta = compute_beta(&equities, &closes);
        let alpha_pct = beta.map(|b| {
            total_return_pct - risk_free_rate * 100.0
                - b * (buy_hold_return_pct - risk_free_rate * 100.0)
        });

        let trades = TradeStats::compute(&portfolio.closed_trades);

        Metrics {
            start,
            end,
            data_years: ((end - start).num_days() as f64 / CALENDAR_DAYS_PER_YEAR).round() as i64,
            exposure_time_pct,
            equity_final,
            equity_peak,
            total_return_pct,
            buy_hold_return_pct,
            annualized_return_pct: annualized_return.map(|r| r * 100.0),
            annualized_volatility_pct: annualized_volatility.map(|v| v * 100.0),
            cagr_pct: cagr.map(|c| c * 100.0),
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            alpha_pct,
            beta,
            max_drawdown_pct: -drawdowns.max * 100.0,
            avg_drawdown_pct: mean(&drawdowns.depths()).map(|d| -d * 100.0),
            max_drawdown_duration_days: drawdowns
                .durations()
                .into_iter()
                .reduce(f64::max),
            avg_drawdown_duration_days: mean(&drawdowns.durations()),
            trade_count: trades.count,
            win_rate_pct: trades.win_rate.map(|w| w * 100.0),
            best_trade_pct: trades.best.map(|r| r * 100.0),
            worst_trade_pct: trades.worst.map(|r| r * 100.0),
            avg_trade_pct: trades.geometric_avg.map(|r| r * 100.0),
            max_trade_duration_days: trades.max_duration_days,
            avg_trade_duration_days: trades.avg_duration_days,
            profit_factor: trades.profit_factor,
            expectancy_pct: trades.expectancy.map(|r| r * 100.0),
            sqn: trades.sqn,
            kelly_criterion: trades.kelly,
        }
    }
}

fn days(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 / SECONDS_PER_DAY
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample variance (n - 1 denominator).
fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

fn geometric_mean_return(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() || returns.iter().any(|r| 1.0 + r <= 0.0) {
        return None;
    }
    let log_sum: f64 = returns.iter().map(|r| (1.0 + r).ln()).sum();
    Some((log_sum / returns.len() as f64).exp() - 1.0)
}

fn pct_changes(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Last equity of each calendar day.
fn daily_equity(curve: &[EquityPoint]) -> Vec<(NaiveDate, f64)> {
    let mut daily: Vec<(NaiveDate, f64)> = Vec::new();
    for point in curve {
        let day = point.timestamp.date();
        match daily.last_mut() {
            Some((last_day, equity)) if *last_day == day => *equity = point.equity,
            _ => daily.push((day, point.equity)),
        }
    }
    daily
}

/// 365 when weekend days make up a meaningful share of the samples
/// (more than 60% of the 2/7 a full calendar would have), otherwise 252.
fn annual_trading_days(daily: &[(NaiveDate, f64)]) -> f64 {
    if daily.is_empty() {
        return TRADING_DAYS_PER_YEAR;
    }
    let weekend = daily
        .iter()
        .filter(|(d, _)| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count();
    if weekend as f64 / daily.len() as f64 > WEEKEND_SHARE_THRESHOLD {
        CALENDAR_DAYS_PER_YEAR
    } else {
        TRADING_DAYS_PER_YEAR
    }
}

/// Annualized geometric return and volatility from daily returns.
fn annualize(day_returns: &[f64], annual_days: f64) -> (Option<f64>, Option<f64>) {
    let Some(gmean) = geometric_mean_return(day_returns) else {
        return (None, None);
    };
    let growth = 1.0 + gmean;
    let annual_return = growth.powf(annual_days) - 1.0;

    let growth_sq = growth * growth;
    let annual_volatility = sample_variance(day_returns).and_then(|var| {
        let spread = (var + growth_sq).powf(annual_days) - growth_sq.powf(annual_days);
        let v = spread.max(0.0).sqrt();
        v.is_finite().then_some(v)
    });

    (Some(annual_return), annual_volatility)
}

fn downside_deviation(day_returns: &[f64]) -> Option<f64> {
    let squares: Vec<f64> = day_returns.iter().map(|r| r.min(0.0).powi(2)).collect();
    mean(&squares).map(f64::sqrt)
}

fn compute_cagr(initial_capital: f64, final_equity: f64, elapsed: TimeDelta) -> Option<f64> {
    let years = days(elapsed) / DAYS_PER_YEAR;
    if years <= 0.0 || initial_capital <= 0.0 || final_equity <= 0.0 {
        return None;
    }
    Some((final_equity / initial_capital).powf(1.0 / years) - 1.0)
}

/// Beta of equity log returns against close log returns.
fn compute_beta(equities: &[f64], closes: &[f64]) -> Option<f64> {
    let log_returns = |values: &[f64]| -> Vec<f64> {
        values.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
    };
    let equity_lr = log_returns(equities);
    let market_lr = log_returns(closes);
    if equity_lr.len() != market_lr.len() || equity_lr.len() < 2 {
        return None;
    }

    let market_var = sample_variance(&market_lr)?;
    if market_var == 0.0 || !market_var.is_finite() {
        return None;
    }
    let eq_mean = mean(&equity_lr)?;
    let mk_mean = mean(&market_lr)?;
    let cov = equity_lr
        .iter()
        .zip(&market_lr)
        .map(|(e, m)| (e - eq_mean) * (m - mk_mean))
        .sum::<f64>()
        / (equity_lr.len() - 1) as f64;

    let beta = cov / market_var;
    beta.is_finite().then_some(beta)
}

#[derive(Debug, Default)]
struct Drawdowns {
    max: f64,
    /// (depth, duration in days) per peak-to-recovery period.
    periods: Vec<(f64, f64)>,
}

impl Drawdowns {
    fn depths(&self) -> Vec<f64> {
        self.periods.iter().map(|(d, _)| *d).collect()
    }

    fn durations(&self) -> Vec<f64> {
        self.periods.iter().map(|(_, d)| *d).collect()
    }
}

fn compute_drawdowns(curve: &[EquityPoint]) -> Drawdowns {
    let Some(first) = curve.first() else {
        return Drawdowns::default();
    };

    let mut result = Drawdowns::default();
    let mut peak = first.equity;
    let mut peak_time = first.timestamp;
    let mut depth: Option<f64> = None;

    for point in curve {
        if point.equity >= peak {
            if let Some(d) = depth.take() {
                result.periods.push((d, days(point.timestamp - peak_time)));
            }
            peak = point.equity;
            peak_time = point.timestamp;
        } else if peak > 0.0 {
            let dd = 1.0 - point.equity / peak;
            result.max = result.max.max(dd);
            depth = Some(depth.map_or(dd, |d| d.max(dd)));
        }
    }

    if let (Some(d), Some(last)) = (depth, curve.last()) {
        result.periods.push((d, days(last.timestamp - peak_time)));
    }

    result
}

#[derive(Debug, Default)]
struct TradeStats {
    count: usize,
    win_rate: Option<f64>,
    best: Option<f64>,
    worst: Option<f64>,
    geometric_avg: Option<f64>,
    max_duration_days: Option<f64>,
    avg_duration_days: Option<f64>,
    profit_factor: Option<f64>,
    expectancy: Option<f64>,
    sqn: Option<f64>,
    kelly: Option<f64>,
}

impl TradeStats {
    fn compute(trades: &[ClosedTrade]) -> Self {
        let count = trades.len();
        if count == 0 {
            return TradeStats::default();
        }

        let returns: Vec<f64> = trades.iter().map(ClosedTrade::return_ratio).collect();
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let durations: Vec<f64> = trades.iter().map(|t| days(t.duration())).collect();

        let wins = returns.iter().filter(|&&r| r > 0.0).count();
        let win_rate = wins as f64 / count as f64;

        let gross_gain: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
        let gross_loss: f64 = returns.iter().filter(|&&r| r < 0.0).sum::<f64>().abs();
        let profit_factor = (gross_loss > 0.0).then(|| gross_gain / gross_loss);

        let sqn = sample_variance(&pnls)
            .map(f64::sqrt)
            .filter(|&sd| sd > 0.0)
            .and_then(|sd| mean(&pnls).map(|m| (count as f64).sqrt() * m / sd));

        let winning_pnl: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
        let losing_pnl: Vec<f64> = pnls.iter().filter(|&&p| p < 0.0).map(|p| -p).collect();
        let kelly = match (mean(&winning_pnl), mean(&losing_pnl)) {
            (Some(avg_win), Some(avg_loss)) if avg_loss > 0.0 => {
                Some(win_rate - (1.0 - win_rate) / (avg_win / avg_loss))
            }
            _ => None,
        };

        TradeStats {
            count,
            win_rate: Some(win_rate),
            best: returns.iter().copied().reduce(f64::max),
            worst: returns.iter().copied().reduce(f64::min),
            geometric_avg: geometric_mean_return(&returns),
            max_duration_days: durations.iter().copied().reduce(f64::max),
            avg_duration_days: mean(&durations),
            profit_factor,
            expectancy: mean(&returns),
            sqn,
            kelly,
        }
    }
}
