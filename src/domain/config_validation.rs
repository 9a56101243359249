//! Configuration validation.
//!
//! Validates every `[backtest]` and `[strategy]` field before any task is
//! scheduled. Missing keys fall back to their defaults; present keys must
//! parse and satisfy their range.

use std::str::FromStr;

use crate::domain::error::RsitraderError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_LOOKBACK_YEARS: &str = "10";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    validate_initial_capital(config)?;
    validate_workers(config)?;
    validate_risk_free_rate(config)?;
    validate_lookback_years(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    let window: i64 = parse_key(config, "strategy", "rsi_window", 14)?;
    if window < 1 {
        return Err(RsitraderError::invalid(
            "strategy",
            "rsi_window",
            "rsi_window must be at least 1",
        ));
    }
    let lower: f64 = parse_key(config, "strategy", "lower_bound", 30.0)?;
    let upper: f64 = parse_key(config, "strategy", "upper_bound", 70.0)?;
    if !(0.0..=100.0).contains(&lower) {
        return Err(RsitraderError::invalid(
            "strategy",
            "lower_bound",
            "lower_bound must be between 0 and 100",
        ));
    }
    if !(0.0..=100.0).contains(&upper) {
        return Err(RsitraderError::invalid(
            "strategy",
            "upper_bound",
            "upper_bound must be between 0 and 100",
        ));
    }
    if lower >= upper {
        return Err(RsitraderError::invalid(
            "strategy",
            "lower_bound",
            "lower_bound must be below upper_bound",
        ));
    }
    Ok(())
}

/// Reads `section.key`, returning `default` when absent and an error when the
/// value does not parse.
pub fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, RsitraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            RsitraderError::invalid(section, key, format!("cannot parse '{}'", raw.trim()))
        }),
    }
}

/// Parses a comma-separated list of lookback windows such as `"10, 5, 1"`.
///
/// Duplicates are dropped; order of first appearance is kept.
pub fn parse_lookback_years(value: &str) -> Result<Vec<u32>, RsitraderError> {
    let mut years = Vec::new();
    for part in value.split(',').map(str::trim) {
        let parsed: u32 = part.parse().map_err(|_| {
            RsitraderError::invalid(
                "backtest",
                "lookback_years",
                format!("'{part}' is not a whole number of years"),
            )
        })?;
        if parsed == 0 {
            return Err(RsitraderError::invalid(
                "backtest",
                "lookback_years",
                "lookback_years must be at least 1",
            ));
        }
        if !years.contains(&parsed) {
            years.push(parsed);
        }
    }
    Ok(years)
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    let value: f64 = parse_key(config, "backtest", "initial_capital", 50_000.0)?;
    if !(value.is_finite() && value > 0.0) {
        return Err(RsitraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_workers(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    let value: i64 = parse_key(config, "backtest", "workers", 6)?;
    if value < 1 {
        return Err(RsitraderError::invalid(
            "backtest",
            "workers",
            "workers must be at least 1",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    let value: f64 = parse_key(config, "backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(RsitraderError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_lookback_years(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    let raw = config
        .get_string("backtest", "lookback_years")
        .unwrap_or_else(|| DEFAULT_LOOKBACK_YEARS.to_string());
    parse_lookback_years(&raw).map(|_| ())
}
