//! Strategy parameters for the RSI oscillator strategy.

use crate::domain::error::RsitraderError;
use crate::domain::indicator::rsi::DEFAULT_RSI_WINDOW;

pub const DEFAULT_LOWER_BOUND: f64 = 30.0;
pub const DEFAULT_UPPER_BOUND: f64 = 70.0;

/// Immutable per-task strategy configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyParams {
    pub rsi_window: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            rsi_window: DEFAULT_RSI_WINDOW,
            lower_bound: DEFAULT_LOWER_BOUND,
            upper_bound: DEFAULT_UPPER_BOUND,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), RsitraderError> {
        if self.rsi_window == 0 {
            return Err(RsitraderError::invalid(
                "strategy",
                "rsi_window",
                "rsi_window must be at least 1",
            ));
        }
        if !(0.0..=100.0).contains(&self.lower_bound) {
            return Err(RsitraderError::invalid(
                "strategy",
                "lower_bound",
                "lower_bound must be between 0 and 100",
            ));
        }
        if !(0.0..=100.0).contains(&self.upper_bound) {
            return Err(RsitraderError::invalid(
                "strategy",
                "upper_bound",
                "upper_bound must be between 0 and 100",
            ));
        }
        if self.lower_bound >= self.upper_bound {
            return Err(RsitraderError::invalid(
                "strategy",
                "lower_bound",
                "lower_bound must be below upper_bound",
            ));
        }
        Ok(())
    }
}
