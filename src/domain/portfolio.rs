//! Single-instrument account state and equity tracking.

use chrono::NaiveDateTime;

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub in_market: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_long(&self) -> bool {
        self.position.is_some()
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.market_value(price))
    }

    /// Marks equity to `price` at `timestamp`.
    pub fn mark(&mut self, timestamp: NaiveDateTime, price: f64) {
        let equity = self.total_equity(price);
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity,
            in_market: self.is_long(),
        });
    }
}
