//! Open positions and closed trades.

use chrono::{NaiveDateTime, TimeDelta};

/// A long holding. Exists only while the strategy is `LONG`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_index: usize,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_index: usize,
    pub exit_index: usize,
    pub pnl: f64,
    /// Closed at end of series for reporting rather than by an exit signal.
    pub forced: bool,
}

impl ClosedTrade {
    /// exit / entry - 1
    pub fn return_ratio(&self) -> f64 {
        self.exit_price / self.entry_price - 1.0
    }

    pub fn duration(&self) -> TimeDelta {
        self.exit_time - self.entry_time
    }
}
