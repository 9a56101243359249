//! Market-on-close fill simulation.
//!
//! Entries spend all available cash on a fractional quantity at the bar's
//! close. No leverage, no shorting, no commission or slippage.

use chrono::NaiveDateTime;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position};

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered { quantity: f64, execution_price: f64 },
    AlreadyLong,
    InsufficientCapital,
}

/// Opens a full-capital long position at `price`.
pub fn enter_long(
    portfolio: &mut Portfolio,
    price: f64,
    timestamp: NaiveDateTime,
    index: usize,
) -> EntryResult {
    if portfolio.is_long() {
        return EntryResult::AlreadyLong;
    }
    if portfolio.cash <= 0.0 || !(price > 0.0) {
        return EntryResult::InsufficientCapital;
    }

    let quantity = portfolio.cash / price;
    portfolio.cash = 0.0;
    portfolio.position = Some(Position {
        quantity,
        entry_price: price,
        entry_time: timestamp,
        entry_index: index,
    });

    EntryResult::Entered {
        quantity,
        execution_price: price,
    }
}

/// Closes the open position at `price` and books the trade.
///
/// Returns `None` when flat.
pub fn exit_position(
    portfolio: &mut Portfolio,
    price: f64,
    timestamp: NaiveDateTime,
    index: usize,
    forced: bool,
) -> Option<ClosedTrade> {
    let position = portfolio.position.take()?;

    portfolio.cash += position.market_value(price);

    let trade = ClosedTrade {
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price: price,
        entry_time: position.entry_time,
        exit_time: timestamp,
        entry_index: position.entry_index,
        exit_index: index,
        pnl: position.unrealized_pnl(price),
        forced,
    };
    portfolio.record_trade(trade.clone());
    Some(trade)
}
