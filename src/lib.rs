//! rsitrader: batch RSI oscillator backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command line glue in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
