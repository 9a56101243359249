//! Momentum oscillator types.
//!
//! - `IndicatorType`: indicator identity + parameters, used in log lines
//! - `OscillatorSeries`: values aligned 1:1 with the bars they were computed from

pub mod rsi;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Rsi(usize),
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
        }
    }
}

/// Oscillator output. `None` marks warm-up bars with insufficient history.
#[derive(Debug, Clone, PartialEq)]
pub struct OscillatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl OscillatorSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    /// Number of defined values.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}
