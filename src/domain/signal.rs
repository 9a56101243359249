//! Threshold-crossing state machine for the oscillator strategy.
//!
//! `FLAT -> LONG` when the oscillator was at/above the lower bound on the
//! previous bar and is below it now. `LONG -> FLAT` when it was at/below the
//! upper bound and is above it now. A crossing needs two defined values, so
//! nothing fires on the first bar, during warm-up, or on the first bar after
//! warm-up (its prior value is undefined).

use chrono::NaiveDateTime;

use super::indicator::OscillatorSeries;
use super::ohlcv::OhlcvBar;
use super::strategy::StrategyParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Enter,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub kind: SignalKind,
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct CrossingDetector {
    lower_bound: f64,
    upper_bound: f64,
    state: PositionState,
    prev: Option<f64>,
}

impl CrossingDetector {
    pub fn new(params: &StrategyParams) -> Self {
        CrossingDetector {
            lower_bound: params.lower_bound,
            upper_bound: params.upper_bound,
            state: PositionState::Flat,
            prev: None,
        }
    }

    /// Advances one bar. `value` is `None` while the oscillator is warming up.
    pub fn step(&mut self, value: Option<f64>) -> Option<SignalKind> {
        let prev = self.prev;
        self.prev = value;
        let (prev, current) = (prev?, value?);

        match self.state {
            PositionState::Flat if prev >= self.lower_bound && current < self.lower_bound => {
                self.state = PositionState::Long;
                Some(SignalKind::Enter)
            }
            PositionState::Long if prev <= self.upper_bound && current > self.upper_bound => {
                self.state = PositionState::Flat;
                Some(SignalKind::Exit)
            }
            _ => None,
        }
    }
}

/// Replays the oscillator over `bars` and returns the ordered signal stream.
pub fn generate_signals(
    bars: &[OhlcvBar],
    oscillator: &OscillatorSeries,
    params: &StrategyParams,
) -> Vec<SignalEvent> {
    let mut detector = CrossingDetector::new(params);
    bars.iter()
        .enumerate()
        .filter_map(|(index, bar)| {
            detector.step(oscillator.get(index)).map(|kind| SignalEvent {
                kind,
                index,
                timestamp: bar.timestamp,
                price: bar.close,
            })
        })
        .collect()
}
