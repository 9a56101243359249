//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are undefined (need n price changes to seed the averages).
//!
//! The smoothing state lives in [`WilderState`], owned by each call, so
//! concurrent computations over different instruments share nothing.

use super::{IndicatorType, OscillatorSeries};

pub const DEFAULT_RSI_WINDOW: usize = 14;

/// Running Wilder averages of gains and losses.
#[derive(Debug, Clone, PartialEq)]
pub struct WilderState {
    period: usize,
    seen: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl WilderState {
    pub fn new(period: usize) -> Self {
        WilderState {
            period,
            seen: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    /// Feeds one price change. Returns the RSI once `period` changes are in.
    pub fn update(&mut self, change: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }

        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.seen += 1;

        if self.seen < self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            return None;
        }

        let n = self.period as f64;
        if self.seen == self.period {
            self.avg_gain = (self.gain_sum + gain) / n;
            self.avg_loss = (self.loss_sum + loss) / n;
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        Some(self.value())
    }

    fn value(&self) -> f64 {
        if self.avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + self.avg_gain / self.avg_loss))
        }
    }
}

pub fn calculate_rsi(closes: &[f64], period: usize) -> OscillatorSeries {
    let mut values = Vec::with_capacity(closes.len());
    let mut state = WilderState::new(period);

    if !closes.is_empty() {
        values.push(None);
    }
    for pair in closes.windows(2) {
        values.push(state.update(pair[1] - pair[0]));
    }

    OscillatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
