//! OHLCV bars and per-instrument price series.

use chrono::{Months, NaiveDateTime};

use super::error::RsitraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered bars for a single instrument.
///
/// Timestamps are strictly increasing and the series is never empty. Once
/// built the series is immutable; runners share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    instrument: String,
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    /// Builds a series from bars that are already in ascending order.
    ///
    /// Only shape is checked: non-empty, strictly increasing timestamps.
    pub fn new(instrument: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, RsitraderError> {
        let instrument = instrument.into();
        if bars.is_empty() {
            return Err(RsitraderError::NoData { instrument });
        }
        if let Some(pair) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(RsitraderError::Data {
                reason: format!(
                    "{}: timestamps not strictly increasing at {}",
                    instrument, pair[1].timestamp
                ),
            });
        }
        Ok(PriceSeries { instrument, bars })
    }

    /// Sorts bars by timestamp and keeps the first bar seen for each
    /// duplicated timestamp.
    pub fn from_unsorted(
        instrument: impl Into<String>,
        mut bars: Vec<OhlcvBar>,
    ) -> Result<Self, RsitraderError> {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self::new(instrument, bars)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.bars[0].timestamp
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.bars[self.bars.len() - 1].timestamp
    }

    /// Restricts the series to the trailing `years` ending at its last bar.
    ///
    /// Bars strictly before `last_timestamp - years` are dropped. The last bar
    /// always survives, so the result is never empty, and the last timestamp is
    /// unchanged, so applying the same window twice is a no-op.
    pub fn trailing_years(&self, years: u32) -> PriceSeries {
        let cutoff = self
            .last_timestamp()
            .checked_sub_months(Months::new(years.saturating_mul(12)));
        let bars = match cutoff {
            Some(cutoff) => self
                .bars
                .iter()
                .filter(|b| b.timestamp >= cutoff)
                .cloned()
                .collect(),
            None => self.bars.clone(),
        };
        PriceSeries {
            instrument: self.instrument.clone(),
            bars,
        }
    }
}
