//! Price-series provider and task source.

use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::PriceSeries;

pub trait DataPort {
    /// Instrument ids available to backtest, sorted and unique.
    fn list_instruments(&self) -> Result<Vec<String>, RsitraderError>;

    /// Full ascending, deduplicated history for one instrument.
    fn fetch_series(&self, instrument: &str) -> Result<PriceSeries, RsitraderError>;
}
