#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
pub use rsitrader::domain::ohlcv::OhlcvBar;
use rsitrader::domain::error::RsitraderError;
use rsitrader::domain::ohlcv::PriceSeries;
use rsitrader::domain::result::BacktestResult;
use rsitrader::ports::data_port::DataPort;
use rsitrader::ports::report_port::ReportPort;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct MockDataPort {
    pub data: BTreeMap<String, Vec<OhlcvBar>>,
    pub errors: BTreeMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn list_instruments(&self) -> Result<Vec<String>, RsitraderError> {
        let mut ids: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn fetch_series(&self, instrument: &str) -> Result<PriceSeries, RsitraderError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(RsitraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(instrument).cloned().unwrap_or_default();
        PriceSeries::from_unsorted(instrument, bars)
    }
}

/// Captures whatever the pipeline writes instead of touching the filesystem.
#[derive(Default)]
pub struct MemoryReportPort {
    pub written: Mutex<Vec<(PathBuf, Vec<BacktestResult>)>>,
}

impl ReportPort for MemoryReportPort {
    fn write(&self, results: &[BacktestResult], output_path: &Path) -> Result<(), RsitraderError> {
        self.written
            .lock()
            .unwrap()
            .push((output_path.to_path_buf(), results.to_vec()));
        Ok(())
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

pub fn make_bar(timestamp: NaiveDateTime, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 10_000.0,
    }
}

/// Hourly bars starting at [`start_time`].
pub fn make_hourly_bars(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start_time() + Duration::hours(i as i64), c))
        .collect()
}

/// Daily bars, one per calendar day, starting at `start`.
pub fn make_daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let ts = (start + Duration::days(i as i64)).and_hms_opt(16, 0, 0).unwrap();
            make_bar(ts, c)
        })
        .collect()
}

/// 30 closes that produce exactly one RSI(14) 30/70 round trip:
/// entry on bar 16 at 89.0 and exit on bar 23 at 122.0.
pub fn single_trade_closes() -> Vec<f64> {
    let mut closes = vec![100.0];
    for i in 1..16 {
        let prev = closes[i - 1];
        closes.push(if i % 2 == 1 { prev + 1.0 } else { prev - 1.0 });
    }
    closes.push(89.0);
    for _ in 17..23 {
        let prev = closes[closes.len() - 1];
        closes.push(prev + 3.0);
    }
    closes.push(122.0);
    for _ in 24..30 {
        let prev = closes[closes.len() - 1];
        closes.push(prev - 0.5);
    }
    closes
}

pub fn series(instrument: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(instrument, make_hourly_bars(closes)).unwrap()
}

/// `Date,Open,High,Low,Close,Volume` file content for the given bars.
pub fn to_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("Date,Open,High,Low,Close,Volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
