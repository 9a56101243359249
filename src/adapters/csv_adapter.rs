//! CSV directory data adapter.
//!
//! Every `*.csv` file in the base directory is one instrument. The instrument
//! id is the file stem up to the first `_`, so `AAPL_adjusted.csv` is `AAPL`.

use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "Datetime", alias = "timestamp")]
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", alias = "open")]
    open: f64,
    #[serde(rename = "High", alias = "high")]
    high: f64,
    #[serde(rename = "Low", alias = "low")]
    low: f64,
    #[serde(rename = "Close", alias = "close")]
    close: f64,
    #[serde(rename = "Volume", alias = "volume", default)]
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// `(instrument id, path)` for every CSV file, sorted by file name.
    fn csv_files(&self) -> Result<Vec<(String, PathBuf)>, RsitraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RsitraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(instrument_id)
            {
                files.push((id.to_string(), path));
            }
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }
}

/// Instrument id for a file stem; `None` when the id part is empty.
pub fn instrument_id(stem: &str) -> Option<&str> {
    let id = stem.split('_').next().unwrap_or(stem).trim();
    (!id.is_empty()).then_some(id)
}

/// Accepts `YYYY-MM-DD HH:MM:SS` or a bare date at midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn read_bars(path: &Path) -> Result<Vec<OhlcvBar>, RsitraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| RsitraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

    let mut bars = Vec::new();
    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| RsitraderError::Data {
            reason: format!("{}: CSV parse error: {}", path.display(), e),
        })?;
        let timestamp = parse_timestamp(&row.date).ok_or_else(|| RsitraderError::Data {
            reason: format!(
                "{}: invalid date '{}' on row {}",
                path.display(),
                row.date,
                line + 1
            ),
        })?;
        bars.push(OhlcvBar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn list_instruments(&self) -> Result<Vec<String>, RsitraderError> {
        let mut chosen: BTreeMap<String, PathBuf> = BTreeMap::new();
        for (id, path) in self.csv_files()? {
            match chosen.get(&id) {
                Some(kept) => warn!(
                    instrument = %id,
                    using = %kept.display(),
                    ignored = %path.display(),
                    "several files share an instrument id"
                ),
                None => {
                    chosen.insert(id, path);
                }
            }
        }
        Ok(chosen.into_keys().collect())
    }

    /// Reads the first file, by name, whose id matches `instrument`.
    fn fetch_series(&self, instrument: &str) -> Result<PriceSeries, RsitraderError> {
        let path = self
            .csv_files()?
            .into_iter()
            .find(|(id, _)| id == instrument)
            .map(|(_, path)| path)
            .ok_or_else(|| RsitraderError::NoData {
                instrument: instrument.to_string(),
            })?;

        let bars = read_bars(&path)?;
        let raw = bars.len();
        let series = PriceSeries::from_unsorted(instrument, bars)?;
        if series.len() < raw {
            debug!(
                instrument,
                dropped = raw - series.len(),
                "dropped duplicate timestamps"
            );
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "Date,Open,High,Low,Close,Volume\n\
            2024-01-16 09:30:00,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15 09:30:00,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16 09:30:00,1.0,1.0,1.0,1.0,1\n\
            2024-01-17 09:30:00,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BHP_hourly.csv"), csv_content).unwrap();
        fs::write(path.join("CBA.csv"), "Date,Open,High,Low,Close,Volume\n").unwrap();
        fs::write(
            path.join("AAPL_adjusted.csv"),
            "date,open,high,low,close,volume\n2024-01-15,1,2,0.5,1.5,10\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "not a series").unwrap();

        (dir, path)
    }

    #[test]
    fn instrument_id_takes_prefix() {
        assert_eq!(instrument_id("AAPL_adjusted"), Some("AAPL"));
        assert_eq!(instrument_id("MSFT"), Some("MSFT"));
        assert_eq!(instrument_id("_x"), None);
    }

    #[test]
    fn parse_timestamp_accepts_both_formats() {
        let full = parse_timestamp("2024-01-15 09:30:00").unwrap();
        assert_eq!(full.to_string(), "2024-01-15 09:30:00");
        let bare = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(bare.to_string(), "2024-01-15 00:00:00");
        assert!(parse_timestamp("15/01/2024").is_none());
    }

    #[test]
    fn list_instruments_uses_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_instruments().unwrap(), vec!["AAPL", "BHP", "CBA"]);
    }

    #[test]
    fn fetch_series_sorts_and_drops_duplicates() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter.fetch_series("BHP").unwrap();
        assert_eq!(series.instrument(), "BHP");
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![105.0, 110.0, 115.0]);
        assert_eq!(series.bars()[0].volume, 50000.0);
    }

    #[test]
    fn fetch_series_accepts_lowercase_headers() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter.fetch_series("AAPL").unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, 1.5);
    }

    #[test]
    fn fetch_series_header_only_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_series("CBA"),
            Err(RsitraderError::NoData { .. })
        ));
    }

    #[test]
    fn fetch_series_unknown_instrument() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_series("XYZ"),
            Err(RsitraderError::NoData { .. })
        ));
    }

    #[test]
    fn fetch_series_reports_bad_rows() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("BAD.csv"),
            "Date,Open,High,Low,Close,Volume\n2024-01-15,1,2,0.5,abc,10\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("WORSE.csv"),
            "Date,Open,High,Low,Close,Volume\nyesterday,1,2,0.5,1,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(matches!(
            adapter.fetch_series("BAD"),
            Err(RsitraderError::Data { .. })
        ));
        assert!(matches!(
            adapter.fetch_series("WORSE"),
            Err(RsitraderError::Data { .. })
        ));
    }

    #[test]
    fn files_sharing_an_id_resolve_to_the_first_by_name() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("AAPL_b.csv"),
            "Date,Open,High,Low,Close,Volume\n2024-01-15,1,1,1,2.0,10\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("AAPL_a.csv"),
            "Date,Open,High,Low,Close,Volume\n2024-01-15,1,1,1,1.0,10\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        assert_eq!(adapter.list_instruments().unwrap(), vec!["AAPL"]);
        assert_eq!(adapter.fetch_series("AAPL").unwrap().closes(), vec![1.0]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/rsitrader/data"));
        assert!(adapter.list_instruments().is_err());
    }
}
