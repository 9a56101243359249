//! CLI integration tests for the backtest command orchestration.
//!
//! Tests cover:
//! - Settings resolution from INI files and command-line overrides
//! - Task construction across instruments and lookback windows
//! - Full pipeline with MockDataPort and an in-memory result sink
//! - End-to-end with CSV files on disk

mod common;

use common::*;
use rsitrader::adapters::csv_adapter::CsvAdapter;
use rsitrader::adapters::csv_report_adapter::CsvReportAdapter;
use rsitrader::adapters::file_config_adapter::FileConfigAdapter;
use rsitrader::cli::{self, Overrides};
use rsitrader::domain::error::RsitraderError;
use std::io::Write;
use std::path::PathBuf;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[backtest]
data_dir = prices
output = out.csv
initial_capital = 25000
lookback_years = 10, 5, 1
workers = 3
risk_free_rate = 0.02

[strategy]
rsi_window = 10
lower_bound = 25
upper_bound = 75
"#;

mod settings {
    use super::*;

    #[test]
    fn reads_every_key() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let s = cli::build_settings(&adapter, &Overrides::default()).unwrap();

        assert_eq!(s.data_dir, PathBuf::from("prices"));
        assert_eq!(s.output, PathBuf::from("out.csv"));
        assert_eq!(s.lookback_years, vec![10, 5, 1]);
        assert_eq!(s.workers, 3);
        assert_eq!(s.backtest.initial_capital, 25_000.0);
        assert_eq!(s.backtest.risk_free_rate, 0.02);
        assert_eq!(s.params.rsi_window, 10);
        assert_eq!(s.params.lower_bound, 25.0);
        assert_eq!(s.params.upper_bound, 75.0);
    }

    #[test]
    fn defaults_when_config_is_empty() {
        let s = cli::build_settings(&FileConfigAdapter::empty(), &Overrides::default()).unwrap();

        assert_eq!(s.data_dir, PathBuf::from("data"));
        assert_eq!(s.output, PathBuf::from("backtest_results.csv"));
        assert_eq!(s.lookback_years, vec![10]);
        assert_eq!(s.workers, 6);
        assert_eq!(s.backtest.initial_capital, 50_000.0);
        assert_eq!(s.backtest.risk_free_rate, 0.0);
        assert_eq!(s.params.rsi_window, 14);
        assert_eq!(s.params.lower_bound, 30.0);
        assert_eq!(s.params.upper_bound, 70.0);
    }

    #[test]
    fn overrides_take_precedence() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let overrides = Overrides {
            data_dir: Some(PathBuf::from("/tmp/other")),
            output: Some(PathBuf::from("/tmp/res.csv")),
            years: Some("2".to_string()),
            workers: Some(8),
        };
        let s = cli::build_settings(&adapter, &overrides).unwrap();

        assert_eq!(s.data_dir, PathBuf::from("/tmp/other"));
        assert_eq!(s.output, PathBuf::from("/tmp/res.csv"));
        assert_eq!(s.lookback_years, vec![2]);
        assert_eq!(s.workers, 8);
    }

    #[test]
    fn zero_workers_override_is_rejected() {
        let overrides = Overrides {
            workers: Some(0),
            ..Default::default()
        };
        let err = cli::build_settings(&FileConfigAdapter::empty(), &overrides).unwrap_err();
        assert!(matches!(err, RsitraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn bad_years_override_is_rejected() {
        let overrides = Overrides {
            years: Some("5,zero".to_string()),
            ..Default::default()
        };
        assert!(cli::build_settings(&FileConfigAdapter::empty(), &overrides).is_err());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nlower_bound = 80\nupper_bound = 20\n")
                .unwrap();
        let err = cli::build_settings(&adapter, &Overrides::default()).unwrap_err();
        assert!(matches!(err, RsitraderError::ConfigInvalid { .. }));
        let code: std::process::ExitCode = (&err).into();
        assert_eq!(code, std::process::ExitCode::from(2));
    }

    #[test]
    fn load_config_from_disk() {
        let file = write_temp_ini(VALID_INI);
        let adapter = cli::load_config(file.path()).unwrap();
        let s = cli::build_settings(&adapter, &Overrides::default()).unwrap();
        assert_eq!(s.workers, 3);
    }

    #[test]
    fn load_config_missing_file_is_parse_error() {
        let err = cli::load_config(std::path::Path::new("/nonexistent/rsitrader.ini"))
            .err()
            .unwrap();
        assert!(matches!(err, RsitraderError::ConfigParse { .. }));
    }
}

mod pipeline {
    use super::*;

    fn settings(years: &str) -> cli::RunSettings {
        let overrides = Overrides {
            years: Some(years.to_string()),
            workers: Some(2),
            output: Some(PathBuf::from("memory.csv")),
            ..Default::default()
        };
        cli::build_settings(&FileConfigAdapter::empty(), &overrides).unwrap()
    }

    #[test]
    fn builds_one_task_per_instrument_and_lookback() {
        let port = MockDataPort::new()
            .with_bars("MSFT", make_hourly_bars(&single_trade_closes()))
            .with_bars("AAPL", make_hourly_bars(&single_trade_closes()));
        let tasks = cli::build_tasks(&port, &settings("10,5,1")).unwrap();

        assert_eq!(tasks.len(), 6);
        let keys: Vec<(&str, u32)> = tasks
            .iter()
            .map(|t| (t.instrument.as_str(), t.lookback_years))
            .collect();
        assert!(keys.contains(&("AAPL", 1)));
        assert!(keys.contains(&("MSFT", 10)));
    }

    #[test]
    fn unreadable_instruments_are_skipped() {
        let port = MockDataPort::new()
            .with_bars("AAPL", make_hourly_bars(&single_trade_closes()))
            .with_bars("EMPTY", Vec::new())
            .with_error("BROKEN", "disk error");
        let tasks = cli::build_tasks(&port, &settings("10")).unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].instrument, "AAPL");
    }

    #[test]
    fn runs_batch_and_writes_sorted_results() {
        let port = MockDataPort::new()
            .with_bars("MSFT", make_hourly_bars(&single_trade_closes()))
            .with_bars("AAPL", make_hourly_bars(&single_trade_closes()))
            .with_bars("FLAT", make_hourly_bars(&[50.0; 40]));
        let sink = MemoryReportPort::default();
        let batch = cli::run_backtest_pipeline(&port, &sink, &settings("5,1")).unwrap();

        assert_eq!(batch.results.len(), 6);
        assert!(batch.failures.is_empty());

        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        let (path, rows) = &written[0];
        assert_eq!(path, &PathBuf::from("memory.csv"));
        let keys: Vec<(String, u32)> = rows
            .iter()
            .map(|r| (r.instrument.clone(), r.lookback_years))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("AAPL".to_string(), 1),
                ("AAPL".to_string(), 5),
                ("FLAT".to_string(), 1),
                ("FLAT".to_string(), 5),
                ("MSFT".to_string(), 1),
                ("MSFT".to_string(), 5),
            ]
        );
        let flat = rows.iter().find(|r| r.instrument == "FLAT").unwrap();
        assert_eq!(flat.trade_count, 0);
        assert_eq!(flat.total_return_pct, 0.0);
    }

    #[test]
    fn empty_data_source_writes_empty_table() {
        let sink = MemoryReportPort::default();
        let batch =
            cli::run_backtest_pipeline(&MockDataPort::new(), &sink, &settings("10")).unwrap();

        assert_eq!(batch.total(), 0);
        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].1.is_empty());
    }
}

mod end_to_end {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn csv_directory_to_results_file() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();

        let bars = make_hourly_bars(&single_trade_closes());
        std::fs::write(data_dir.join("AAPL_adjusted.csv"), to_csv(&bars)).unwrap();
        let mut reversed = bars.clone();
        reversed.reverse();
        std::fs::write(data_dir.join("MSFT_hourly.csv"), to_csv(&reversed)).unwrap();
        std::fs::write(
            data_dir.join("BAD_hourly.csv"),
            "Date,Open,High,Low,Close,Volume\nnot-a-date,1,1,1,1,1\n",
        )
        .unwrap();

        let output = dir.path().join("backtest_results.csv");
        let ini = format!(
            "[backtest]\ndata_dir = {}\noutput = {}\nlookback_years = 10\nworkers = 2\n",
            data_dir.display(),
            output.display()
        );
        let file = write_temp_ini(&ini);
        let adapter = cli::load_config(file.path()).unwrap();
        let settings = cli::build_settings(&adapter, &Overrides::default()).unwrap();

        let batch = cli::run_backtest_pipeline(
            &CsvAdapter::new(settings.data_dir.clone()),
            &CsvReportAdapter::new(),
            &settings,
        )
        .unwrap();
        assert_eq!(batch.results.len(), 2);

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Ticker,Lookback (years),Return [%]"));
        assert!(lines[1].starts_with("AAPL,10,37.08,19.0,"));
        assert!(lines[2].starts_with("MSFT,10,37.08,19.0,"));
    }
}
