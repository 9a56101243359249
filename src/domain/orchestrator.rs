//! Bounded-parallelism fan-out of independent backtest tasks.
//!
//! Each task runs on a dedicated rayon pool sized to the configured worker
//! count. Outcomes flow back over a channel; completion order is arbitrary, so
//! results and failures are sorted by (instrument, lookback) after the pool
//! drains.
//! A per-task timeout would wrap the `runner` call in [`execute_task`] without
//! changing [`BacktestTask`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::error::RsitraderError;
use super::ohlcv::PriceSeries;
use super::result::BacktestResult;
use super::strategy::StrategyParams;

pub const DEFAULT_WORKERS: usize = 6;

/// Unit of work: one instrument over one lookback window.
#[derive(Debug, Clone)]
pub struct BacktestTask {
    pub instrument: String,
    pub series: Arc<PriceSeries>,
    pub lookback_years: u32,
    pub params: StrategyParams,
}

impl BacktestTask {
    pub fn new(
        instrument: impl Into<String>,
        series: Arc<PriceSeries>,
        lookback_years: u32,
        params: StrategyParams,
    ) -> Self {
        BacktestTask {
            instrument: instrument.into(),
            series,
            lookback_years,
            params,
        }
    }
}

/// Tagged outcome of a single task.
#[derive(Debug)]
pub enum TaskOutcome {
    Completed(BacktestResult),
    Failed {
        instrument: String,
        lookback_years: u32,
        error: RsitraderError,
    },
}

/// A task that produced no result.
#[derive(Debug)]
pub struct TaskFailure {
    pub instrument: String,
    pub lookback_years: u32,
    pub error: RsitraderError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Both lists are sorted by instrument, then lookback years.
    pub results: Vec<BacktestResult>,
    pub failures: Vec<TaskFailure>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Orchestrator {
    workers: usize,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Orchestrator {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Orchestrator {
    pub fn new(workers: usize) -> Result<Self, RsitraderError> {
        if workers == 0 {
            return Err(RsitraderError::invalid(
                "backtest",
                "workers",
                "workers must be at least 1",
            ));
        }
        Ok(Orchestrator { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every task and collects the outcomes.
    ///
    /// Strategy parameters are validated for all tasks before anything is
    /// scheduled. Individual task failures, including panics, never abort
    /// the batch.
    pub fn run<F>(&self, tasks: &[BacktestTask], runner: F) -> Result<BatchReport, RsitraderError>
    where
        F: Fn(&BacktestTask) -> Result<BacktestResult, RsitraderError> + Sync,
    {
        for task in tasks {
            task.params.validate()?;
        }

        let started = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("backtest-worker-{i}"))
            .build()
            .map_err(|e| RsitraderError::WorkerPool {
                reason: e.to_string(),
            })?;

        info!(tasks = tasks.len(), workers = self.workers, "starting backtests");

        let (tx, rx) = mpsc::channel::<TaskOutcome>();
        let runner = &runner;
        pool.scope(|scope| {
            for task in tasks {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = execute_task(task, runner);
                    if tx.send(outcome).is_err() {
                        warn!(instrument = %task.instrument, "result channel closed");
                    }
                });
            }
        });
        drop(tx);

        let mut report = BatchReport::default();
        for outcome in rx {
            match outcome {
                TaskOutcome::Completed(result) => report.results.push(result),
                TaskOutcome::Failed {
                    instrument,
                    lookback_years,
                    error,
                } => {
                    warn!(%instrument, lookback_years, %error, "backtest failed");
                    report.failures.push(TaskFailure {
                        instrument,
                        lookback_years,
                        error,
                    });
                }
            }
        }

        report.results.sort_by(|a, b| {
            a.instrument
                .cmp(&b.instrument)
                .then(a.lookback_years.cmp(&b.lookback_years))
        });
        report.failures.sort_by(|a, b| {
            a.instrument
                .cmp(&b.instrument)
                .then(a.lookback_years.cmp(&b.lookback_years))
        });
        report.elapsed = started.elapsed();

        info!(
            completed = report.results.len(),
            failed = report.failures.len(),
            "Time Taken: {:.2} s",
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}

/// Runs one task, converting errors and panics into a tagged failure.
pub fn execute_task<F>(task: &BacktestTask, runner: &F) -> TaskOutcome
where
    F: Fn(&BacktestTask) -> Result<BacktestResult, RsitraderError>,
{
    debug!(instrument = %task.instrument, lookback_years = task.lookback_years, "backtesting");

    let failed = |error| TaskOutcome::Failed {
        instrument: task.instrument.clone(),
        lookback_years: task.lookback_years,
        error,
    };

    match panic::catch_unwind(AssertUnwindSafe(|| runner(task))) {
        Ok(Ok(result)) => TaskOutcome::Completed(result),
        Ok(Err(err @ RsitraderError::TaskExecution { .. })) => failed(err),
        Ok(Err(err)) => failed(RsitraderError::TaskExecution {
            instrument: task.instrument.clone(),
            reason: err.to_string(),
        }),
        Err(payload) => failed(RsitraderError::TaskExecution {
            instrument: task.instrument.clone(),
            reason: format!("panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
