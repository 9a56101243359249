//! Result sink port trait.

use std::path::Path;

use crate::domain::error::RsitraderError;
use crate::domain::result::BacktestResult;

/// Port for persisting the aggregate result table.
pub trait ReportPort {
    fn write(&self, results: &[BacktestResult], output_path: &Path) -> Result<(), RsitraderError>;
}
