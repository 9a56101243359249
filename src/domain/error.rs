//! Domain error types.

/// Top-level error type for rsitrader.
#[derive(Debug, thiserror::Error)]
pub enum RsitraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("backtest failed for {instrument}: {reason}")]
    TaskExecution { instrument: String, reason: String },

    #[error("worker pool error: {reason}")]
    WorkerPool { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RsitraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RsitraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&RsitraderError> for std::process::ExitCode {
    fn from(err: &RsitraderError) -> Self {
        let code: u8 = match err {
            RsitraderError::Io(_) => 1,
            RsitraderError::ConfigParse { .. } | RsitraderError::ConfigInvalid { .. } => 2,
            RsitraderError::Data { .. } | RsitraderError::NoData { .. } => 3,
            RsitraderError::TaskExecution { .. } | RsitraderError::WorkerPool { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
