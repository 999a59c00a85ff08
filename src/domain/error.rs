//! Domain error types.

use crate::domain::series::ModelOrder;
use chrono::NaiveDate;

/// Sharpe ratio could not be computed from the strategy returns.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("undefined sharpe ratio over {observations} returns: {reason}")]
pub struct SharpeUndefined {
    pub observations: usize,
    pub reason: String,
}

/// Top-level error type for arimatrader.
#[derive(Debug, thiserror::Error)]
pub enum ArimaTraderError {
    #[error("insufficient data for {context}: have {have} observations, need {need}")]
    InsufficientData {
        context: String,
        have: usize,
        need: usize,
    },

    #[error("model selection failed on window of {window_len} ending {}: {reason}", fmt_date(.window_end))]
    ModelSelection {
        window_end: Option<NaiveDate>,
        window_len: usize,
        reason: String,
    },

    #[error("{order} did not converge on window of {window_len} ending {}: {reason}", fmt_date(.window_end))]
    Convergence {
        order: ModelOrder,
        window_end: Option<NaiveDate>,
        window_len: usize,
        reason: String,
    },

    #[error(transparent)]
    UndefinedSharpe(#[from] SharpeUndefined),

    #[error("degenerate input for {context}: {reason}")]
    Degenerate { context: String, reason: String },

    #[error("invalid series: {reason}")]
    InvalidSeries { reason: String },

    #[error("cancelled after {completed} of {total} forecast steps")]
    Cancelled { completed: usize, total: usize },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn fmt_date(date: &Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.to_string(),
        None => "<empty>".to_string(),
    }
}

impl From<&ArimaTraderError> for std::process::ExitCode {
    fn from(err: &ArimaTraderError) -> Self {
        let code: u8 = match err {
            ArimaTraderError::Io(_) | ArimaTraderError::Csv(_) => 1,
            ArimaTraderError::ConfigParse { .. }
            | ArimaTraderError::ConfigMissing { .. }
            | ArimaTraderError::ConfigInvalid { .. } => 2,
            ArimaTraderError::Data { .. } | ArimaTraderError::InvalidSeries { .. } => 3,
            ArimaTraderError::InsufficientData { .. } | ArimaTraderError::Degenerate { .. } => 5,
            ArimaTraderError::ModelSelection { .. }
            | ArimaTraderError::Convergence { .. }
            | ArimaTraderError::UndefinedSharpe(_) => 6,
            ArimaTraderError::Cancelled { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
