//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
    #[error("alignment error for {symbol}: {reason}")]
    Alignment { symbol: String, reason: String },

    #[error("missing signal for {symbol}")]
    MissingSignal { symbol: String },

    #[error("no common timestamps across symbols: {symbols}")]
    NoCommonTimestamps { symbols: String },

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

    #[error("target fraction for {symbol} on {date} must be in [0, 1], got {value}")]
    FractionOutOfRange {
        symbol: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("close price for {symbol} on {date} must be positive, got {price}")]
    NonPositivePrice {
        symbol: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("invalid data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradesimError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TradesimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config_missing(section: &str, key: &str) -> Self {
        TradesimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&TradesimError> for std::process::ExitCode {
    fn from(err: &TradesimError) -> Self {
        let code: u8 = match err {
            TradesimError::Io(_) => 1,
            TradesimError::ConfigParse { .. }
            | TradesimError::ConfigMissing { .. }
            | TradesimError::ConfigInvalid { .. } => 2,
            TradesimError::InvalidData { .. } | TradesimError::NoData { .. } => 3,
            TradesimError::Alignment { .. }
            | TradesimError::MissingSignal { .. }
            | TradesimError::NoCommonTimestamps { .. } => 4,
            TradesimError::FractionOutOfRange { .. } | TradesimError::NonPositivePrice { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
