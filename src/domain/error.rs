//! Domain error types.

/// Structural problems found while validating a bar series at ingestion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("bar series is empty")]
    Empty,

    #[error("timestamp at bar {index} does not increase")]
    NonMonotonic { index: usize },

    #[error("non-positive price at bar {index}")]
    NonPositivePrice { index: usize },

    #[error("high/low range does not contain open/close at bar {index}")]
    InvertedRange { index: usize },

    #[error("negative volume at bar {index}")]
    NegativeVolume { index: usize },
}

/// Top-level error type for orderpoint.
#[derive(Debug, thiserror::Error)]
pub enum OrderPointError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid bar series: {0}")]
    InvalidSeries(#[from] SeriesError),

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrderPointError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        OrderPointError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&OrderPointError> for std::process::ExitCode {
    fn from(err: &OrderPointError) -> Self {
        let code: u8 = match err {
            OrderPointError::Io(_) => 1,
            OrderPointError::ConfigParse { .. } | OrderPointError::ConfigInvalid { .. } => 2,
            OrderPointError::InvalidSeries(_)
            | OrderPointError::Data { .. }
            | OrderPointError::Csv(_) => 3,
        };
        std::process::ExitCode::from(code)
    }
}
