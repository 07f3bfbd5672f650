use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// News or price source unreachable, timed out, or answered with an error
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// History shorter than the configured horizon and lookback need
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// NaN, infinity, or a division by zero that could not be absorbed
    #[error("Numeric error: {0}")]
    NumericDegenerate(String),

    /// Invalid horizon, malformed date range, or bad setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl AnalysisError {
    /// Short machine-readable kind, used in error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::UpstreamUnavailable(_) => "upstream_unavailable",
            AnalysisError::InsufficientData(_) => "insufficient_data",
            AnalysisError::NumericDegenerate(_) => "numeric_degenerate",
            AnalysisError::Configuration(_) => "configuration",
            AnalysisError::InvalidData(_) => "invalid_data",
        }
    }
}
