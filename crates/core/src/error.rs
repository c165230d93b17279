//! Configuration errors.

/// Errors raised while building configuration. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A duration string could not be parsed
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    /// Cadence must be strictly positive
    #[error("cadence must be greater than zero")]
    NonPositiveCadence,

    /// The schedule range is empty or inverted
    #[error("schedule end {end} must be after start {start}")]
    InvalidRange {
        /// Configured start
        start: String,
        /// Configured end
        end: String,
    },

    /// Train + validation + test spans sum to zero
    #[error("total window span must be greater than zero")]
    EmptySpan,

    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other invalid field
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
