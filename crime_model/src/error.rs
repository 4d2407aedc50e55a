//! Error types for the crime model.
//!
//! The simulation core performs no I/O, so [`ModelError`] only covers
//! rejected parameters and undefined metrics. Loading experiment files and
//! exporting results go through [`ExperimentError`].

/// Construction-time and query-time failures of the simulation core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// A model parameter or initial wealth entry is outside its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the configuration.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A metric was asked for on input it is not defined for.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A rate was requested over an empty population.
    #[error("division by zero: {0}")]
    DivisionByZero(&'static str),
}

impl ModelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Failures while loading experiments or writing their results.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse experiment TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Every run of a sweep failed.
    #[error("no run of experiment `{0}` completed")]
    NoResults(String),
}
