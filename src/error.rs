//! Error taxonomy for the ETL and analytics core.
//!
//! Input-validation problems are *not* errors here: they are recorded as codes
//! in a [`ValidationResult`](crate::models::ValidationResult) and the reading is
//! still stored. Only faults that abort an invocation live in [`Error`].

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Faults that abort the current pipeline invocation or analytics query.
#[derive(Error, Debug)]
pub enum Error {
    /// The storage collaborator failed (unavailable, query error, ...).
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A storage backend reported a failure that is not a database error.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A caller-supplied parameter was rejected before any query ran.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// The upstream sensor API could not be fetched or decoded.
    #[error("upstream sensor API error: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl Error {
    /// True for parameter errors, which the API layer reports as client errors.
    pub fn is_parameter_error(&self) -> bool {
        matches!(self, Error::InvalidParameter { .. })
    }
}

/// A fault raised inside a pipeline stage.
///
/// Never escapes [`EtlPipeline::run`](crate::pipeline::EtlPipeline::run); the
/// pipeline downgrades it to the `processing_error` validation code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingFault {
    #[error("non-finite input to {stage}: temperature={temperature}, humidity={humidity}")]
    NonFiniteInput {
        stage: &'static str,
        temperature: f64,
        humidity: f64,
    },

    #[error("{stage} produced a non-finite {field}")]
    NonFiniteOutput {
        stage: &'static str,
        field: &'static str,
    },
}
