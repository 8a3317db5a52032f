//! Error types for density gating.

use thiserror::Error;

/// Errors that can occur while gating a point cloud.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    /// Caller-supplied data or parameters are unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The histogram holds no events, so no density can be normalized.
    #[error("empty distribution: no events fall inside the bin range")]
    EmptyDistribution,

    /// The cumulative count never reached the requested number of events.
    #[error("internal invariant violated: cumulative count {reached} never reached target {target}")]
    InternalInvariantViolation { reached: u64, target: u64 },

    /// The isoline could not be traced at the requested level.
    #[error("contour extraction error: {0}")]
    ContourExtractionError(String),
}

pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(feature = "python")]
impl From<GateError> for pyo3::PyErr {
    fn from(err: GateError) -> Self {
        use pyo3::exceptions::{PyRuntimeError, PyValueError};
        match err {
            GateError::InvalidInput(_) | GateError::EmptyDistribution => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}
