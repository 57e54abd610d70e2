//! Errors raised by the position store and its collaborators

use thiserror::Error;

/// Main error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FleetError {
    /// Missing or unparseable input, detected before any mutation
    #[error("Invalid `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("Device `{0}` not found")]
    NotFound(String),
    #[error("Invalid email or password")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    #[error("Failed on read the reports source: {0}")]
    Source(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FleetError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::validation(field, "field is required")
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

pub type Result<T, E = FleetError> = std::result::Result<T, E>;
