//! # AppError
//!
//! Centralized error handling for the chip ranking.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all cr-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected locally before any I/O (e.g., empty comment, missing image)
    #[error("validation error: {0}")]
    Validation(String),

    /// No session, or the session is no longer valid
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (e.g., Chip, Session)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Duplicate resource, or an action already in flight
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store or object storage reported a failure
    #[error("backend error: {0}")]
    Backend(String),

    /// A backend call did not answer within the configured bound
    #[error("backend call timed out after {0} ms")]
    Timeout(u64),

    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failures that came from the backend rather than from local checks.
    /// Both flavours take the rollback path in the vote flow.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, AppError::Backend(_) | AppError::Timeout(_))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Backend(format!("{err:#}"))
    }
}

/// A specialized Result type for chip ranking logic.
pub type Result<T> = std::result::Result<T, AppError>;
