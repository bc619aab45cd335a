//! Error types for the RedMatch allocation engine.
//!
//! All errors use the `RM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Demand errors
//! - 2xx: Candidate source errors
//! - 3xx: Commit / store errors
//! - 9xx: General / internal errors
//!
//! Per-demand allocation failures are **not** errors. They are data,
//! reported through [`crate::MatchResult`] with a
//! [`crate::FailureReason`]. This enum covers operational failures that
//! abort a call: bad input, unreachable store, commit conflicts.

use thiserror::Error;

use crate::LineId;

/// Central error enum for all RedMatch operations.
#[derive(Debug, Error)]
pub enum RedmatchError {
    // =================================================================
    // Demand Errors (1xx)
    // =================================================================
    /// The demand failed validation (non-positive amount, etc.).
    #[error("RM_ERR_100: Invalid demand: {reason}")]
    InvalidDemand { reason: String },

    // =================================================================
    // Candidate Source Errors (2xx)
    // =================================================================
    /// The candidate source could not be reached or the query failed.
    #[error("RM_ERR_200: Candidate fetch failed: {reason}")]
    FetchFailed { reason: String },

    // =================================================================
    // Commit / Store Errors (3xx)
    // =================================================================
    /// One or more credit lines changed underneath the batch between read
    /// and commit. The whole commit call was rolled back; `conflicting`
    /// names exactly the lines whose conditional decrement did not apply.
    #[error("RM_ERR_300: Concurrent conflict on {} credit line(s)", conflicting.len())]
    ConcurrentConflict { conflicting: Vec<LineId> },

    /// The store rejected the commit for a non-conflict reason.
    #[error("RM_ERR_301: Commit failed: {reason}")]
    CommitFailed { reason: String },

    /// Underlying database error (connection, SQL, timeout).
    #[error("RM_ERR_302: Database error: {0}")]
    Database(String),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("RM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error (invalid config values, missing fields, etc.).
    #[error("RM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("RM_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RedmatchError>;

// Conversion from std::io::Error
impl From<std::io::Error> for RedmatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
