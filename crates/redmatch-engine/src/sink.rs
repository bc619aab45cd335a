//! Allocation commit seam.
//!
//! Commits are all-or-nothing per call: either every entry's conditional
//! decrement applies and the audit trail is written in the same
//! transaction, or nothing is applied and the conflicting lines are
//! reported in a typed error. Callers branch on
//! [`RedmatchError::ConcurrentConflict`] rather than unwinding.
//!
//! [`RedmatchError::ConcurrentConflict`]: redmatch_types::RedmatchError::ConcurrentConflict

use async_trait::async_trait;
use redmatch_types::{AuditEntry, BatchId, Result};

/// Write access to the shared pool of credit lines.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Apply every entry's decrement if and only if each line still holds
    /// at least `amount_used`, writing audit records under `batch` in the
    /// same transaction.
    ///
    /// Returns the number of applied decrements on success.
    ///
    /// # Errors
    /// [`redmatch_types::RedmatchError::ConcurrentConflict`] when any line
    /// changed underneath the batch: the whole call is rolled back and the
    /// error names exactly the lines whose decrement did not apply.
    async fn commit(&self, entries: &[AuditEntry], batch: BatchId) -> Result<u64>;
}
