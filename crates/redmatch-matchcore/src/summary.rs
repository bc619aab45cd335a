//! Batch-level rollup of match results.
//!
//! Pure data for the report sink; rendering and dashboards live outside
//! the core.

use std::collections::HashMap;

use redmatch_types::{FailureReason, MatchResult};
use rust_decimal::Decimal;

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub total_fragments: u64,
    pub total_matched: Decimal,
    pub failures_by_reason: HashMap<FailureReason, usize>,
}

impl BatchSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results(results: &[MatchResult]) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        let mut failures_by_reason: HashMap<FailureReason, usize> = HashMap::new();
        for r in results {
            if let Some(reason) = r.failure_reason {
                *failures_by_reason.entry(reason).or_insert(0) += 1;
            }
        }
        Self {
            total,
            succeeded,
            failed: total - succeeded,
            success_rate: if total == 0 {
                0.0
            } else {
                succeeded as f64 / total as f64
            },
            total_fragments: results.iter().map(|r| u64::from(r.fragments_created)).sum(),
            total_matched: results.iter().map(|r| r.total_matched).sum(),
            failures_by_reason,
        }
    }
}
