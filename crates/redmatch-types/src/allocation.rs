//! Allocation outcome model.
//!
//! A [`MatchResult`] is the per-demand outcome of one batch run. Results are
//! ephemeral: the engine returns them to the caller and never persists them
//! itself. The [`FailureReason`] strings are a contract with downstream
//! report tooling and must stay stable.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DemandId, LineId};

/// One slice carved out of a credit line for a demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub line_id: LineId,
    /// Amount consumed; never exceeds the line's remaining at allocation time.
    pub amount_used: Decimal,
    /// `prior_remaining - amount_used`, always >= 0.
    pub remaining_after: Decimal,
}

impl Allocation {
    /// Whether this allocation left a fragment behind: a remainder strictly
    /// between zero and the threshold.
    #[must_use]
    pub fn is_fragment(&self, threshold: Decimal) -> bool {
        self.remaining_after > Decimal::ZERO && self.remaining_after < threshold
    }
}

/// Why a demand could not be covered.
///
/// Closed enum so exhaustiveness is compiler-checked; the serialized form
/// keeps the legacy wire strings consumed by report tooling.
/// `FragmentationIssue` and `GreedySuboptimal` are diagnostic
/// classifications produced after the fact: the allocator itself only ever
/// reports `NoCandidates` or `InsufficientTotalAmount`, and the pipeline
/// adds `ConcurrentConflict` at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    NoCandidates,
    InsufficientTotalAmount,
    FragmentationIssue,
    ConcurrentConflict,
    GreedySuboptimal,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCandidates => write!(f, "NO_CANDIDATES"),
            Self::InsufficientTotalAmount => write!(f, "INSUFFICIENT_TOTAL_AMOUNT"),
            Self::FragmentationIssue => write!(f, "FRAGMENTATION_ISSUE"),
            Self::ConcurrentConflict => write!(f, "CONCURRENT_CONFLICT"),
            Self::GreedySuboptimal => write!(f, "GREEDY_SUBOPTIMAL"),
        }
    }
}

/// Per-demand outcome of a batch run.
///
/// Invariants:
/// - success implies `total_matched` equals the demand amount within the
///   configured tolerance and `failure_reason` is `None`;
/// - failure implies empty `allocations`, zero `total_matched`, zero
///   `fragments_created`, and a `failure_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub demand_id: DemandId,
    pub success: bool,
    /// Ordered as consumed (ascending remaining), empty unless success.
    pub allocations: Vec<Allocation>,
    pub total_matched: Decimal,
    pub fragments_created: u32,
    pub failure_reason: Option<FailureReason>,
}

impl MatchResult {
    /// Successful outcome.
    #[must_use]
    pub fn matched(
        demand_id: DemandId,
        allocations: Vec<Allocation>,
        total_matched: Decimal,
        fragments_created: u32,
    ) -> Self {
        Self {
            demand_id,
            success: true,
            allocations,
            total_matched,
            fragments_created,
            failure_reason: None,
        }
    }

    /// Failed outcome. Any allocations computed along the way are
    /// discarded; no partial credit is ever reported for a failed demand.
    #[must_use]
    pub fn failed(demand_id: DemandId, reason: FailureReason) -> Self {
        Self {
            demand_id,
            success: false,
            allocations: Vec::new(),
            total_matched: Decimal::ZERO,
            fragments_created: 0,
            failure_reason: Some(reason),
        }
    }

    /// Flatten this result into store-ready audit entries.
    #[must_use]
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.allocations
            .iter()
            .map(|a| AuditEntry {
                demand_id: self.demand_id,
                line_id: a.line_id,
                amount_used: a.amount_used,
            })
            .collect()
    }
}

/// One flattened allocation row as submitted to the store's commit: the
/// compare-and-decrement target plus the audit trail columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub demand_id: DemandId,
    pub line_id: LineId,
    pub amount_used: Decimal,
}
