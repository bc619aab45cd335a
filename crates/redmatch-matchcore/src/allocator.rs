//! Greedy single-demand allocator.
//!
//! The core allocation function: one demand against an ordered candidate
//! list, in memory, no I/O.
//!
//! ```text
//! allocate(demand, candidates_ascending) -> MatchResult
//! ```
//!
//! ## Why ascending order
//!
//! Consuming the smallest credit lines first drains near-exhausted lines
//! completely, converting existing small balances into zero instead of
//! carving new small balances out of large lines. Net effect: fewer
//! fragments than descending or unordered consumption.

use redmatch_types::{
    Allocation, CreditLine, Demand, EngineConfig, FailureReason, MatchResult,
};
use rust_decimal::Decimal;

/// Allocate one demand against candidates ordered ascending by remaining.
///
/// Walks the candidates taking `min(need, remaining)` from each until the
/// uncovered remainder drops to the tolerance ε. Succeeds iff the remainder
/// reaches ε; on failure every allocation computed in the pass is discarded
/// and `total_matched` is zero; partial coverage is never reported.
///
/// The caller owns all state: nothing here mutates the candidate list, and
/// calling twice with the same inputs yields identical results.
#[must_use]
pub fn allocate(demand: &Demand, candidates: &[CreditLine], cfg: &EngineConfig) -> MatchResult {
    if candidates.is_empty() {
        return MatchResult::failed(demand.id, FailureReason::NoCandidates);
    }

    let mut need = demand.amount;
    let mut allocations: Vec<Allocation> = Vec::new();
    let mut fragments_created: u32 = 0;

    for line in candidates {
        if need <= cfg.tolerance {
            break;
        }
        if line.remaining <= Decimal::ZERO {
            continue;
        }

        let amount_used = need.min(line.remaining);
        let remaining_after = line.remaining - amount_used;

        if remaining_after > Decimal::ZERO && remaining_after < cfg.fragment_threshold {
            fragments_created += 1;
        }

        allocations.push(Allocation {
            line_id: line.id,
            amount_used,
            remaining_after,
        });

        need -= amount_used;
    }

    if need <= cfg.tolerance {
        MatchResult::matched(demand.id, allocations, demand.amount - need, fragments_created)
    } else {
        MatchResult::failed(demand.id, FailureReason::InsufficientTotalAmount)
    }
}
