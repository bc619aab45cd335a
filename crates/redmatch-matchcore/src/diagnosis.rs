//! Post-hoc failure classification.
//!
//! The allocator itself only ever reports `NoCandidates` or
//! `InsufficientTotalAmount`. Diagnostic tooling refines failed demands
//! against the key's full candidate set: a demand that the pool could have
//! covered in total either drowned in fragments or lost to batch ordering.
//! These classifications are produced after the fact, never raised at
//! allocation time.

use redmatch_types::{constants, CreditLine, Demand, EngineConfig, FailureReason};
use rust_decimal::Decimal;

/// Share of a candidate set whose remaining balance sits strictly inside
/// `(0, fragment_threshold)`. Zero for an empty set.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fragmentation_score(candidates: &[CreditLine], threshold: Decimal) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    let fragments = candidates
        .iter()
        .filter(|c| c.is_fragment(threshold))
        .count();
    fragments as f64 / candidates.len() as f64
}

/// Classify why a demand went unserved, given the key's **full** candidate
/// set (not the capped window the optimizer saw).
///
/// - no candidates at all -> [`FailureReason::NoCandidates`]
/// - pool total short of the amount -> [`FailureReason::InsufficientTotalAmount`]
/// - pool sufficient but dominated by fragments -> [`FailureReason::FragmentationIssue`]
/// - pool sufficient and healthy -> [`FailureReason::GreedySuboptimal`]
///   (earlier demands under the chosen sort strategy consumed what this one
///   needed; a different strategy would have served it)
#[must_use]
pub fn classify_failure(
    demand: &Demand,
    candidates: &[CreditLine],
    cfg: &EngineConfig,
) -> FailureReason {
    if candidates.is_empty() {
        return FailureReason::NoCandidates;
    }

    let total: Decimal = candidates.iter().map(|c| c.remaining).sum();
    if total < demand.amount - cfg.tolerance {
        return FailureReason::InsufficientTotalAmount;
    }

    if fragmentation_score(candidates, cfg.fragment_threshold)
        >= constants::FRAGMENTATION_SEVERE_SHARE
    {
        FailureReason::FragmentationIssue
    } else {
        FailureReason::GreedySuboptimal
    }
}

#[cfg(test)]
mod tests {
    use redmatch_types::{GroupKey, PartyId};

    use super::*;

    fn key() -> GroupKey {
        GroupKey::new(13, PartyId::new(), PartyId::new())
    }

    fn lines(amounts_cents: &[i64]) -> Vec<CreditLine> {
        let k = key();
        amounts_cents
            .iter()
            .map(|n| CreditLine::dummy(k, Decimal::new(*n, 2)))
            .collect()
    }

    #[test]
    fn score_counts_only_strict_fragments() {
        let threshold = Decimal::new(5, 0);
        // 4.99 fragment, 5.00 not, 0.50 fragment, 100.00 not.
        let candidates = lines(&[499, 500, 50, 10_000]);
        let score = fragmentation_score(&candidates, threshold);
        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn score_of_empty_set_is_zero() {
        assert_eq!(fragmentation_score(&[], Decimal::new(5, 0)), 0.0);
    }

    #[test]
    fn empty_set_classifies_no_candidates() {
        let demand = Demand::dummy(key(), Decimal::new(100, 0));
        assert_eq!(
            classify_failure(&demand, &[], &EngineConfig::default()),
            FailureReason::NoCandidates
        );
    }

    #[test]
    fn short_pool_classifies_insufficient() {
        let demand = Demand::dummy(key(), Decimal::new(500, 0));
        let candidates = lines(&[10_000, 8_000, 5_000]); // 230.00 total
        assert_eq!(
            classify_failure(&demand, &candidates, &EngineConfig::default()),
            FailureReason::InsufficientTotalAmount
        );
    }

    #[test]
    fn fragmented_but_sufficient_pool_classifies_fragmentation() {
        let demand = Demand::dummy(key(), Decimal::new(20, 0));
        // 20.00 total across fragments below the 5.0 threshold.
        let candidates = lines(&[499, 499, 499, 499, 4]);
        assert_eq!(
            classify_failure(&demand, &candidates, &EngineConfig::default()),
            FailureReason::FragmentationIssue
        );
    }

    #[test]
    fn healthy_sufficient_pool_classifies_greedy_suboptimal() {
        // Pool covers the demand and is not fragment-dominated: the demand
        // must have lost to batch contention.
        let demand = Demand::dummy(key(), Decimal::new(100, 0));
        let candidates = lines(&[10_000, 5_000]);
        assert_eq!(
            classify_failure(&demand, &candidates, &EngineConfig::default()),
            FailureReason::GreedySuboptimal
        );
    }
}
