//! Grouped batch allocation.
//!
//! Demands are partitioned by grouping key; each key's demands run against
//! one shared [`GroupSnapshot`] so nothing is double-spent before commit.
//! Results land at their original input indices regardless of the internal
//! processing order; callers see one result per demand, index-aligned.

use std::collections::HashMap;

use redmatch_types::{
    CreditLine, Demand, EngineConfig, FailureReason, GroupKey, MatchResult, SortStrategy,
};
use tracing::debug;

use crate::allocator::allocate;
use crate::snapshot::GroupSnapshot;

/// Partition demand indices by grouping key. Order within each bucket
/// follows input order; strategy sorting happens per key at allocation time.
#[must_use]
pub fn partition_by_key(demands: &[Demand]) -> HashMap<GroupKey, Vec<usize>> {
    let mut groups: HashMap<GroupKey, Vec<usize>> = HashMap::new();
    for (i, demand) in demands.iter().enumerate() {
        groups.entry(demand.key).or_default().push(i);
    }
    groups
}

fn sort_indices(indices: &mut [usize], demands: &[Demand], strategy: SortStrategy) {
    match strategy {
        SortStrategy::AmountDesc => {
            indices.sort_by(|&a, &b| demands[b].amount.cmp(&demands[a].amount));
        }
        SortStrategy::AmountAsc => {
            indices.sort_by(|&a, &b| demands[a].amount.cmp(&demands[b].amount));
        }
        SortStrategy::PriorityDesc => {
            indices.sort_by(|&a, &b| {
                (demands[b].priority, demands[b].amount).cmp(&(demands[a].priority, demands[a].amount))
            });
        }
        SortStrategy::None => {}
    }
}

/// Allocate a batch of demands against pre-fetched candidates.
///
/// Pure core of the grouping optimizer: the caller has already fetched one
/// candidate list per distinct key (keys absent from `candidates_by_key`,
/// or mapped to an empty list, fail every demand in that key with
/// [`FailureReason::NoCandidates`] without invoking the allocator).
///
/// Per key, demands run in `strategy` order against a shared snapshot;
/// each success is applied to the snapshot before the next demand so the
/// sum drawn from any single line never exceeds its fetched remaining.
#[must_use]
pub fn allocate_grouped(
    demands: &[Demand],
    candidates_by_key: &HashMap<GroupKey, Vec<CreditLine>>,
    strategy: SortStrategy,
    cfg: &EngineConfig,
) -> Vec<MatchResult> {
    let mut results: Vec<MatchResult> = demands
        .iter()
        .map(|d| MatchResult::failed(d.id, FailureReason::NoCandidates))
        .collect();

    for (key, mut indices) in partition_by_key(demands) {
        let Some(candidates) = candidates_by_key.get(&key).filter(|c| !c.is_empty()) else {
            debug!(%key, demands = indices.len(), "no candidates for key");
            continue;
        };

        sort_indices(&mut indices, demands, strategy);
        let mut snapshot = GroupSnapshot::new(candidates.clone());

        for i in indices {
            let demand = &demands[i];
            let view = snapshot.available(cfg.tolerance);
            let result = allocate(demand, &view, cfg);
            if result.success {
                snapshot.apply(&result.allocations);
            }
            debug!(
                demand = %demand.id,
                success = result.success,
                amount = %demand.amount,
                "allocated demand"
            );
            results[i] = result;
        }
    }

    results
}
