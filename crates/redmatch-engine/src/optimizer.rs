//! Grouping optimizer.
//!
//! Amortizes store round-trips across many demands sharing a key: the
//! demand set is partitioned by grouping key, each distinct key gets a
//! dynamically sized candidate cap, and all cache-missed keys are fetched
//! in **one** multi-key round-trip. Allocation itself is delegated to the
//! pure matchcore.

use std::collections::HashMap;

use redmatch_matchcore::{allocate_grouped, partition_by_key};
use redmatch_types::{
    CreditLine, Demand, EngineConfig, GroupKey, MatchResult, Result, SortStrategy,
};
use tracing::{debug, info};

use crate::cache::{CachePolicy, CandidateCache};
use crate::source::CandidateSource;

/// The grouping optimizer: one engine instance per worker.
#[derive(Debug)]
pub struct BatchEngine {
    cfg: EngineConfig,
    cache: CandidateCache,
}

impl BatchEngine {
    /// Engine with the safe cache default ([`CachePolicy::ClearEachBatch`]).
    #[must_use]
    pub fn new(cfg: EngineConfig) -> Self {
        Self::with_cache_policy(cfg, CachePolicy::ClearEachBatch)
    }

    #[must_use]
    pub fn with_cache_policy(cfg: EngineConfig, policy: CachePolicy) -> Self {
        Self {
            cfg,
            cache: CandidateCache::new(policy),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Allocate a batch of demands, index-aligned with the input.
    ///
    /// Per-demand failures are local: the returned list mixes successes
    /// and failures and always has one entry per demand. Only structural
    /// problems (invalid demand, source failure) abort the call.
    ///
    /// # Errors
    /// Returns an error if any demand fails validation or the candidate
    /// source fails.
    pub async fn allocate_batch<S>(
        &mut self,
        demands: &[Demand],
        source: &S,
        strategy: SortStrategy,
    ) -> Result<Vec<MatchResult>>
    where
        S: CandidateSource + ?Sized,
    {
        for demand in demands {
            demand.validate()?;
        }

        self.cache.begin_batch();

        let groups = partition_by_key(demands);
        let mut candidates_by_key: HashMap<GroupKey, Vec<CreditLine>> =
            HashMap::with_capacity(groups.len());
        let mut misses: Vec<(GroupKey, i64)> = Vec::new();

        for (key, indices) in &groups {
            let cap = self.cfg.candidate_cap(indices.len());
            match self.cache.get(key, cap) {
                Some(lines) => {
                    candidates_by_key.insert(*key, lines);
                }
                None => misses.push((*key, cap)),
            }
        }

        if !misses.is_empty() {
            debug!(
                keys = misses.len(),
                cached = candidates_by_key.len(),
                "fetching candidates"
            );
            let mut fetched = source.fetch_by_keys(&misses).await?;
            for (key, cap) in &misses {
                let mut lines = fetched.remove(key).unwrap_or_default();
                // Sources may return unsorted rows; allocation depends on
                // ascending order.
                lines.sort_by(|a, b| (a.remaining, a.id).cmp(&(b.remaining, b.id)));
                self.cache.insert(*key, *cap, lines.clone());
                candidates_by_key.insert(*key, lines);
            }
        }

        let results = allocate_grouped(demands, &candidates_by_key, strategy, &self.cfg);

        info!(
            demands = demands.len(),
            keys = groups.len(),
            succeeded = results.iter().filter(|r| r.success).count(),
            %strategy,
            "batch allocated"
        );
        Ok(results)
    }
}
