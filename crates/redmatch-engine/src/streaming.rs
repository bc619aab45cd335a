//! Streaming controller for very large demand sets.
//!
//! Grouping and sorting are O(n log n) and candidate snapshots are held per
//! key per chunk; capping the chunk size bounds the peak resident working
//! set regardless of total demand volume. Chunks run sequentially and do
//! not share snapshots; each chunk re-fetches from the source, so credits
//! consumed by one chunk are visible to later ones only through whatever
//! has been committed in between.

use redmatch_types::{Demand, MatchResult, Result, SortStrategy};
use tracing::info;

use crate::optimizer::BatchEngine;
use crate::source::CandidateSource;

impl BatchEngine {
    /// Allocate an arbitrarily large demand set with bounded memory.
    ///
    /// Below the configured stream threshold this is exactly
    /// [`BatchEngine::allocate_batch`]; above it, demands are processed in
    /// sequential chunks and the results concatenated in input order.
    ///
    /// # Errors
    /// Propagates validation and source errors from the underlying batch
    /// calls.
    pub async fn allocate_large<S>(
        &mut self,
        demands: &[Demand],
        source: &S,
        strategy: SortStrategy,
    ) -> Result<Vec<MatchResult>>
    where
        S: CandidateSource + ?Sized,
    {
        if demands.len() < self.config().stream_threshold {
            return self.allocate_batch(demands, source, strategy).await;
        }

        let chunk_size = self.config().chunk_size.max(1);
        let chunks = demands.len().div_ceil(chunk_size);
        info!(
            demands = demands.len(),
            chunk_size, chunks, "streaming large demand set"
        );

        let mut results = Vec::with_capacity(demands.len());
        for chunk in demands.chunks(chunk_size) {
            let chunk_results = self.allocate_batch(chunk, source, strategy).await?;
            results.extend(chunk_results);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use redmatch_types::{CreditLine, EngineConfig, GroupKey, PartyId};
    use rust_decimal::Decimal;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    struct DeepSource {
        key: GroupKey,
        multi_calls: AtomicUsize,
    }

    #[async_trait]
    impl CandidateSource for DeepSource {
        async fn fetch_by_key(
            &self,
            key: &GroupKey,
            _limit: i64,
        ) -> Result<Vec<CreditLine>> {
            // A pool deep enough that every chunk's demands are coverable.
            Ok(if *key == self.key {
                (0..50)
                    .map(|_| CreditLine::dummy(self.key, dec(1_000_000)))
                    .collect()
            } else {
                Vec::new()
            })
        }

        async fn fetch_by_keys(
            &self,
            requests: &[(GroupKey, i64)],
        ) -> Result<HashMap<GroupKey, Vec<CreditLine>>> {
            self.multi_calls.fetch_add(1, Ordering::SeqCst);
            let mut out = HashMap::new();
            for (key, limit) in requests {
                out.insert(*key, self.fetch_by_key(key, *limit).await?);
            }
            Ok(out)
        }
    }

    fn small_stream_config() -> EngineConfig {
        EngineConfig {
            stream_threshold: 100,
            chunk_size: 40,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn below_threshold_is_a_single_batch() {
        let key = GroupKey::new(13, PartyId::new(), PartyId::new());
        let source = DeepSource {
            key,
            multi_calls: AtomicUsize::new(0),
        };
        let demands: Vec<Demand> = (0..99).map(|_| Demand::dummy(key, dec(10))).collect();

        let mut engine = BatchEngine::new(small_stream_config());
        let results = engine
            .allocate_large(&demands, &source, SortStrategy::AmountDesc)
            .await
            .unwrap();

        assert_eq!(results.len(), 99);
        assert_eq!(source.multi_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn above_threshold_chunks_and_refetches() {
        let key = GroupKey::new(13, PartyId::new(), PartyId::new());
        let source = DeepSource {
            key,
            multi_calls: AtomicUsize::new(0),
        };
        let demands: Vec<Demand> = (0..100).map(|_| Demand::dummy(key, dec(10))).collect();

        let mut engine = BatchEngine::new(small_stream_config());
        let results = engine
            .allocate_large(&demands, &source, SortStrategy::AmountDesc)
            .await
            .unwrap();

        assert_eq!(results.len(), 100);
        assert!(results.iter().all(|r| r.success));
        // 100 demands / 40 per chunk -> 3 chunks, one fetch each.
        assert_eq!(source.multi_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn chunked_results_keep_input_order() {
        let key = GroupKey::new(13, PartyId::new(), PartyId::new());
        let source = DeepSource {
            key,
            multi_calls: AtomicUsize::new(0),
        };
        let demands: Vec<Demand> = (0..120).map(|_| Demand::dummy(key, dec(10))).collect();

        let mut engine = BatchEngine::new(small_stream_config());
        let results = engine
            .allocate_large(&demands, &source, SortStrategy::AmountDesc)
            .await
            .unwrap();

        for (demand, result) in demands.iter().zip(&results) {
            assert_eq!(demand.id, result.demand_id);
        }
    }
}
