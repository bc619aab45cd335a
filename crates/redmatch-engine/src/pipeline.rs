//! End-to-end match pipeline: allocate, then commit, chunk by chunk.
//!
//! The store's commit is all-or-nothing: one contested credit line rolls
//! back the whole call, including allocations that did not individually
//! conflict. Rather than discarding the entire chunk, the pipeline demotes
//! only the demands whose allocations touch a conflicting line (they fail
//! with `CONCURRENT_CONFLICT`) and retries the commit once with the
//! remainder; a second conflict demotes every still-successful demand in
//! the chunk. Either way each demand yields exactly one result.

use std::collections::HashSet;

use redmatch_types::{
    AuditEntry, BatchId, Demand, EngineConfig, FailureReason, LineId, MatchResult,
    RedmatchError, Result, SortStrategy,
};
use tracing::{info, warn};

use crate::optimizer::BatchEngine;
use crate::sink::AllocationStore;
use crate::source::CandidateSource;

/// What one pipeline run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Audit tag stamped on every committed allocation of this run.
    pub batch: BatchId,
    /// One result per input demand, index-aligned.
    pub results: Vec<MatchResult>,
    /// Conditional decrements actually applied across all chunk commits.
    pub committed_entries: u64,
}

/// Allocate-and-commit driver over a [`BatchEngine`].
#[derive(Debug)]
pub struct MatchPipeline {
    engine: BatchEngine,
}

impl MatchPipeline {
    #[must_use]
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            engine: BatchEngine::new(cfg),
        }
    }

    #[must_use]
    pub fn with_engine(engine: BatchEngine) -> Self {
        Self { engine }
    }

    /// Run the full flow: chunk, allocate, commit, repeat.
    ///
    /// Commits happen per chunk, so credits consumed by one chunk are
    /// visible to later chunks through the store.
    ///
    /// # Errors
    /// Propagates validation, source, and non-conflict store errors;
    /// conflicts are absorbed into per-demand results.
    pub async fn run<S, P>(
        &mut self,
        demands: &[Demand],
        source: &S,
        store: &P,
        strategy: SortStrategy,
    ) -> Result<PipelineOutcome>
    where
        S: CandidateSource + ?Sized,
        P: AllocationStore + ?Sized,
    {
        let batch = BatchId::new();
        let chunk_size = if demands.len() < self.engine.config().stream_threshold {
            demands.len().max(1)
        } else {
            self.engine.config().chunk_size.max(1)
        };

        let mut results = Vec::with_capacity(demands.len());
        let mut committed_entries: u64 = 0;

        for chunk in demands.chunks(chunk_size) {
            let mut chunk_results = self.engine.allocate_batch(chunk, source, strategy).await?;
            committed_entries += Self::commit_chunk(&mut chunk_results, store, batch).await?;
            results.extend(chunk_results);
        }

        info!(
            %batch,
            demands = demands.len(),
            succeeded = results.iter().filter(|r| r.success).count(),
            committed_entries,
            "pipeline run complete"
        );
        Ok(PipelineOutcome {
            batch,
            results,
            committed_entries,
        })
    }

    fn pending_entries(results: &[MatchResult]) -> Vec<AuditEntry> {
        results
            .iter()
            .filter(|r| r.success)
            .flat_map(MatchResult::audit_entries)
            .collect()
    }

    fn demote_conflicting(results: &mut [MatchResult], conflicting: &HashSet<LineId>) {
        for result in results.iter_mut() {
            if result.success
                && result
                    .allocations
                    .iter()
                    .any(|a| conflicting.contains(&a.line_id))
            {
                *result = MatchResult::failed(result.demand_id, FailureReason::ConcurrentConflict);
            }
        }
    }

    async fn commit_chunk<P>(
        results: &mut [MatchResult],
        store: &P,
        batch: BatchId,
    ) -> Result<u64>
    where
        P: AllocationStore + ?Sized,
    {
        let entries = Self::pending_entries(results);
        if entries.is_empty() {
            return Ok(0);
        }

        match store.commit(&entries, batch).await {
            Ok(n) => Ok(n),
            Err(RedmatchError::ConcurrentConflict { conflicting }) => {
                warn!(
                    %batch,
                    conflicting = conflicting.len(),
                    "commit conflict, retrying without contested demands"
                );
                let contested: HashSet<LineId> = conflicting.into_iter().collect();
                Self::demote_conflicting(results, &contested);

                let retry = Self::pending_entries(results);
                if retry.is_empty() {
                    return Ok(0);
                }
                match store.commit(&retry, batch).await {
                    Ok(n) => Ok(n),
                    Err(RedmatchError::ConcurrentConflict { conflicting }) => {
                        warn!(%batch, "second conflict, failing remaining chunk successes");
                        let all: HashSet<LineId> = results
                            .iter()
                            .flat_map(|r| r.allocations.iter().map(|a| a.line_id))
                            .chain(conflicting)
                            .collect();
                        Self::demote_conflicting(results, &all);
                        Ok(0)
                    }
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use redmatch_types::{CreditLine, GroupKey, PartyId};
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::*;
    use crate::source::CandidateSource;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    struct PoolSource {
        lines: Vec<CreditLine>,
    }

    #[async_trait]
    impl CandidateSource for PoolSource {
        async fn fetch_by_key(&self, key: &GroupKey, limit: i64) -> Result<Vec<CreditLine>> {
            let mut out: Vec<CreditLine> = self
                .lines
                .iter()
                .filter(|l| l.key == *key && l.remaining > Decimal::ZERO)
                .cloned()
                .collect();
            out.sort_by(|a, b| (a.remaining, a.id).cmp(&(b.remaining, b.id)));
            out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(out)
        }
    }

    /// Store fixture: each commit call consumes the next script slot; a
    /// non-empty slot conflicts on its intersection with the submitted
    /// lines. Records what finally lands.
    struct ScriptedStore {
        script: Mutex<std::collections::VecDeque<Vec<LineId>>>,
        committed: Mutex<Vec<AuditEntry>>,
        calls: AtomicUsize,
    }

    impl ScriptedStore {
        fn clean() -> Self {
            Self::scripted(Vec::new())
        }

        fn scripted(script: Vec<Vec<LineId>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                committed: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AllocationStore for ScriptedStore {
        async fn commit(&self, entries: &[AuditEntry], _batch: BatchId) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(contested) = self.script.lock().await.pop_front() {
                let conflicting: Vec<LineId> = entries
                    .iter()
                    .map(|e| e.line_id)
                    .filter(|id| contested.contains(id))
                    .collect();
                if !conflicting.is_empty() {
                    return Err(RedmatchError::ConcurrentConflict { conflicting });
                }
            }
            self.committed.lock().await.extend(entries.iter().cloned());
            Ok(entries.len() as u64)
        }
    }

    fn pool(key: GroupKey, amounts: &[i64]) -> Vec<CreditLine> {
        amounts.iter().map(|n| CreditLine::dummy(key, dec(*n))).collect()
    }

    #[tokio::test]
    async fn clean_run_commits_everything() {
        let key = GroupKey::new(13, PartyId::new(), PartyId::new());
        let source = PoolSource {
            lines: pool(key, &[500, 300, 200]),
        };
        let store = ScriptedStore::clean();
        let demands = vec![Demand::dummy(key, dec(1_000))];

        let mut pipeline = MatchPipeline::new(EngineConfig::default());
        let outcome = pipeline
            .run(&demands, &source, &store, SortStrategy::AmountDesc)
            .await
            .unwrap();

        assert!(outcome.results[0].success);
        assert_eq!(outcome.committed_entries, 3);
        assert_eq!(store.committed.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn failures_produce_no_commit_call() {
        let key = GroupKey::new(13, PartyId::new(), PartyId::new());
        let source = PoolSource { lines: Vec::new() };
        let store = ScriptedStore::clean();
        let demands = vec![Demand::dummy(key, dec(100))];

        let mut pipeline = MatchPipeline::new(EngineConfig::default());
        let outcome = pipeline
            .run(&demands, &source, &store, SortStrategy::AmountDesc)
            .await
            .unwrap();

        assert!(!outcome.results[0].success);
        assert_eq!(outcome.committed_entries, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn conflict_demotes_contested_demand_and_retries_rest() {
        let k1 = GroupKey::new(13, PartyId::new(), PartyId::new());
        let k2 = GroupKey::new(6, PartyId::new(), PartyId::new());
        let contested_line = CreditLine::dummy(k1, dec(100));
        let contested_id = contested_line.id;
        let source = PoolSource {
            lines: vec![contested_line, CreditLine::dummy(k2, dec(100))],
        };
        let store = ScriptedStore::scripted(vec![vec![contested_id]]);
        let demands = vec![Demand::dummy(k1, dec(80)), Demand::dummy(k2, dec(80))];

        let mut pipeline = MatchPipeline::new(EngineConfig::default());
        let outcome = pipeline
            .run(&demands, &source, &store, SortStrategy::AmountDesc)
            .await
            .unwrap();

        assert!(!outcome.results[0].success);
        assert_eq!(
            outcome.results[0].failure_reason,
            Some(FailureReason::ConcurrentConflict)
        );
        assert!(outcome.results[1].success, "uncontested demand retried");
        assert_eq!(outcome.committed_entries, 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_conflict_fails_the_remaining_chunk() {
        // Three demands in three independent keys; the first commit
        // conflicts on line 1, the retry on line 2. Line 3 never conflicted
        // but falls with the chunk.
        let keys: Vec<GroupKey> = (0..3i16)
            .map(|i| GroupKey::new(i, PartyId::new(), PartyId::new()))
            .collect();
        let lines: Vec<CreditLine> = keys
            .iter()
            .map(|k| CreditLine::dummy(*k, dec(100)))
            .collect();
        let ids: Vec<LineId> = lines.iter().map(|l| l.id).collect();
        let source = PoolSource { lines };
        let store = ScriptedStore::scripted(vec![vec![ids[0]], vec![ids[1]]]);
        let demands: Vec<Demand> = keys.iter().map(|k| Demand::dummy(*k, dec(90))).collect();

        let mut pipeline = MatchPipeline::new(EngineConfig::default());
        let outcome = pipeline
            .run(&demands, &source, &store, SortStrategy::AmountDesc)
            .await
            .unwrap();

        assert!(outcome.results.iter().all(|r| !r.success));
        assert!(
            outcome
                .results
                .iter()
                .all(|r| r.failure_reason == Some(FailureReason::ConcurrentConflict))
        );
        assert_eq!(outcome.committed_entries, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_demand_set_is_a_no_op() {
        let source = PoolSource { lines: Vec::new() };
        let store = ScriptedStore::clean();
        let mut pipeline = MatchPipeline::new(EngineConfig::default());
        let outcome = pipeline
            .run(&[], &source, &store, SortStrategy::AmountDesc)
            .await
            .unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.committed_entries, 0);
    }

    #[tokio::test]
    async fn large_runs_commit_per_chunk() {
        let key = GroupKey::new(13, PartyId::new(), PartyId::new());
        let source = PoolSource {
            lines: (0..20).map(|_| CreditLine::dummy(key, dec(1_000_000))).collect(),
        };
        let store = ScriptedStore::clean();
        let demands: Vec<Demand> = (0..60).map(|_| Demand::dummy(key, dec(10))).collect();

        let cfg = EngineConfig {
            stream_threshold: 50,
            chunk_size: 25,
            ..EngineConfig::default()
        };
        let mut pipeline = MatchPipeline::with_engine(BatchEngine::new(cfg));
        let outcome = pipeline
            .run(&demands, &source, &store, SortStrategy::AmountDesc)
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 60);
        assert!(outcome.results.iter().all(|r| r.success));
        // 60 demands / 25 per chunk -> one commit per chunk.
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }
}
