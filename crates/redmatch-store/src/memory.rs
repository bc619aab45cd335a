//! In-memory store with conditional-update commit semantics.
//!
//! Behaves exactly like the SQL path so integration tests exercise the
//! real protocol: a commit validates every compare-and-decrement against a
//! working copy first and applies nothing unless all of them hold. Helpers
//! expose enough state for tests to simulate a concurrent writer (an
//! external decrement between fetch and commit) and to verify
//! conservation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use redmatch_engine::{AllocationStore, CandidateSource};
use redmatch_types::{
    AuditEntry, BatchId, CreditLine, GroupKey, LineId, RedmatchError, Result,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::digest::commit_digest;

#[derive(Debug, Default)]
struct Inner {
    lines: HashMap<LineId, CreditLine>,
    audit: Vec<(BatchId, AuditEntry)>,
    digests: Vec<(BatchId, [u8; 32])>,
}

/// Shared in-process pool of credit lines.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one credit line.
    pub async fn insert_line(&self, line: CreditLine) {
        self.inner.write().await.lines.insert(line.id, line);
    }

    /// Bulk-seed credit lines.
    pub async fn seed<I>(&self, lines: I)
    where
        I: IntoIterator<Item = CreditLine>,
    {
        let mut inner = self.inner.write().await;
        for line in lines {
            inner.lines.insert(line.id, line);
        }
    }

    /// Current snapshot of one line.
    pub async fn line(&self, id: LineId) -> Option<CreditLine> {
        self.inner.read().await.lines.get(&id).cloned()
    }

    /// Sum of remaining balances for a key, for conservation checks.
    pub async fn total_remaining(&self, key: &GroupKey) -> Decimal {
        self.inner
            .read()
            .await
            .lines
            .values()
            .filter(|l| l.key == *key)
            .map(|l| l.remaining)
            .sum()
    }

    /// Overwrite one line's remaining balance, as an external writer
    /// (invoice issuance, another allocator instance) would.
    pub async fn set_remaining(&self, id: LineId, remaining: Decimal) -> bool {
        let mut inner = self.inner.write().await;
        match inner.lines.get_mut(&id) {
            Some(line) => {
                line.remaining = remaining;
                line.last_update = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Number of audit entries written across all commits.
    pub async fn audit_len(&self) -> usize {
        self.inner.read().await.audit.len()
    }

    /// Audit entries recorded under one batch tag, in commit order.
    pub async fn audit_for_batch(&self, batch: BatchId) -> Vec<AuditEntry> {
        self.inner
            .read()
            .await
            .audit
            .iter()
            .filter(|(b, _)| *b == batch)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Digests recorded under one batch tag, one per commit call.
    pub async fn digests_for_batch(&self, batch: BatchId) -> Vec<[u8; 32]> {
        self.inner
            .read()
            .await
            .digests
            .iter()
            .filter(|(b, _)| *b == batch)
            .map(|(_, d)| *d)
            .collect()
    }
}

#[async_trait]
impl CandidateSource for MemoryStore {
    async fn fetch_by_key(&self, key: &GroupKey, limit: i64) -> Result<Vec<CreditLine>> {
        let inner = self.inner.read().await;
        let mut out: Vec<CreditLine> = inner
            .lines
            .values()
            .filter(|l| l.key == *key && l.remaining > Decimal::ZERO)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.remaining, a.id).cmp(&(b.remaining, b.id)));
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }
}

#[async_trait]
impl AllocationStore for MemoryStore {
    async fn commit(&self, entries: &[AuditEntry], batch: BatchId) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.write().await;

        // Validate every decrement against a working copy; the same line
        // may appear in several entries, so decrements chain.
        let mut working: HashMap<LineId, Decimal> = HashMap::new();
        let mut conflicting: Vec<LineId> = Vec::new();
        for entry in entries {
            let current = match working.get(&entry.line_id) {
                Some(v) => *v,
                None => match inner.lines.get(&entry.line_id) {
                    Some(line) => line.remaining,
                    None => {
                        conflicting.push(entry.line_id);
                        continue;
                    }
                },
            };
            if current < entry.amount_used {
                conflicting.push(entry.line_id);
            } else {
                working.insert(entry.line_id, current - entry.amount_used);
            }
        }

        if !conflicting.is_empty() {
            conflicting.sort();
            conflicting.dedup();
            warn!(
                %batch,
                conflicting = conflicting.len(),
                "conditional update failed, rolling back"
            );
            return Err(RedmatchError::ConcurrentConflict { conflicting });
        }

        // All conditions held: apply decrements and the audit trail.
        let now = Utc::now();
        for (line_id, remaining) in working {
            if let Some(line) = inner.lines.get_mut(&line_id) {
                line.remaining = remaining;
                line.last_update = now;
            }
        }
        inner
            .audit
            .extend(entries.iter().map(|e| (batch, e.clone())));
        inner.digests.push((batch, commit_digest(batch, entries)));

        debug!(%batch, entries = entries.len(), "commit applied");
        Ok(entries.len() as u64)
    }
}
