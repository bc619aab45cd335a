//! Scoped cache of per-key candidate fetches.
//!
//! Staleness is a deliberate, testable choice here: under
//! [`CachePolicy::ClearEachBatch`] every batch call starts from a cold
//! cache (the safe default, matching re-fetch-per-chunk semantics), while
//! [`CachePolicy::Ttl`] lets repeated small batches reuse fetches for a
//! bounded window. An entry only satisfies a lookup whose cap it covers;
//! a larger cap forces a re-fetch.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use redmatch_types::{CreditLine, GroupKey};

/// Invalidation policy for [`CandidateCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Drop everything at the start of each batch call.
    ClearEachBatch,
    /// Entries expire this long after insertion.
    Ttl(Duration),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    inserted_at: Instant,
    cap: i64,
    lines: Vec<CreditLine>,
}

/// Key -> candidate-list cache scoped to one engine instance.
#[derive(Debug)]
pub struct CandidateCache {
    policy: CachePolicy,
    entries: HashMap<GroupKey, CacheEntry>,
}

impl CandidateCache {
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Called by the engine at the start of every batch.
    pub fn begin_batch(&mut self) {
        if self.policy == CachePolicy::ClearEachBatch {
            self.entries.clear();
        }
    }

    /// Look up a key, honoring expiry and the requested cap. An expired
    /// entry is removed on the way out.
    #[must_use]
    pub fn get(&mut self, key: &GroupKey, cap: i64) -> Option<Vec<CreditLine>> {
        if let CachePolicy::Ttl(ttl) = self.policy {
            let expired = self
                .entries
                .get(key)
                .is_some_and(|e| e.inserted_at.elapsed() >= ttl);
            if expired {
                self.entries.remove(key);
                return None;
            }
        }
        let entry = self.entries.get(key)?;
        (entry.cap >= cap).then(|| entry.lines.clone())
    }

    pub fn insert(&mut self, key: GroupKey, cap: i64, lines: Vec<CreditLine>) {
        self.entries.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                cap,
                lines,
            },
        );
    }

    /// Explicit full invalidation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
