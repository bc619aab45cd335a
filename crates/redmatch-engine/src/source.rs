//! Candidate source seam.
//!
//! The engine consumes candidates through this trait; the store crate (or
//! any caller-provided fixture) implements it. Results should arrive
//! ordered ascending by remaining, but the engine re-sorts after fetch, so
//! an implementation that cannot guarantee ordering is still correct.

use std::collections::HashMap;

use async_trait::async_trait;
use redmatch_types::{CreditLine, GroupKey, Result};

/// Read access to the shared pool of credit lines.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Fetch up to `limit` consumable lines (`remaining > 0`) for one key.
    async fn fetch_by_key(&self, key: &GroupKey, limit: i64) -> Result<Vec<CreditLine>>;

    /// Fetch candidates for many keys, each with its own cap.
    ///
    /// Sources backed by a database should override this with a single
    /// round-trip carrying all keys; the default falls back to one
    /// `fetch_by_key` call per key. Keys with no consumable lines may be
    /// omitted from the returned map.
    async fn fetch_by_keys(
        &self,
        requests: &[(GroupKey, i64)],
    ) -> Result<HashMap<GroupKey, Vec<CreditLine>>> {
        let mut out = HashMap::with_capacity(requests.len());
        for (key, limit) in requests {
            out.insert(*key, self.fetch_by_key(key, *limit).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use redmatch_types::PartyId;
    use rust_decimal::Decimal;

    use super::*;

    /// Minimal fixture implementing only the required method.
    struct FixedSource {
        lines: Vec<CreditLine>,
    }

    #[async_trait]
    impl CandidateSource for FixedSource {
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

    #[tokio::test]
    async fn default_multi_key_fetch_loops_per_key() {
        let k1 = GroupKey::new(13, PartyId::new(), PartyId::new());
        let k2 = GroupKey::new(6, PartyId::new(), PartyId::new());
        let source = FixedSource {
            lines: vec![
                CreditLine::dummy(k1, Decimal::new(100, 0)),
                CreditLine::dummy(k1, Decimal::new(50, 0)),
                CreditLine::dummy(k2, Decimal::new(75, 0)),
            ],
        };

        let fetched = source
            .fetch_by_keys(&[(k1, 10), (k2, 10)])
            .await
            .unwrap();
        assert_eq!(fetched[&k1].len(), 2);
        assert_eq!(fetched[&k2].len(), 1);
        // Per-key ordering survives the default fan-out.
        assert_eq!(fetched[&k1][0].remaining, Decimal::new(50, 0));
    }

    #[tokio::test]
    async fn per_key_cap_applies_independently() {
        let k1 = GroupKey::new(13, PartyId::new(), PartyId::new());
        let source = FixedSource {
            lines: (1..=5)
                .map(|n| CreditLine::dummy(k1, Decimal::new(n * 10, 0)))
                .collect(),
        };

        let fetched = source.fetch_by_keys(&[(k1, 3)]).await.unwrap();
        assert_eq!(fetched[&k1].len(), 3);
        // The cap keeps the smallest lines (ascending order).
        assert_eq!(fetched[&k1][2].remaining, Decimal::new(30, 0));
    }
}
