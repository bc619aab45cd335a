//! Local mutable view of one grouping key's candidates.
//!
//! Between fetch and commit, demands sharing a key must not double-spend a
//! credit line. [`GroupSnapshot`] keeps the fetched lines as an arena
//! indexed by id plus an overlay map of consumed amounts; applying a
//! successful demand's allocations updates the overlay, so the next demand
//! in the same key sees the decremented balances. Nothing here touches the
//! store; the snapshot is private to one batch call.

use std::collections::HashMap;

use redmatch_types::{Allocation, CreditLine, LineId};
use rust_decimal::Decimal;

/// Arena of one key's credit lines plus a per-batch consumption overlay.
#[derive(Debug, Default)]
pub struct GroupSnapshot {
    lines: Vec<CreditLine>,
    index: HashMap<LineId, usize>,
    consumed: HashMap<LineId, Decimal>,
}

impl GroupSnapshot {
    /// Build a snapshot over the fetched candidate lines.
    #[must_use]
    pub fn new(lines: Vec<CreditLine>) -> Self {
        let index = lines
            .iter()
            .enumerate()
            .map(|(i, line)| (line.id, i))
            .collect();
        Self {
            lines,
            index,
            consumed: HashMap::new(),
        }
    }

    /// Fetched remaining minus everything consumed so far in this batch.
    #[must_use]
    pub fn effective_remaining(&self, id: LineId) -> Option<Decimal> {
        let i = *self.index.get(&id)?;
        let used = self.consumed.get(&id).copied().unwrap_or(Decimal::ZERO);
        Some(self.lines[i].remaining - used)
    }

    /// Total consumed from one line across all demands applied so far.
    #[must_use]
    pub fn consumed(&self, id: LineId) -> Decimal {
        self.consumed.get(&id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Materialize the still-consumable candidates: effective remaining
    /// above the tolerance, re-sorted ascending by (remaining, id) so
    /// allocation order stays deterministic after overlay updates.
    #[must_use]
    pub fn available(&self, tolerance: Decimal) -> Vec<CreditLine> {
        let mut out: Vec<CreditLine> = self
            .lines
            .iter()
            .filter_map(|line| {
                let used = self.consumed.get(&line.id).copied().unwrap_or(Decimal::ZERO);
                let remaining = line.remaining - used;
                (remaining > tolerance).then(|| CreditLine {
                    remaining,
                    ..line.clone()
                })
            })
            .collect();
        out.sort_by(|a, b| (a.remaining, a.id).cmp(&(b.remaining, b.id)));
        out
    }

    /// Record a successful demand's allocations in the overlay.
    ///
    /// Callers only apply allocations produced against this snapshot's own
    /// `available()` view, so consumption can never exceed a line's fetched
    /// remaining.
    pub fn apply(&mut self, allocations: &[Allocation]) {
        for alloc in allocations {
            let total = self
                .consumed
                .get(&alloc.line_id)
                .copied()
                .unwrap_or(Decimal::ZERO)
                + alloc.amount_used;
            debug_assert!(
                self.index
                    .get(&alloc.line_id)
                    .is_none_or(|i| self.lines[*i].remaining >= total),
                "overlay consumed more than fetched remaining"
            );
            self.consumed.insert(alloc.line_id, total);
        }
    }

    /// Number of lines in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
