//! Credit line model.
//!
//! A credit line is one blue-invoice row with a consumable remaining
//! balance. The store owns these rows; everything the engine holds is a
//! transient snapshot that may go stale the moment a concurrent writer
//! commits; the conditional update at commit time is what decides.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{GroupKey, LineId};

/// Snapshot of a blue-invoice line with a consumable remaining balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    pub id: LineId,
    pub key: GroupKey,
    /// Remaining consumable balance, always >= 0.
    pub remaining: Decimal,
    /// Set by the store on every committed decrement.
    pub last_update: DateTime<Utc>,
}

impl CreditLine {
    #[must_use]
    pub fn new(id: LineId, key: GroupKey, remaining: Decimal) -> Self {
        Self {
            id,
            key,
            remaining,
            last_update: Utc::now(),
        }
    }

    /// Whether nothing consumable is left.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.remaining <= Decimal::ZERO
    }

    /// Whether the current remaining balance counts as a fragment:
    /// strictly between zero and the threshold.
    #[must_use]
    pub fn is_fragment(&self, threshold: Decimal) -> bool {
        self.remaining > Decimal::ZERO && self.remaining < threshold
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl CreditLine {
    #[must_use]
    pub fn dummy(key: GroupKey, remaining: Decimal) -> Self {
        Self::new(LineId::new(), key, remaining)
    }
}
