//! Demand model.
//!
//! A demand is one red-letter (negative) invoice amount that must be fully
//! covered by credit lines sharing its [`GroupKey`]. Demands are immutable
//! once submitted to a batch and single-use: one [`crate::MatchResult`] per
//! demand per batch run.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DemandId, GroupKey, RedmatchError, Result};

/// A red-letter invoice demand requiring full coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub id: DemandId,
    pub key: GroupKey,
    /// Requested amount, strictly positive.
    pub amount: Decimal,
    /// Optional priority for [`SortStrategy::PriorityDesc`]. Higher first.
    pub priority: i32,
}

impl Demand {
    #[must_use]
    pub fn new(id: DemandId, key: GroupKey, amount: Decimal) -> Self {
        Self {
            id,
            key,
            amount,
            priority: 0,
        }
    }

    /// Reject structurally invalid demands before they enter a batch.
    ///
    /// # Errors
    /// Returns [`RedmatchError::InvalidDemand`] if `amount` is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(RedmatchError::InvalidDemand {
                reason: format!("amount must be positive, got {}", self.amount),
            });
        }
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Demand {
    #[must_use]
    pub fn dummy(key: GroupKey, amount: Decimal) -> Self {
        Self::new(DemandId::new(), key, amount)
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Order in which the demands of one grouping key are served.
///
/// `AmountDesc` is the production default: serving the largest demand first
/// reduces the chance that small demands starve large ones of scarce large
/// credit lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    #[default]
    AmountDesc,
    AmountAsc,
    PriorityDesc,
    None,
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmountDesc => write!(f, "amount_desc"),
            Self::AmountAsc => write!(f, "amount_asc"),
            Self::PriorityDesc => write!(f, "priority_desc"),
            Self::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartyId;

    fn key() -> GroupKey {
        GroupKey::new(13, PartyId::new(), PartyId::new())
    }

    #[test]
    fn positive_amount_validates() {
        let d = Demand::dummy(key(), Decimal::new(100, 0));
        assert!(d.validate().is_ok());
    }

    #[test]
    fn non_positive_amount_rejected() {
        let zero = Demand::dummy(key(), Decimal::ZERO);
        assert!(matches!(
            zero.validate(),
            Err(RedmatchError::InvalidDemand { .. })
        ));

        let negative = Demand::dummy(key(), Decimal::new(-50, 0));
        assert!(negative.validate().is_err());
    }

    #[test]
    fn default_strategy_is_amount_desc() {
        assert_eq!(SortStrategy::default(), SortStrategy::AmountDesc);
    }

    #[test]
    fn strategy_display() {
        assert_eq!(SortStrategy::AmountDesc.to_string(), "amount_desc");
        assert_eq!(SortStrategy::PriorityDesc.to_string(), "priority_desc");
    }

    #[test]
    fn strategy_serde_uses_snake_case() {
        let json = serde_json::to_string(&SortStrategy::AmountAsc).unwrap();
        assert_eq!(json, "\"amount_asc\"");
        let back: SortStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SortStrategy::AmountAsc);
    }
}
