//! Identifiers used throughout RedMatch.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting. The
//! [`GroupKey`] is not an identity but the exact-match scope tuple that
//! decides which credit lines a demand may draw from.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// LineId
// ---------------------------------------------------------------------------

/// Unique identifier for a blue-invoice credit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LineId(pub Uuid);

impl LineId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Extract the embedded timestamp (milliseconds since UNIX epoch) from UUIDv7.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        let bytes = self.0.as_bytes();
        u64::from_be_bytes([
            0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
        ])
    }
}

impl Default for LineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DemandId
// ---------------------------------------------------------------------------

/// Unique identifier for a red-letter (negative invoice) demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DemandId(pub Uuid);

impl DemandId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for DemandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DemandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PartyId
// ---------------------------------------------------------------------------

/// Unique identifier for a buyer or seller taxpayer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// Identifier for one commit batch. Written to every audit record so
/// interrupted runs can be traced and resumed by operational tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Short hex form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GroupKey
// ---------------------------------------------------------------------------

/// The exact-match scope for allocation: a demand may only draw from credit
/// lines carrying the same `(tax_rate, buyer, seller)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct GroupKey {
    /// VAT rate in percentage points (3, 6, 13, ...).
    pub tax_rate: i16,
    pub buyer: PartyId,
    pub seller: PartyId,
}

impl GroupKey {
    #[must_use]
    pub fn new(tax_rate: i16, buyer: PartyId, seller: PartyId) -> Self {
        Self {
            tax_rate,
            buyer,
            seller,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}/{}/{}", self.tax_rate, self.buyer, self.seller)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
