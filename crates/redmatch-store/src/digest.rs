//! Deterministic commit digests.
//!
//! Every commit writes a SHA-256 digest over its ordered audit entries.
//! The same batch tag and entries produce the same digest wherever they
//! are computed, so an auditor can re-derive the digest from the
//! `match_audit` rows and detect tampering or partial writes.

use redmatch_types::{AuditEntry, BatchId};
use sha2::{Digest, Sha256};

/// SHA-256 over the batch tag and its audit entries, in submission order.
#[must_use]
pub fn commit_digest(batch: BatchId, entries: &[AuditEntry]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"redmatch:commit:v1:");
    hasher.update(batch.0.as_bytes());
    for entry in entries {
        hasher.update(entry.demand_id.0.as_bytes());
        hasher.update(entry.line_id.0.as_bytes());
        hasher.update(entry.amount_used.serialize());
    }
    hasher.finalize().into()
}

/// Lowercase hex form, as stored in `match_batches.digest`.
#[must_use]
pub fn digest_hex(digest: &[u8; 32]) -> String {
    hex::encode(digest)
}
