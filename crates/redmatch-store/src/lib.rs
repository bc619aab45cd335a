//! # redmatch-store
//!
//! **Persistence plane for RedMatch.**
//!
//! Implements the engine's [`CandidateSource`] and [`AllocationStore`]
//! seams against two backends:
//!
//! - [`MemoryStore`]: in-process pool with the exact conditional-update
//!   semantics of the SQL path, for integration tests and embedded callers
//! - [`PgStore`]: PostgreSQL via sqlx with pooled connections, one
//!   multi-key candidate round-trip, transactional compare-and-decrement
//!   commit
//!
//! The commit protocol is the single source of truth for write-write
//! conflicts: no in-process locks guard the business state, a decrement
//! applies only while `remaining >= amount_used` still holds, and one
//! failed decrement rolls back the whole commit call.
//!
//! [`CandidateSource`]: redmatch_engine::CandidateSource
//! [`AllocationStore`]: redmatch_engine::AllocationStore

pub mod digest;
pub mod memory;
pub mod postgres;

pub use digest::{commit_digest, digest_hex};
pub use memory::MemoryStore;
pub use postgres::PgStore;
