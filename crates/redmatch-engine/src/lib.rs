//! # redmatch-engine
//!
//! **Orchestration plane for RedMatch.**
//!
//! Drives the pure matchcore against external collaborators:
//!
//! - [`CandidateSource`] / [`AllocationStore`]: the consumed seams to the
//!   backing store (fetch candidates per key, commit allocations)
//! - [`CandidateCache`]: explicit, scoped cache of per-key candidate
//!   fetches with a defined invalidation policy
//! - [`BatchEngine`]: the grouping optimizer; one batched round-trip per
//!   distinct key, then pure grouped allocation
//! - streaming: chunked processing that bounds peak memory for very large
//!   demand sets
//! - [`MatchPipeline`]: allocate-then-commit per chunk, with typed
//!   concurrent-conflict handling
//!
//! All I/O is awaited strictly sequentially; correctness under concurrent
//! writers comes from the store's conditional update, never from in-process
//! locks.

pub mod cache;
pub mod optimizer;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod streaming;

pub use cache::{CachePolicy, CandidateCache};
pub use optimizer::BatchEngine;
pub use pipeline::{MatchPipeline, PipelineOutcome};
pub use sink::AllocationStore;
pub use source::CandidateSource;
