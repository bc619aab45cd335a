//! # redmatch-matchcore
//!
//! **Pure greedy allocation core for RedMatch.**
//!
//! MatchCore is the compute plane -- it takes demands plus pre-fetched
//! candidate credit lines and produces allocation results. It has:
//!
//! - **Zero side effects**: no DB reads or writes, no connection handling
//! - **Deterministic output**: same input -> same output, every time
//! - **No double-spend**: a per-key snapshot overlay tracks consumption
//!   across demands sharing a grouping key
//! - **All-or-nothing per demand**: a demand is covered in full or not at all

pub mod allocator;
pub mod diagnosis;
pub mod grouping;
pub mod snapshot;
pub mod summary;

pub use allocator::allocate;
pub use diagnosis::{classify_failure, fragmentation_score};
pub use grouping::{allocate_grouped, partition_by_key};
pub use snapshot::GroupSnapshot;
pub use summary::BatchSummary;
