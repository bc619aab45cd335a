//! # redmatch-types
//!
//! Shared types, errors, and configuration for the **RedMatch** allocation
//! engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`LineId`], [`DemandId`], [`PartyId`], [`BatchId`], [`GroupKey`]
//! - **Credit model**: [`CreditLine`]
//! - **Demand model**: [`Demand`], [`SortStrategy`]
//! - **Allocation model**: [`Allocation`], [`MatchResult`], [`FailureReason`], [`AuditEntry`]
//! - **Configuration**: [`EngineConfig`], [`StoreConfig`]
//! - **Errors**: [`RedmatchError`] with `RM_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod allocation;
pub mod config;
pub mod constants;
pub mod credit;
pub mod demand;
pub mod error;
pub mod ids;

// Re-export all primary types at crate root for ergonomic imports:
//   use redmatch_types::{Demand, CreditLine, MatchResult, ...};

pub use allocation::*;
pub use config::*;
pub use credit::*;
pub use demand::*;
pub use error::*;
pub use ids::*;

// Constants are accessed via `redmatch_types::constants::FOO`
// (not re-exported to avoid name collisions).
