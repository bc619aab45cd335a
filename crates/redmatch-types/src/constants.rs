//! System-wide constants for the RedMatch allocation engine.

/// Base candidate cap granted per demand sharing a grouping key.
pub const DEFAULT_CAP_PER_DEMAND: i64 = 200;

/// Hard ceiling on candidates fetched for any single grouping key.
pub const MAX_CAP_PER_KEY: i64 = 2_000;

/// Demand-set size above which the streaming controller kicks in.
pub const DEFAULT_STREAM_THRESHOLD: usize = 10_000;

/// Chunk size for streamed processing of large demand sets.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000;

/// Scale-2 mantissa of the amount tolerance ε (0.01 currency units).
pub const TOLERANCE_CENTS: i64 = 1;

/// Scale-0 mantissa of the default fragment threshold (5 currency units).
pub const FRAGMENT_THRESHOLD_UNITS: i64 = 5;

/// Default store connection pool size.
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Default connection acquire timeout in seconds, the only timeout
/// boundary inside the core.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Fragment share of a candidate window above which a failed demand is
/// classified as a fragmentation issue rather than a plain shortfall.
pub const FRAGMENTATION_SEVERE_SHARE: f64 = 0.5;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "RedMatch";
