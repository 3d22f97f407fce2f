//! Global configuration constants for vicinity.
//!
//! All tuning defaults live here as compile-time constants; runtime
//! configuration is handled via CLI arguments in the `vicinity-cli` crate
//! and via the collection manifest on disk.

/// Default number of bidirectional links per HNSW node above layer 0.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default maximum links per node at layer 0 (typically `2 * M`).
pub const HNSW_DEFAULT_M0: usize = 32;

/// Default beam width during index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down the build.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 100;

/// Default beam width during search.
///
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Default seed for the layer-assignment RNG.
pub const HNSW_DEFAULT_SEED: u32 = 123;

/// Default level multiplier for layer assignment.
///
/// The geometric continuation probability is `exp(-1 / level_mult)`.
pub const HNSW_DEFAULT_LEVEL_MULT: f32 = 1.0;

/// Hard cap on the layer a node can be assigned to.
pub const HNSW_MAX_LEVEL: usize = 64;

/// Multiplier of the linear-congruential layer RNG.
///
/// The LCG is part of the on-disk determinism contract: two builds with the
/// same data, parameters, and seed must produce identical graphs.
pub const LEVEL_RNG_MULTIPLIER: u32 = 1_664_525;

/// Increment of the linear-congruential layer RNG.
pub const LEVEL_RNG_INCREMENT: u32 = 1_013_904_223;

/// Norms below this threshold are treated as zero by the distance kernels.
pub const NORM_EPSILON: f32 = 1e-12;

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Default number of results per search request.
pub const DEFAULT_K: usize = 10;
