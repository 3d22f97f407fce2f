//! HNSW graph structure, parameters, and persistence export/import.
//!
//! The graph is keyed by store slot indices rather than pointers: neighbor
//! lists hold bare `usize` slots, so persisting the graph is a flat dump and
//! the store can be rebuilt independently. Vectors, ids, and alive flags
//! live in the [`VectorStore`](crate::store::VectorStore); the graph borrows
//! the store per call.

use crate::config;
use crate::distance::Metric;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tuning parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and
/// memory. Serialized into the collection manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswParams {
    /// Maximum neighbors per node above layer 0.
    #[serde(rename = "M", default = "default_m")]
    pub m: usize,
    /// Maximum neighbors per node at layer 0 (typically `2 * M`).
    #[serde(rename = "M0", default = "default_m0")]
    pub m0: usize,
    /// Beam width during construction.
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
    /// Enable the neighbor diversity heuristic (vs plain nearest-M).
    #[serde(default = "default_use_diversity")]
    pub use_diversity: bool,
    /// Seed for the layer-assignment RNG.
    #[serde(default = "default_seed")]
    pub seed: u32,
    /// Level multiplier: continuation probability is `exp(-1 / level_mult)`.
    #[serde(default = "default_level_mult")]
    pub level_mult: f32,
}

fn default_m() -> usize {
    config::HNSW_DEFAULT_M
}
fn default_m0() -> usize {
    config::HNSW_DEFAULT_M0
}
fn default_ef_construction() -> usize {
    config::HNSW_DEFAULT_EF_CONSTRUCTION
}
fn default_use_diversity() -> bool {
    true
}
fn default_seed() -> u32 {
    config::HNSW_DEFAULT_SEED
}
fn default_level_mult() -> f32 {
    config::HNSW_DEFAULT_LEVEL_MULT
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: default_m(),
            m0: default_m0(),
            ef_construction: default_ef_construction(),
            use_diversity: default_use_diversity(),
            seed: default_seed(),
            level_mult: default_level_mult(),
        }
    }
}

/// Serializable snapshot of one graph node: its top level and one neighbor
/// list per layer (`links.len() == level + 1`). `level == -1` marks a slot
/// that was never inserted.
#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    pub level: i32,
    pub links: Vec<Vec<usize>>,
}

/// Serializable snapshot of the whole graph. `nodes.len()` must equal the
/// store's slot count — the two share one index universe.
#[derive(Debug, Clone)]
pub struct GraphExport {
    pub entry_point: usize,
    pub has_entry: bool,
    pub max_level: i32,
    pub nodes: Vec<GraphNode>,
}

#[inline]
fn lcg_next(state: &mut u32) -> u32 {
    *state = state
        .wrapping_mul(config::LEVEL_RNG_MULTIPLIER)
        .wrapping_add(config::LEVEL_RNG_INCREMENT);
    *state
}

/// Uniform in [0, 1) from the top 24 bits of the LCG state.
#[inline]
fn lcg_uniform01(state: &mut u32) -> f32 {
    let x = lcg_next(state) >> 8;
    x as f32 / (1u32 << 24) as f32
}

/// Hierarchical proximity graph over the slot indices of a vector store.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) metric: Metric,
    pub(crate) params: HnswParams,
    /// Per-slot adjacency: `links[slot][layer]` = neighbor slots at that
    /// layer. An empty outer entry means the slot is not in the graph.
    pub(crate) links: Vec<Vec<Vec<usize>>>,
    pub(crate) entry_point: usize,
    pub(crate) has_entry: bool,
    pub(crate) max_level: i32,
    rng_state: u32,
}

impl HnswIndex {
    /// Creates an empty index. The layer RNG is seeded from `params.seed`,
    /// so two builds over the same data in the same order are identical.
    pub fn new(metric: Metric, params: HnswParams) -> Self {
        let rng_state = params.seed;
        Self {
            metric,
            params,
            links: Vec::new(),
            entry_point: 0,
            has_entry: false,
            max_level: -1,
            rng_state,
        }
    }

    /// True until the first node is inserted.
    pub fn is_empty(&self) -> bool {
        !self.has_entry
    }

    /// Highest layer currently present, or -1 for an empty graph.
    pub fn max_level(&self) -> i32 {
        self.max_level
    }

    /// The metric this index scores with.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The parameters this index was built with.
    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Top layer of a node, or -1 if the slot is not in the graph.
    pub(crate) fn node_level(&self, index: usize) -> i32 {
        match self.links.get(index) {
            Some(layers) if !layers.is_empty() => layers.len() as i32 - 1,
            _ => -1,
        }
    }

    /// Degree bound for a layer: `M0` at layer 0, `M` above.
    pub(crate) fn max_degree(&self, level: i32) -> usize {
        if level == 0 {
            self.params.m0
        } else {
            self.params.m
        }
    }

    pub(crate) fn ensure_node(&mut self, index: usize) {
        if index >= self.links.len() {
            self.links.resize_with(index + 1, Vec::new);
        }
    }

    /// Draw a layer from the truncated geometric distribution.
    pub(crate) fn random_level(&mut self) -> i32 {
        let p = (-1.0f32 / self.params.level_mult.max(1e-4)).exp();
        let mut level: i32 = 0;
        while lcg_uniform01(&mut self.rng_state) < p {
            level += 1;
            if level > config::HNSW_MAX_LEVEL as i32 {
                break;
            }
        }
        level
    }

    /// Snapshot the graph structure for persistence. The export covers the
    /// full slot universe `0..store_len`; slots never inserted get
    /// `level = -1`.
    pub fn export_graph(&self, store_len: usize) -> GraphExport {
        let mut nodes = vec![GraphNode::default(); store_len];
        for (i, node) in nodes.iter_mut().enumerate() {
            match self.links.get(i) {
                Some(layers) if !layers.is_empty() => {
                    node.level = layers.len() as i32 - 1;
                    node.links = layers.clone();
                }
                _ => node.level = -1,
            }
        }
        GraphExport {
            entry_point: self.entry_point,
            has_entry: self.has_entry,
            max_level: self.max_level,
            nodes,
        }
    }

    /// Restore a graph snapshot. Strict: the export must cover exactly
    /// `store_len` slots, and every present node must carry `level + 1`
    /// neighbor lists.
    pub fn import_graph(&mut self, export: GraphExport, store_len: usize) -> Result<()> {
        if export.nodes.len() != store_len {
            return Err(Error::SizeMismatch {
                what: "graph nodes",
                expected: store_len,
                got: export.nodes.len(),
            });
        }

        let mut links = vec![Vec::new(); store_len];
        for (i, node) in export.nodes.into_iter().enumerate() {
            if node.level < 0 {
                continue;
            }
            if node.links.len() != (node.level + 1) as usize {
                return Err(Error::Corrupted(format!(
                    "graph node {i}: {} link lists for level {}",
                    node.links.len(),
                    node.level
                )));
            }
            links[i] = node.links;
        }

        self.entry_point = export.entry_point;
        self.has_entry = export.has_entry;
        self.max_level = export.max_level;
        self.links = links;
        Ok(())
    }
}
