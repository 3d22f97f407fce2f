//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor
//! index.
//!
//! The graph is built over the stable slot indices of a
//! [`VectorStore`](crate::store::VectorStore): nodes are slots, neighbor
//! lists hold slot indices, and the store is borrowed per call. Layer
//! assignment uses an explicitly specified LCG so that two builds with the
//! same data, parameters, insertion order, and seed produce identical graphs
//! — a property both the tests and the persistence format rely on.

/// Graph structure, parameters, level RNG, and persistence export/import.
pub mod graph;
/// Insertion with bidirectional connections and heuristic neighbor pruning.
pub mod insert;
/// Layer search, greedy descent, and multi-layer KNN.
pub mod search;
/// Stamp-array visited set for traversal.
pub mod visited;

pub use graph::{GraphExport, GraphNode, HnswIndex, HnswParams};
pub use visited::VisitedSet;
