//! Storage layer: the collection facade and snapshot persistence.
//!
//! A [`Collection`] is a directory-backed unit of vectors, metadata, and an
//! optional HNSW graph. Persistence restores the store exactly (tombstones
//! included) and reattaches the graph without a rebuild when a graph
//! artifact is present.

/// Collection facade: mutation, index rebuild, search, save/load.
pub mod collection;
/// Manifest and artifact serialization for a collection directory.
pub mod persistence;

pub use collection::{Collection, CollectionOptions};
pub use persistence::Manifest;
