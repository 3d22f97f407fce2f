//! Directory-backed collection facade.
//!
//! A [`Collection`] coordinates the vector store, the optional HNSW index,
//! and the snapshot serializer under one reader-writer lock: searches share
//! the lock, mutations take it exclusively. Any mutation of the store (or of
//! the search parameters) drops the index — correctness first; searches then
//! fail with `IndexNotReady` until `build_index` runs again. The filtered
//! search path is an exact scan and deliberately needs no index.

use crate::bruteforce;
use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::hnsw::{HnswIndex, HnswParams};
use crate::metadata::Metadata;
use crate::search::{MetadataFilter, SearchResult};
use crate::storage::persistence::{self, Manifest};
use crate::store::VectorStore;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parameters fixed at collection creation (dim, metric) or adjustable
/// before an index rebuild (metric, HNSW params).
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub dim: usize,
    pub metric: Metric,
    pub hnsw: HnswParams,
}

impl CollectionOptions {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            metric: Metric::default(),
            hnsw: HnswParams::default(),
        }
    }
}

/// Internal collection state, protected by the facade's `RwLock`.
#[derive(Debug)]
struct CollectionData {
    dir: PathBuf,
    opts: CollectionOptions,
    store: VectorStore,
    index: Option<HnswIndex>,
}

/// A directory-backed vector collection.
///
/// Cloning a `Collection` produces a new handle to the same shared state;
/// multiple readers may search concurrently while writers are exclusive.
#[derive(Debug, Clone)]
pub struct Collection {
    data: Arc<RwLock<CollectionData>>,
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("path exists but is not a directory: {}", dir.display()),
        )));
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

impl Collection {
    /// Create a new collection directory and write its manifest immediately.
    ///
    /// The returned collection has an empty store and no index.
    pub fn create(dir: impl Into<PathBuf>, opts: CollectionOptions) -> Result<Self> {
        let dir = dir.into();
        if opts.dim == 0 {
            return Err(Error::InvalidDimension(0));
        }
        ensure_dir(&dir)?;

        let store = VectorStore::new(opts.dim)?;
        let collection = Self {
            data: Arc::new(RwLock::new(CollectionData {
                dir,
                opts,
                store,
                index: None,
            })),
        };
        collection.save()?;
        Ok(collection)
    }

    /// Open an existing collection directory: read the manifest, restore the
    /// store, and reattach the graph iff its artifact exists.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;

        let manifest = persistence::read_manifest(&dir)?;
        let opts = CollectionOptions {
            dim: manifest.dim,
            metric: manifest.metric,
            hnsw: manifest.hnsw,
        };

        let store = VectorStore::new(opts.dim)?;
        let collection = Self {
            data: Arc::new(RwLock::new(CollectionData {
                dir,
                opts,
                store,
                index: None,
            })),
        };
        collection.load()?;
        Ok(collection)
    }

    /// Collection directory.
    pub fn dir(&self) -> PathBuf {
        self.data.read().dir.clone()
    }

    /// Fixed vector dimension.
    pub fn dim(&self) -> usize {
        self.data.read().opts.dim
    }

    /// Current distance metric.
    pub fn metric(&self) -> Metric {
        self.data.read().opts.metric
    }

    /// Number of slots, including tombstones.
    pub fn len(&self) -> usize {
        self.data.read().store.len()
    }

    /// True when the store has no slots.
    pub fn is_empty(&self) -> bool {
        self.data.read().store.is_empty()
    }

    /// Number of alive vectors.
    pub fn alive_count(&self) -> usize {
        self.data.read().store.alive_count()
    }

    /// True if the id exists and is alive.
    pub fn contains(&self, id: &str) -> bool {
        self.data.read().store.contains(id)
    }

    /// Id stored at a slot (dead slots still report their id).
    pub fn id_at(&self, index: usize) -> Option<String> {
        self.data.read().store.id_at(index).map(str::to_string)
    }

    /// Metadata stored at a slot.
    pub fn metadata_at(&self, index: usize) -> Option<Metadata> {
        self.data.read().store.metadata_at(index).cloned()
    }

    /// True when a built (or reattached) index is present.
    pub fn has_index(&self) -> bool {
        self.data.read().index.is_some()
    }

    /// Switch the distance metric. Drops the index if one was built.
    pub fn set_metric(&self, metric: Metric) {
        let mut data = self.data.write();
        data.opts.metric = metric;
        data.index = None;
    }

    /// Replace the HNSW parameters. Drops the index if one was built.
    pub fn set_hnsw_params(&self, params: HnswParams) {
        let mut data = self.data.write();
        data.opts.hnsw = params;
        data.index = None;
    }

    /// Insert or overwrite a vector. Returns the slot index used; a
    /// successful upsert drops the index.
    pub fn upsert(&self, id: &str, vector: &[f32], meta: Metadata) -> Result<usize> {
        let mut data = self.data.write();
        let index = data.store.upsert(id, vector, meta)?;
        data.index = None;
        Ok(index)
    }

    /// Tombstone an id. Returns `false` when absent or already dead; a
    /// successful remove drops the index.
    pub fn remove(&self, id: &str) -> bool {
        let mut data = self.data.write();
        let removed = data.store.remove(id);
        if removed {
            data.index = None;
        }
        removed
    }

    /// Build a fresh index with the current parameters, inserting every
    /// alive slot in slot order. Replaces any existing index.
    pub fn build_index(&self) {
        let mut data = self.data.write();
        let mut index = HnswIndex::new(data.opts.metric, data.opts.hnsw.clone());
        for i in 0..data.store.len() {
            if data.store.is_alive(i) {
                index.insert(&data.store, i);
            }
        }
        tracing::info!(
            alive = data.store.alive_count(),
            max_level = index.max_level(),
            "index built"
        );
        data.index = Some(index);
    }

    /// Approximate k-nearest-neighbor search through the index.
    ///
    /// Fails with [`Error::IndexNotReady`] when no index is present (after
    /// any mutation, or before the first `build_index`).
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<SearchResult>> {
        let data = self.data.read();
        if query.len() != data.opts.dim {
            return Err(Error::DimensionMismatch {
                expected: data.opts.dim,
                got: query.len(),
            });
        }
        let index = data.index.as_ref().ok_or(Error::IndexNotReady)?;
        index.search(&data.store, query, k, ef_search)
    }

    /// Search restricted to slots whose metadata contains the filter's
    /// `(key, value)` entry.
    ///
    /// A non-empty filter runs an exact bounded-heap scan and needs no
    /// index; an empty filter delegates to [`Collection::search`].
    pub fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        if filter.is_empty() {
            return self.search(query, k, ef_search);
        }

        let data = self.data.read();
        if query.len() != data.opts.dim {
            return Err(Error::DimensionMismatch {
                expected: data.opts.dim,
                got: query.len(),
            });
        }
        bruteforce::search_filtered(&data.store, data.opts.metric, query, k, |i| {
            data.store
                .metadata_at(i)
                .is_some_and(|meta| filter.matches(meta))
        })
    }

    /// Persist the collection: manifest and store always, the graph only if
    /// an index is present (a stale graph artifact is removed otherwise).
    pub fn save(&self) -> Result<()> {
        let data = self.data.write();
        ensure_dir(&data.dir)?;

        let manifest = Manifest {
            version: crate::config::MANIFEST_VERSION,
            dim: data.opts.dim,
            metric: data.opts.metric,
            hnsw: data.opts.hnsw.clone(),
        };
        persistence::write_manifest(&data.dir, &manifest)?;
        persistence::save_store(&data.dir, &data.store)?;

        let graph_path = data.dir.join(persistence::GRAPH_FILE);
        match &data.index {
            Some(index) => persistence::save_graph(&data.dir, index, data.store.len())?,
            None => {
                if graph_path.is_file() {
                    fs::remove_file(&graph_path)?;
                }
            }
        }
        Ok(())
    }

    /// Reload the collection from its directory, replacing in-memory state.
    pub fn load(&self) -> Result<()> {
        let mut data = self.data.write();
        let dir = data.dir.clone();
        persistence::load_store(&dir, &mut data.store)?;

        if dir.join(persistence::GRAPH_FILE).is_file() {
            let mut index = HnswIndex::new(data.opts.metric, data.opts.hnsw.clone());
            persistence::load_graph(&dir, &mut index, data.store.len())?;
            data.index = Some(index);
        } else {
            data.index = None;
        }
        Ok(())
    }
}
