//! Contiguous, index-stable vector storage.
//!
//! Slots are assigned in insertion order and never shift: deletion flips a
//! per-slot alive byte instead of compacting, so HNSW neighbor lists (which
//! hold bare slot indices) and persisted graphs stay valid. A dead slot
//! keeps its id and its id→index entry, which makes re-upserting the same id
//! revive the original slot in O(1) — during a run and across restarts.

use crate::error::{Error, Result};
use crate::metadata::Metadata;
use std::collections::HashMap;

/// In-memory store for fixed-dimension f32 vectors with tombstone deletion.
#[derive(Debug)]
pub struct VectorStore {
    dim: usize,
    /// Flat row-major buffer: `[slot0; dim][slot1; dim]...`
    data: Vec<f32>,
    /// Per-slot liveness (1 = alive, 0 = dead).
    alive: Vec<u8>,
    /// Slot → id. Dead slots keep their id (empty only for unnamed holes
    /// restored from disk).
    ids: Vec<String>,
    /// Slot → metadata.
    metadata: Vec<Metadata>,
    /// Id → slot, kept for dead slots too so revival reuses the slot.
    id_to_index: HashMap<String, usize>,
}

impl VectorStore {
    /// Creates an empty store for vectors of the given dimension.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidDimension(dim));
        }
        Ok(Self {
            dim,
            data: Vec::new(),
            alive: Vec::new(),
            ids: Vec::new(),
            metadata: Vec::new(),
            id_to_index: HashMap::new(),
        })
    }

    /// Fixed vector dimension for this store.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of slots, including tombstones. Indices range over `0..len()`.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when the store has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of alive slots.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a != 0).count()
    }

    /// True if the slot exists and is alive.
    pub fn is_alive(&self, index: usize) -> bool {
        self.alive.get(index).is_some_and(|&a| a != 0)
    }

    /// True if the id exists **and** is alive.
    pub fn contains(&self, id: &str) -> bool {
        self.id_to_index
            .get(id)
            .is_some_and(|&idx| self.is_alive(idx))
    }

    /// Id stored at a slot. Returns `None` for out-of-range indices; dead
    /// slots still report their original id.
    pub fn id_at(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    /// Metadata stored at a slot, or `None` for out-of-range indices.
    pub fn metadata_at(&self, index: usize) -> Option<&Metadata> {
        self.metadata.get(index)
    }

    /// Slot index for an alive id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        let idx = *self.id_to_index.get(id)?;
        self.is_alive(idx).then_some(idx)
    }

    /// Read-only view of the vector at a slot, alive slots only.
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        if !self.is_alive(index) {
            return None;
        }
        Some(&self.data[index * self.dim..(index + 1) * self.dim])
    }

    /// Read-only view of the vector for an alive id.
    pub fn get_by_id(&self, id: &str) -> Option<&[f32]> {
        self.get(*self.id_to_index.get(id)?)
    }

    fn validate_dim(&self, vec: &[f32]) -> Result<()> {
        if vec.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: vec.len(),
            });
        }
        Ok(())
    }

    fn write_slot(&mut self, index: usize, vec: &[f32]) {
        self.data[index * self.dim..(index + 1) * self.dim].copy_from_slice(vec);
    }

    fn append_slot(&mut self, id: &str, vec: &[f32], meta: Metadata) -> usize {
        let index = self.ids.len();
        self.ids.push(id.to_string());
        self.alive.push(1);
        self.metadata.push(meta);
        self.data.extend_from_slice(vec);
        self.id_to_index.insert(id.to_string(), index);
        index
    }

    /// Insert a new `(id, vec)` pair.
    ///
    /// Fails with [`Error::DuplicateId`] when the id is already alive. An id
    /// that exists but is dead is revived at its original slot with its
    /// metadata cleared. Returns the slot index used.
    pub fn insert(&mut self, id: &str, vec: &[f32]) -> Result<usize> {
        self.validate_dim(vec)?;
        if id.is_empty() {
            return Err(Error::EmptyId);
        }

        if let Some(&index) = self.id_to_index.get(id) {
            if self.is_alive(index) {
                return Err(Error::DuplicateId(id.to_string()));
            }
            // dead -> revive at the same slot
            self.write_slot(index, vec);
            self.metadata[index] = Metadata::new();
            self.alive[index] = 1;
            return Ok(index);
        }

        Ok(self.append_slot(id, vec, Metadata::new()))
    }

    /// Insert or overwrite.
    ///
    /// An alive id is overwritten in place (same slot); a dead id is revived
    /// at its slot; a new id appends a slot. The metadata record is replaced
    /// in all cases. Returns the slot index used.
    pub fn upsert(&mut self, id: &str, vec: &[f32], meta: Metadata) -> Result<usize> {
        self.validate_dim(vec)?;
        if id.is_empty() {
            return Err(Error::EmptyId);
        }

        if let Some(&index) = self.id_to_index.get(id) {
            self.write_slot(index, vec);
            self.metadata[index] = meta;
            self.alive[index] = 1;
            if self.ids[index].is_empty() {
                self.ids[index] = id.to_string();
            }
            return Ok(index);
        }

        Ok(self.append_slot(id, vec, meta))
    }

    /// Tombstone an id. Returns `false` when the id is absent or already
    /// dead — a deliberate contract, not an error.
    ///
    /// The slot keeps its id and its id→index entry so a later upsert of the
    /// same id revives the same slot.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(&index) = self.id_to_index.get(id) else {
            return false;
        };
        if !self.is_alive(index) {
            return false;
        }
        self.alive[index] = 0;
        true
    }

    /// Drop all slots and mappings.
    pub fn clear(&mut self) {
        self.data.clear();
        self.alive.clear();
        self.ids.clear();
        self.metadata.clear();
        self.id_to_index.clear();
    }

    /// Replace all state with artifacts read from disk, preserving slot
    /// order exactly as persisted.
    ///
    /// The id→index map is rebuilt for every slot with a non-empty id,
    /// including dead slots, so revival semantics survive a restart.
    pub fn load_from_disk(
        &mut self,
        n: usize,
        vectors: Vec<f32>,
        alive: Vec<u8>,
        ids: Vec<String>,
        metadata: Vec<Metadata>,
    ) -> Result<()> {
        if n == 0 {
            self.clear();
            return Ok(());
        }
        if alive.len() != n {
            return Err(Error::SizeMismatch {
                what: "alive flags",
                expected: n,
                got: alive.len(),
            });
        }
        if ids.len() != n {
            return Err(Error::SizeMismatch {
                what: "ids",
                expected: n,
                got: ids.len(),
            });
        }
        if metadata.len() != n {
            return Err(Error::SizeMismatch {
                what: "metadata",
                expected: n,
                got: metadata.len(),
            });
        }
        if vectors.len() != n * self.dim {
            return Err(Error::SizeMismatch {
                what: "vectors",
                expected: n * self.dim,
                got: vectors.len(),
            });
        }

        self.data = vectors;
        self.alive = alive;
        self.ids = ids;
        self.metadata = metadata;

        self.id_to_index.clear();
        self.id_to_index.reserve(n);
        for (i, id) in self.ids.iter().enumerate() {
            if !id.is_empty() {
                self.id_to_index.insert(id.clone(), i);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn check_invariants(store: &VectorStore) {
        assert_eq!(store.data.len(), store.len() * store.dim());
        assert_eq!(store.alive.len(), store.len());
        assert_eq!(store.ids.len(), store.len());
        assert_eq!(store.metadata.len(), store.len());
        for i in 0..store.len() {
            if store.is_alive(i) {
                let id = store.id_at(i).unwrap();
                assert_eq!(store.id_to_index[id], i);
            }
        }
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert!(matches!(
            VectorStore::new(0),
            Err(Error::InvalidDimension(0))
        ));
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = VectorStore::new(2).unwrap();
        let i1 = store.insert("u1", &[1.0, 2.0]).unwrap();
        let i2 = store.insert("u2", &[3.0, 4.0]).unwrap();
        assert_eq!((i1, i2), (0, 1));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0), Some(&[1.0, 2.0][..]));
        assert_eq!(store.get_by_id("u2"), Some(&[3.0, 4.0][..]));
        check_invariants(&store);
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let mut store = VectorStore::new(2).unwrap();
        store.insert("u1", &[1.0, 2.0]).unwrap();
        assert!(matches!(
            store.insert("u1", &[9.0, 9.0]),
            Err(Error::DuplicateId(_))
        ));
    }

    #[test]
    fn test_insert_validation() {
        let mut store = VectorStore::new(2).unwrap();
        assert!(matches!(
            store.insert("u1", &[1.0]),
            Err(Error::DimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
        assert!(matches!(store.insert("", &[1.0, 2.0]), Err(Error::EmptyId)));
    }

    #[test]
    fn test_tombstone_and_revival() {
        let mut store = VectorStore::new(2).unwrap();
        let i1 = store.upsert("u1", &[1.0, 2.0], Metadata::new()).unwrap();
        let i2 = store.upsert("u2", &[3.0, 4.0], Metadata::new()).unwrap();
        assert_eq!((i1, i2), (0, 1));

        assert!(store.remove("u1"));
        assert!(!store.contains("u1"));
        assert!(!store.is_alive(0));
        assert_eq!(store.get(0), None);
        assert_eq!(store.get_by_id("u1"), None);
        // tombstoned slot keeps its id
        assert_eq!(store.id_at(0), Some("u1"));
        assert_eq!(store.alive_count(), 1);

        // second remove is a no-op returning false
        assert!(!store.remove("u1"));
        assert!(!store.remove("nope"));

        // upsert of the same id revives the same slot
        let revived = store.upsert("u1", &[9.0, 9.0], Metadata::new()).unwrap();
        assert_eq!(revived, 0);
        assert!(store.is_alive(0));
        assert_eq!(store.get(0).unwrap()[0], 9.0);
        assert_eq!(store.len(), 2);
        check_invariants(&store);
    }

    #[test]
    fn test_insert_revives_dead_id_and_clears_metadata() {
        let mut store = VectorStore::new(2).unwrap();
        store
            .upsert("u1", &[1.0, 2.0], meta(&[("a", "1")]))
            .unwrap();
        store.remove("u1");
        let idx = store.insert("u1", &[5.0, 6.0]).unwrap();
        assert_eq!(idx, 0);
        assert!(store.metadata_at(0).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_overwrites_in_place() {
        let mut store = VectorStore::new(2).unwrap();
        store
            .upsert("u1", &[1.0, 2.0], meta(&[("a", "1")]))
            .unwrap();
        let idx = store
            .upsert("u1", &[7.0, 8.0], meta(&[("b", "2")]))
            .unwrap();
        assert_eq!(idx, 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0), Some(&[7.0, 8.0][..]));
        assert_eq!(
            store.metadata_at(0).unwrap().get("b").map(String::as_str),
            Some("2")
        );
        assert!(store.metadata_at(0).unwrap().get("a").is_none());
    }

    #[test]
    fn test_slot_stability_under_churn() {
        let mut store = VectorStore::new(2).unwrap();
        for i in 0..10 {
            store
                .upsert(&format!("id{i}"), &[i as f32, 0.0], Metadata::new())
                .unwrap();
        }
        store.remove("id3");
        store.remove("id7");
        store
            .upsert("id10", &[10.0, 0.0], Metadata::new())
            .unwrap();
        // revive after more appends still lands on the original slot
        let idx = store.upsert("id3", &[3.5, 0.0], Metadata::new()).unwrap();
        assert_eq!(idx, 3);
        assert_eq!(store.index_of("id10"), Some(10));
        check_invariants(&store);
    }

    #[test]
    fn test_load_from_disk_rebuilds_dead_id_mapping() {
        let mut store = VectorStore::new(2).unwrap();
        store
            .load_from_disk(
                2,
                vec![1.0, 2.0, 0.0, 0.0],
                vec![1, 0],
                vec!["a".to_string(), "b".to_string()],
                vec![Metadata::new(), Metadata::new()],
            )
            .unwrap();
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        // dead id still maps to its slot, so upsert revives it
        let idx = store.upsert("b", &[5.0, 5.0], Metadata::new()).unwrap();
        assert_eq!(idx, 1);
        check_invariants(&store);
    }

    #[test]
    fn test_load_from_disk_size_mismatch() {
        let mut store = VectorStore::new(2).unwrap();
        let err = store.load_from_disk(
            2,
            vec![1.0, 2.0], // should be 4 floats
            vec![1, 1],
            vec!["a".to_string(), "b".to_string()],
            vec![Metadata::new(), Metadata::new()],
        );
        assert!(matches!(err, Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn test_load_from_disk_empty_clears() {
        let mut store = VectorStore::new(2).unwrap();
        store.upsert("u1", &[1.0, 2.0], Metadata::new()).unwrap();
        store
            .load_from_disk(0, Vec::new(), Vec::new(), Vec::new(), Vec::new())
            .unwrap();
        assert_eq!(store.len(), 0);
        assert!(!store.contains("u1"));
    }
}
