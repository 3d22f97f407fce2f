//! Snapshot persistence for a collection directory.
//!
//! A collection directory holds a JSON manifest plus binary/text artifacts
//! that together restore the store and (optionally) the graph without a
//! rebuild:
//!
//! - `manifest.json` — version, dim, metric, HNSW parameters.
//! - `vectors.bin`   — u64 magic, u64 N, u64 dim, then N·dim f32 LE.
//!   Dead slots are written as zeros; correctness never depends on them.
//! - `alive.bin`     — u64 magic, u64 N, then N liveness bytes.
//! - `ids.txt`       — N lines, one id per slot. Dead slots keep their id so
//!   revival survives a restart. `\r\n` is tolerated on read.
//! - `meta.txt`      — N encoded metadata lines; the file may be absent.
//! - `hnsw.bin`      — 8-byte magic, u64 N (must equal the store), i32
//!   max_level, u64 entry_point, u32 has_entry, then per node an i32 level
//!   and, when present, `level + 1` × (u32 degree + degree u32 neighbors).
//!
//! All multi-byte integers are little-endian. Wrong magic, wrong N, or a
//! dim disagreement between artifacts is fatal to the load path.

use crate::config;
use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::hnsw::{GraphExport, GraphNode, HnswIndex, HnswParams};
use crate::metadata::{self, Metadata};
use crate::store::VectorStore;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// File names inside a collection directory.
pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const ALIVE_FILE: &str = "alive.bin";
pub const IDS_FILE: &str = "ids.txt";
pub const META_FILE: &str = "meta.txt";
pub const GRAPH_FILE: &str = "hnsw.bin";

/// "VECV_1", packed into the low bytes of a u64.
const VECTORS_MAGIC: u64 = 0x0000_31565F434556;
/// "ALV_1", packed into the low bytes of a u64.
const ALIVE_MAGIC: u64 = 0x0000_31565F564C41;
/// Graph artifact magic.
const GRAPH_MAGIC: [u8; 8] = *b"HNSWv1\0\0";

/// The collection manifest. Unknown keys in the file are ignored; listed
/// keys fall back to their defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub dim: usize,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub hnsw: HnswParams,
}

fn default_version() -> u32 {
    config::MANIFEST_VERSION
}

/// Read and validate the manifest. `dim == 0` (missing or explicit) is
/// fatal; an absent file is [`Error::NotFound`].
pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(Error::NotFound(format!(
            "{} in {}",
            MANIFEST_FILE,
            dir.display()
        )));
    }
    let text = fs::read_to_string(&path)?;
    let manifest: Manifest = serde_json::from_str(&text)
        .map_err(|e| Error::Corrupted(format!("{}: {e}", path.display())))?;
    if manifest.dim == 0 {
        return Err(Error::Corrupted(format!(
            "{}: dim must be > 0",
            path.display()
        )));
    }
    Ok(manifest)
}

/// Write the manifest as pretty-printed JSON.
pub fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    let path = dir.join(MANIFEST_FILE);
    let text = serde_json::to_string_pretty(manifest)
        .map_err(|e| Error::Internal(format!("manifest serialization: {e}")))?;
    fs::write(&path, text)?;
    Ok(())
}

/// Persist the store: vectors, alive flags, ids, and metadata.
pub fn save_store(dir: &Path, store: &VectorStore) -> Result<()> {
    let n = store.len();
    let dim = store.dim();

    {
        let mut out = BufWriter::new(File::create(dir.join(VECTORS_FILE))?);
        out.write_u64::<LittleEndian>(VECTORS_MAGIC)?;
        out.write_u64::<LittleEndian>(n as u64)?;
        out.write_u64::<LittleEndian>(dim as u64)?;
        for i in 0..n {
            match store.get(i) {
                Some(vector) => {
                    for &x in vector {
                        out.write_f32::<LittleEndian>(x)?;
                    }
                }
                // dead slot: content is irrelevant, keep the layout
                None => {
                    for _ in 0..dim {
                        out.write_f32::<LittleEndian>(0.0)?;
                    }
                }
            }
        }
        out.flush()?;
    }

    {
        let mut out = BufWriter::new(File::create(dir.join(ALIVE_FILE))?);
        out.write_u64::<LittleEndian>(ALIVE_MAGIC)?;
        out.write_u64::<LittleEndian>(n as u64)?;
        for i in 0..n {
            out.write_u8(u8::from(store.is_alive(i)))?;
        }
        out.flush()?;
    }

    {
        // ids of dead slots included: the tombstone mapping must survive
        let mut out = BufWriter::new(File::create(dir.join(IDS_FILE))?);
        for i in 0..n {
            writeln!(out, "{}", store.id_at(i).unwrap_or(""))?;
        }
        out.flush()?;
    }

    {
        let mut out = BufWriter::new(File::create(dir.join(META_FILE))?);
        for i in 0..n {
            let line = store.metadata_at(i).map(metadata::encode).unwrap_or_default();
            writeln!(out, "{line}")?;
        }
        out.flush()?;
    }

    tracing::info!(slots = n, dim, "saved store to {}", dir.display());
    Ok(())
}

fn read_n_lines(path: &Path, n: usize) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::with_capacity(n);
    let mut iter = reader.lines();
    for _ in 0..n {
        let mut line = match iter.next() {
            Some(line) => line?,
            None => String::new(),
        };
        if line.ends_with('\r') {
            line.pop();
        }
        lines.push(line);
    }
    Ok(lines)
}

/// Restore the store from disk, replacing all of its state.
pub fn load_store(dir: &Path, store: &mut VectorStore) -> Result<()> {
    let (n, vectors) = {
        let mut input = BufReader::new(File::open(dir.join(VECTORS_FILE))?);
        let magic = input.read_u64::<LittleEndian>()?;
        if magic != VECTORS_MAGIC {
            return Err(Error::Corrupted(format!("{VECTORS_FILE}: bad magic")));
        }
        let n = input.read_u64::<LittleEndian>()? as usize;
        let dim = input.read_u64::<LittleEndian>()? as usize;
        if dim != store.dim() {
            return Err(Error::DimensionMismatch {
                expected: store.dim(),
                got: dim,
            });
        }
        let mut vectors = vec![0.0f32; n * dim];
        input.read_f32_into::<LittleEndian>(&mut vectors)?;
        (n, vectors)
    };

    let alive = {
        let mut input = BufReader::new(File::open(dir.join(ALIVE_FILE))?);
        let magic = input.read_u64::<LittleEndian>()?;
        if magic != ALIVE_MAGIC {
            return Err(Error::Corrupted(format!("{ALIVE_FILE}: bad magic")));
        }
        let n2 = input.read_u64::<LittleEndian>()? as usize;
        if n2 != n {
            return Err(Error::SizeMismatch {
                what: "alive flags",
                expected: n,
                got: n2,
            });
        }
        let mut alive = vec![0u8; n];
        std::io::Read::read_exact(&mut input, &mut alive)?;
        alive
    };

    let ids = read_n_lines(&dir.join(IDS_FILE), n)?;

    let meta_path = dir.join(META_FILE);
    let meta = if meta_path.is_file() {
        let lines = read_n_lines(&meta_path, n)?;
        let mut meta = Vec::with_capacity(n);
        for (i, line) in lines.iter().enumerate() {
            let decoded = metadata::decode(line).map_err(|e| {
                Error::Corrupted(format!("{META_FILE} line {}: {e}", i + 1))
            })?;
            meta.push(decoded);
        }
        meta
    } else {
        // older snapshots have no metadata file
        vec![Metadata::new(); n]
    };

    store.load_from_disk(n, vectors, alive, ids, meta)?;
    tracing::info!(
        slots = store.len(),
        alive = store.alive_count(),
        "loaded store from {}",
        dir.display()
    );
    Ok(())
}

/// Persist the graph structure. Vectors, ids, and alive flags are covered by
/// [`save_store`]; the graph file carries only slot-indexed adjacency.
pub fn save_graph(dir: &Path, index: &HnswIndex, store_len: usize) -> Result<()> {
    let export = index.export_graph(store_len);

    let mut out = BufWriter::new(File::create(dir.join(GRAPH_FILE))?);
    out.write_all(&GRAPH_MAGIC)?;
    out.write_u64::<LittleEndian>(store_len as u64)?;
    out.write_i32::<LittleEndian>(export.max_level)?;
    out.write_u64::<LittleEndian>(export.entry_point as u64)?;
    out.write_u32::<LittleEndian>(u32::from(export.has_entry))?;

    for node in &export.nodes {
        out.write_i32::<LittleEndian>(node.level)?;
        if node.level >= 0 {
            for neighbors in &node.links {
                out.write_u32::<LittleEndian>(neighbors.len() as u32)?;
                for &neighbor in neighbors {
                    out.write_u32::<LittleEndian>(neighbor as u32)?;
                }
            }
        }
    }
    out.flush()?;

    tracing::info!(slots = store_len, "saved graph to {}", dir.display());
    Ok(())
}

/// Restore the graph structure into `index`. The artifact's node count must
/// equal the store's slot count.
pub fn load_graph(dir: &Path, index: &mut HnswIndex, store_len: usize) -> Result<()> {
    let mut input = BufReader::new(File::open(dir.join(GRAPH_FILE))?);

    let mut magic = [0u8; 8];
    std::io::Read::read_exact(&mut input, &mut magic)?;
    if magic != GRAPH_MAGIC {
        return Err(Error::Corrupted(format!("{GRAPH_FILE}: bad magic")));
    }

    let n = input.read_u64::<LittleEndian>()? as usize;
    if n != store_len {
        return Err(Error::SizeMismatch {
            what: "graph nodes",
            expected: store_len,
            got: n,
        });
    }

    let max_level = input.read_i32::<LittleEndian>()?;
    let entry_point = input.read_u64::<LittleEndian>()? as usize;
    let has_entry = input.read_u32::<LittleEndian>()? != 0;

    let mut nodes = Vec::with_capacity(n);
    for _ in 0..n {
        let level = input.read_i32::<LittleEndian>()?;
        let mut node = GraphNode {
            level,
            links: Vec::new(),
        };
        if level >= 0 {
            node.links.reserve((level + 1) as usize);
            for _ in 0..=level {
                let degree = input.read_u32::<LittleEndian>()? as usize;
                let mut neighbors = Vec::with_capacity(degree);
                for _ in 0..degree {
                    neighbors.push(input.read_u32::<LittleEndian>()? as usize);
                }
                node.links.push(neighbors);
            }
        }
        nodes.push(node);
    }

    index.import_graph(
        GraphExport {
            entry_point,
            has_entry,
            max_level,
            nodes,
        },
        store_len,
    )?;
    tracing::info!(slots = store_len, "loaded graph from {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use tempfile::TempDir;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_store() -> VectorStore {
        let mut store = VectorStore::new(2).unwrap();
        store
            .upsert("u1", &[1.0, 2.0], meta(&[("cluster", "1")]))
            .unwrap();
        store.upsert("u2", &[3.0, 4.0], Metadata::new()).unwrap();
        store.upsert("u3", &[5.0, 6.0], Metadata::new()).unwrap();
        store.remove("u2");
        store
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest {
            version: config::MANIFEST_VERSION,
            dim: 4,
            metric: Metric::Cosine,
            hnsw: HnswParams {
                m: 8,
                seed: 7,
                ..HnswParams::default()
            },
        };
        write_manifest(dir.path(), &manifest).unwrap();

        let loaded = read_manifest(dir.path()).unwrap();
        assert_eq!(loaded.dim, 4);
        assert_eq!(loaded.metric, Metric::Cosine);
        assert_eq!(loaded.hnsw.m, 8);
        assert_eq!(loaded.hnsw.seed, 7);
        assert_eq!(loaded.hnsw.m0, config::HNSW_DEFAULT_M0);
    }

    #[test]
    fn test_manifest_tolerates_unknown_keys() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"version": 1, "dim": 3, "metric": "L2", "hnsw": {"M": 16}, "future_field": true}"#,
        )
        .unwrap();
        let manifest = read_manifest(dir.path()).unwrap();
        assert_eq!(manifest.dim, 3);
        assert_eq!(manifest.hnsw.ef_construction, 100);
    }

    #[test]
    fn test_manifest_zero_dim_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"version": 1, "dim": 0, "metric": "L2"}"#,
        )
        .unwrap();
        assert!(matches!(
            read_manifest(dir.path()),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_manifest_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(read_manifest(dir.path()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_store_roundtrip_preserves_tombstones() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        save_store(dir.path(), &store).unwrap();

        let mut restored = VectorStore::new(2).unwrap();
        load_store(dir.path(), &mut restored).unwrap();

        assert_eq!(restored.len(), 3);
        assert_eq!(restored.alive_count(), 2);
        assert!(restored.contains("u1"));
        assert!(!restored.contains("u2"));
        // dead slot keeps its id, so revival works after restart
        assert_eq!(restored.id_at(1), Some("u2"));
        let idx = restored.upsert("u2", &[9.0, 9.0], Metadata::new()).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(restored.get(0), Some(&[1.0, 2.0][..]));
        assert_eq!(
            restored
                .metadata_at(0)
                .unwrap()
                .get("cluster")
                .map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn test_store_load_bad_magic() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        save_store(dir.path(), &store).unwrap();
        fs::write(dir.path().join(VECTORS_FILE), vec![0u8; 64]).unwrap();

        let mut restored = VectorStore::new(2).unwrap();
        assert!(matches!(
            load_store(dir.path(), &mut restored),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_store_load_dim_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        save_store(dir.path(), &store).unwrap();

        let mut restored = VectorStore::new(3).unwrap();
        assert!(matches!(
            load_store(dir.path(), &mut restored),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_store_load_without_meta_file() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        save_store(dir.path(), &store).unwrap();
        fs::remove_file(dir.path().join(META_FILE)).unwrap();

        let mut restored = VectorStore::new(2).unwrap();
        load_store(dir.path(), &mut restored).unwrap();
        assert!(restored.metadata_at(0).unwrap().is_empty());
    }

    #[test]
    fn test_store_load_malformed_meta_line() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        save_store(dir.path(), &store).unwrap();
        fs::write(dir.path().join(META_FILE), "a=b\\\n\n\n").unwrap();

        let mut restored = VectorStore::new(2).unwrap();
        let err = load_store(dir.path(), &mut restored).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_graph_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();

        let mut index = HnswIndex::new(Metric::L2, HnswParams::default());
        for i in 0..store.len() {
            if store.is_alive(i) {
                index.insert(&store, i);
            }
        }
        save_graph(dir.path(), &index, store.len()).unwrap();

        let mut restored = HnswIndex::new(Metric::L2, HnswParams::default());
        load_graph(dir.path(), &mut restored, store.len()).unwrap();

        assert_eq!(
            restored.export_graph(store.len()).nodes.len(),
            index.export_graph(store.len()).nodes.len()
        );
        let a = index.search(&store, &[1.0, 2.0], 2, 10).unwrap();
        let b = restored.search(&store, &[1.0, 2.0], 2, 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_graph_load_store_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = sample_store();
        let mut index = HnswIndex::new(Metric::L2, HnswParams::default());
        for i in 0..store.len() {
            if store.is_alive(i) {
                index.insert(&store, i);
            }
        }
        save_graph(dir.path(), &index, store.len()).unwrap();

        let mut restored = HnswIndex::new(Metric::L2, HnswParams::default());
        assert!(matches!(
            load_graph(dir.path(), &mut restored, store.len() + 1),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_graph_load_bad_magic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(GRAPH_FILE), b"NOTHNSW0rest").unwrap();
        let mut restored = HnswIndex::new(Metric::L2, HnswParams::default());
        assert!(matches!(
            load_graph(dir.path(), &mut restored, 0),
            Err(Error::Corrupted(_))
        ));
    }
}
