//! Exact top-k search over the vector store.
//!
//! Walks every alive slot with a bounded max-heap of size k. O(N·dim +
//! N·log k). Serves as the ground-truth oracle in tests and as the fallback
//! path for metadata-filtered queries, which bypass the graph entirely.

use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::search::SearchResult;
use crate::store::VectorStore;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Heap entry ordered by distance; the heap top is the worst of the current
/// best k.
#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    distance: OrderedFloat<f32>,
    index: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.cmp(&other.distance)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Exact top-k nearest neighbors among all alive slots.
pub fn search(
    store: &VectorStore,
    metric: Metric,
    query: &[f32],
    k: usize,
) -> Result<Vec<SearchResult>> {
    search_filtered(store, metric, query, k, |_| true)
}

/// Exact top-k restricted to alive slots accepted by `filter`.
pub fn search_filtered<F>(
    store: &VectorStore,
    metric: Metric,
    query: &[f32],
    k: usize,
    filter: F,
) -> Result<Vec<SearchResult>>
where
    F: Fn(usize) -> bool,
{
    if query.len() != store.dim() {
        return Err(Error::DimensionMismatch {
            expected: store.dim(),
            got: query.len(),
        });
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);

    for index in 0..store.len() {
        let Some(vector) = store.get(index) else {
            continue;
        };
        if !filter(index) {
            continue;
        }
        let distance = metric.distance(query, vector);

        if heap.len() < k {
            heap.push(HeapEntry {
                distance: OrderedFloat(distance),
                index,
            });
        } else if heap.peek().is_some_and(|worst| distance < worst.distance.0) {
            heap.pop();
            heap.push(HeapEntry {
                distance: OrderedFloat(distance),
                index,
            });
        }
    }

    Ok(heap
        .into_sorted_vec()
        .into_iter()
        .map(|e| SearchResult {
            index: e.index,
            distance: e.distance.0,
        })
        .collect())
}
