//! HNSW search: best-first layer search, greedy descent, and top-level KNN.
//!
//! `search_level` is the workhorse shared by queries and construction. It
//! keeps two heaps — a min-heap of candidates to expand and a bounded
//! max-heap of current results — and terminates early once the nearest
//! remaining candidate is farther than the worst kept result.

use crate::error::{Error, Result};
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;
use crate::search::SearchResult;
use crate::store::VectorStore;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::collections::BinaryHeap;

thread_local! {
    /// Per-thread visited buffer for queries, so concurrent readers under a
    /// shared collection lock never contend on traversal state.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::default());
}

/// Expansion candidate: negated distance turns the std max-heap into a
/// min-heap.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    index: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance.cmp(&other.neg_distance)
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Kept result: max-heap by distance, so the top is the current worst.
#[derive(Debug, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    index: usize,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.cmp(&other.distance)
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Distance from the query to a slot; dead or missing slots score infinity
/// so they can never displace a real result.
#[inline]
fn dist_to(index: &HnswIndex, store: &VectorStore, query: &[f32], slot: usize) -> f32 {
    match store.get(slot) {
        Some(vector) => index.metric.distance(query, vector),
        None => f32::INFINITY,
    }
}

/// Best-first search of a single layer starting from `entry`.
///
/// Returns up to `ef` alive slots sorted ascending by distance. Empty when
/// the graph is empty, `ef == 0`, or the entry slot is dead.
pub(crate) fn search_level(
    index: &HnswIndex,
    store: &VectorStore,
    query: &[f32],
    entry: usize,
    level: i32,
    ef: usize,
    visited: &mut VisitedSet,
) -> Vec<SearchResult> {
    if !index.has_entry || ef == 0 {
        return Vec::new();
    }
    if !store.is_alive(entry) {
        return Vec::new();
    }

    visited.start(store.len());

    let entry_distance = dist_to(index, store, query, entry);

    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);

    candidates.push(Candidate {
        neg_distance: OrderedFloat(-entry_distance),
        index: entry,
    });
    results.push(ResultEntry {
        distance: OrderedFloat(entry_distance),
        index: entry,
    });
    visited.test_and_set(entry);

    while let Some(candidate) = candidates.pop() {
        let candidate_distance = -candidate.neg_distance.0;

        // no remaining candidate can improve the result set
        let worst = results.peek().map_or(f32::INFINITY, |r| r.distance.0);
        if candidate_distance > worst {
            break;
        }

        if index.node_level(candidate.index) < level {
            continue;
        }

        for &neighbor in &index.links[candidate.index][level as usize] {
            if !store.is_alive(neighbor) {
                continue;
            }
            if visited.test_and_set(neighbor) {
                continue;
            }

            let distance = dist_to(index, store, query, neighbor);

            if results.len() < ef {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-distance),
                    index: neighbor,
                });
                results.push(ResultEntry {
                    distance: OrderedFloat(distance),
                    index: neighbor,
                });
            } else if results.peek().is_some_and(|worst| distance < worst.distance.0) {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-distance),
                    index: neighbor,
                });
                results.push(ResultEntry {
                    distance: OrderedFloat(distance),
                    index: neighbor,
                });
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| SearchResult {
            index: r.index,
            distance: r.distance.0,
        })
        .collect()
}

/// Single-step descent: the nearest node to the query at `level`, reached
/// from `entry` with a beam of 1. Falls back to `entry` itself.
pub(crate) fn greedy_descent(
    index: &HnswIndex,
    store: &VectorStore,
    query: &[f32],
    entry: usize,
    level: i32,
    visited: &mut VisitedSet,
) -> usize {
    let results = search_level(index, store, query, entry, level, 1, visited);
    results.first().map_or(entry, |r| r.index)
}

impl HnswIndex {
    /// Approximate k-nearest-neighbor search.
    ///
    /// Funnels from the top layer down to layer 1 greedily, then runs a
    /// layer-0 beam of `max(ef_search, k)` and truncates to `k`. Results are
    /// ascending by distance.
    pub fn search(
        &self,
        store: &VectorStore,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<SearchResult>> {
        if query.len() != store.dim() {
            return Err(Error::DimensionMismatch {
                expected: store.dim(),
                got: query.len(),
            });
        }
        if !self.has_entry || k == 0 {
            return Ok(Vec::new());
        }

        SEARCH_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();

            let mut entry = self.entry_point;
            for level in (1..=self.max_level).rev() {
                entry = greedy_descent(self, store, query, entry, level, &mut visited);
            }

            let ef = ef_search.max(k);
            let mut results = search_level(self, store, query, entry, 0, ef, &mut visited);
            results.truncate(k);
            Ok(results)
        })
    }
}
