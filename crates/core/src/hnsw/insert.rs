//! HNSW insertion: level assignment, coarse-to-fine descent, neighbor
//! selection, and bidirectional degree-bounded edge maintenance.
//!
//! Edges are added to both endpoints and both endpoints are pruned back to
//! their degree bound afterwards, so a prune on one side may drop the return
//! edge. Search tolerates that asymmetry.

use crate::hnsw::graph::HnswIndex;
use crate::hnsw::search::{greedy_descent, search_level};
use crate::hnsw::visited::VisitedSet;
use crate::search::SearchResult;
use crate::store::VectorStore;
use std::cell::RefCell;

thread_local! {
    /// Per-thread visited buffer for construction, separate from the query
    /// buffer so a build never clobbers an in-flight search on this thread.
    static INSERT_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::default());
}

impl HnswIndex {
    /// Insert a store slot into the graph. Dead slots are silently skipped.
    ///
    /// The slot's own stored vector is the construction query: the entry
    /// point funnels down to the node's drawn level, then each layer from
    /// there to 0 is beam-searched with `ef_construction` and up to
    /// `max_degree(l)` neighbors are linked bidirectionally.
    pub fn insert(&mut self, store: &VectorStore, index: usize) {
        if !store.is_alive(index) {
            return;
        }

        self.ensure_node(index);

        let level = self.random_level();
        self.links[index].resize((level + 1) as usize, Vec::new());

        if !self.has_entry {
            self.entry_point = index;
            self.has_entry = true;
            self.max_level = level;
            return;
        }

        let Some(query) = store.get(index) else {
            return;
        };

        INSERT_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();

            let mut entry = self.entry_point;
            for l in ((level + 1)..=self.max_level).rev() {
                entry = greedy_descent(self, store, query, entry, l, &mut visited);
            }

            for l in (0..=level.min(self.max_level)).rev() {
                let mut candidates = search_level(
                    self,
                    store,
                    query,
                    entry,
                    l,
                    self.params.ef_construction,
                    &mut visited,
                );
                candidates.retain(|r| r.index != index);

                let m = self.max_degree(l);
                let chosen = if self.params.use_diversity {
                    self.select_neighbors_diverse(store, index, &candidates, m)
                } else {
                    select_neighbors_simple(&candidates, m)
                };

                for neighbor in chosen {
                    self.ensure_node(neighbor);
                    if self.node_level(neighbor) < l {
                        continue;
                    }
                    self.connect_bidirectional(store, index, neighbor, l);
                }

                if let Some(nearest) = candidates.first() {
                    entry = nearest.index;
                }
            }
        });

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = index;
        }
    }

    /// Diversity neighbor selection: accept a candidate only if it is at
    /// least as close to the base as to every already-selected neighbor,
    /// which spreads neighbors in direction instead of packing one local
    /// cluster. A fill pass tops the list back up to `m` so thin candidate
    /// pools keep their connectivity.
    fn select_neighbors_diverse(
        &self,
        store: &VectorStore,
        base: usize,
        candidates: &[SearchResult],
        m: usize,
    ) -> Vec<usize> {
        let mut selected: Vec<usize> = Vec::with_capacity(m.min(candidates.len()));

        if store.get(base).is_none() {
            return selected;
        }

        for candidate in candidates {
            if selected.len() >= m {
                break;
            }
            let c = candidate.index;
            if c == base {
                continue;
            }
            let Some(c_vector) = store.get(c) else {
                continue;
            };

            let dist_to_base = candidate.distance;
            let diverse = selected.iter().all(|&s| match store.get(s) {
                Some(s_vector) => self.metric.distance(c_vector, s_vector) >= dist_to_base,
                None => true,
            });

            if diverse {
                selected.push(c);
            }
        }

        if selected.len() < m {
            for candidate in candidates {
                if selected.len() >= m {
                    break;
                }
                let c = candidate.index;
                if c == base || !store.is_alive(c) || selected.contains(&c) {
                    continue;
                }
                selected.push(c);
            }
        }

        selected
    }

    /// Re-apply the degree bound at one layer of one node after an edge was
    /// added. Distances are recomputed from the node to each current
    /// neighbor and the configured selector keeps the best `max_degree(l)`.
    fn prune_neighbors(&mut self, store: &VectorStore, node: usize, level: i32) {
        if self.node_level(node) < level {
            return;
        }

        let m = self.max_degree(level);
        if self.links[node][level as usize].len() <= m {
            return;
        }

        let Some(base) = store.get(node) else {
            return;
        };

        let mut candidates: Vec<SearchResult> = self.links[node][level as usize]
            .iter()
            .filter_map(|&neighbor| {
                store.get(neighbor).map(|vector| SearchResult {
                    index: neighbor,
                    distance: self.metric.distance(base, vector),
                })
            })
            .collect();
        candidates.sort_unstable_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let kept = if self.params.use_diversity {
            self.select_neighbors_diverse(store, node, &candidates, m)
        } else {
            select_neighbors_simple(&candidates, m)
        };
        self.links[node][level as usize] = kept;
    }

    /// Add the undirected edge `(a, b)` at `level` and prune both endpoints.
    fn connect_bidirectional(&mut self, store: &VectorStore, a: usize, b: usize, level: i32) {
        if self.node_level(a) < level || self.node_level(b) < level {
            return;
        }

        self.links[a][level as usize].push(b);
        self.links[b][level as usize].push(a);

        self.prune_neighbors(store, a, level);
        self.prune_neighbors(store, b, level);
    }
}

/// Plain nearest-M selection from an ascending candidate list.
fn select_neighbors_simple(candidates: &[SearchResult], m: usize) -> Vec<usize> {
    candidates.iter().take(m).map(|r| r.index).collect()
}
