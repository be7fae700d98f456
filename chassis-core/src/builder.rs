//! Vamana-style incremental graph construction (spec §4.3).
//!
//! Each insert searches the graph as it currently stands, diversifies the
//! visited set into the new node's own neighbor list, then wires back-edges
//! into every chosen neighbor so the graph stays navigable in both
//! directions. Construction runs across a `rayon` thread pool: each insert
//! only touches the inserted node's own `NeighborSet` plus the `NeighborSet`
//! of each of its chosen neighbors, and `NeighborSet` serializes its own
//! mutations internally, so concurrent inserts need no outer lock.

use crate::error::{invalid_argument, Result};
use crate::graph::Graph;
use crate::bitset::AcceptOrds;
use crate::node_queue::Scored;
use crate::searcher::GraphSearcher;
use crate::vector_store::VectorStore;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Construction parameters (spec §4.7's suggested defaults).
#[derive(Debug, Clone, Copy)]
pub struct BuilderParams {
    /// Maximum out-degree per node (`M`).
    pub max_degree: usize,
    /// Candidate list size during construction search.
    pub beam_width: usize,
    /// RobustPrune relaxation factor; `>= 1.0`.
    pub alpha: f32,
    /// Overflow budget before a neighbor set triggers cleanup, as a
    /// multiple of `max_degree`.
    pub neighbor_overflow: f32,
    /// Recompute the entry point after every `entry_point_cadence` inserts
    /// (spec §9: "after every 2x growth or explicit request"). `0` disables
    /// the automatic cadence.
    pub entry_point_cadence: usize,
}

impl Default for BuilderParams {
    fn default() -> Self {
        Self {
            max_degree: 64,
            beam_width: 100,
            alpha: 1.2,
            neighbor_overflow: 1.3,
            entry_point_cadence: 0,
        }
    }
}

impl BuilderParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_degree == 0 {
            invalid_argument!("max_degree (M) must be > 0");
        }
        if self.beam_width == 0 {
            invalid_argument!("beam_width must be > 0");
        }
        if self.alpha < 1.0 {
            invalid_argument!("alpha must be >= 1.0, got {}", self.alpha);
        }
        Ok(())
    }
}

/// Incremental builder driving a [`Graph`] through the Vamana insert
/// algorithm. One instance per build; inserts may run concurrently from
/// multiple threads (see [`Builder::insert_all`]).
pub struct Builder {
    graph: Arc<Graph>,
    params: BuilderParams,
    inserts_since_recompute: AtomicUsize,
}

impl Builder {
    pub fn new(graph: Arc<Graph>, params: BuilderParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            graph,
            params,
            inserts_since_recompute: AtomicUsize::new(0),
        })
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Wire up edges for a single already-present node (its vector must
    /// already exist in the backing store at ordinal `i`, with an empty
    /// neighbor set allocated).
    ///
    /// 1. Greedy-search the graph from the entry point, excluding `i`
    ///    itself, retaining the full visited set as RobustPrune candidates.
    /// 2. `insertDiverse` those candidates (plus `i`'s current neighbors,
    ///    for re-insertion) into `i`'s own neighbor set.
    /// 3. For each chosen neighbor `j`, `insertNotDiverse(j -> i)`; if that
    ///    pushes `j` over its overflow budget, `cleanup(j)`.
    /// 4. Periodically recompute the entry point.
    pub fn insert_node(&self, i: u32) -> Result<()> {
        if self.graph.size() == 0 {
            invalid_argument!("cannot insert into a graph with no vectors; add the vector to the store first");
        }

        let store: &Arc<dyn VectorStore> = self.graph.store();
        let sim = self.graph.similarity();
        let query = store.vector_value(i as usize)?.to_vec();

        // Excluding `i` from the traversal means the first-ever insert (whose
        // entry point is itself) naturally visits nothing, with no special
        // case needed: seeding the search at `i` is a no-op under exclusion.
        let score_fn = {
            let store = Arc::clone(store);
            move |ord: u32| -> Result<f32> {
                let v = store.vector_value(ord as usize)?;
                Ok(sim.compare(&query, v))
            }
        };
        let mut searcher = GraphSearcher::new(&*self.graph, score_fn, AcceptOrds::All, Some(i));
        searcher.search(self.params.beam_width)?;
        let visited = searcher.all_visited().to_vec();

        let current_neighbors = self.graph.neighbors(i);
        let mut candidates: Vec<Scored> = visited;
        candidates.extend(current_neighbors.iter().copied());

        let neighbor_set = self.graph.neighbor_set(i);
        neighbor_set.insert_diverse(i, &candidates, self.params.alpha, &**store, sim)?;

        let chosen = neighbor_set.neighbors();
        for edge in chosen.iter() {
            let back_score = sim.compare_checked(
                store.vector_value(edge.ord as usize)?,
                store.vector_value(i as usize)?,
            )?;
            let j_set = self.graph.neighbor_set(edge.ord);
            let needs_cleanup = j_set.insert_not_diverse(i, back_score, self.params.neighbor_overflow);
            if needs_cleanup {
                j_set.cleanup(edge.ord, self.params.alpha, &**store, sim)?;
            }
        }

        if self.params.entry_point_cadence > 0 {
            let count = self.inserts_since_recompute.fetch_add(1, Ordering::AcqRel) + 1;
            if count >= self.params.entry_point_cadence {
                self.inserts_since_recompute.store(0, Ordering::Release);
                self.graph.recompute_entry_point()?;
            }
        }
        Ok(())
    }

    /// Insert every ordinal in `ordinals` concurrently across the `rayon`
    /// thread pool (spec §5: O(cores) concurrent insert).
    pub fn insert_all(&self, ordinals: &[u32]) -> Result<()> {
        ordinals
            .par_iter()
            .try_for_each(|&i| self.insert_node(i))
    }

    /// Run one more `cleanup` over every node's neighbor set.
    ///
    /// Back-edges installed via `insertNotDiverse` are visible through
    /// `neighbors()` the moment they land, and a node is cleaned up on the
    /// spot the first time a back-edge pushes it over `max_degree` (see the
    /// back-edge loop above) — so invariant 1 (`|neighbors(i)| <= M`) never
    /// depends on this pass. What `insertNotDiverse` does skip is the
    /// diversity check itself: a node whose incoming back-edges never
    /// crossed `max_degree` mid-build keeps those edges exactly as inserted,
    /// without ever running RobustPrune against each other. `finalize()` is
    /// a final quality pass that re-diversifies every node uniformly, not a
    /// correctness requirement.
    pub fn finalize(&self) -> Result<()> {
        let n = self.graph.size();
        let store: &Arc<dyn VectorStore> = self.graph.store();
        let sim = self.graph.similarity();
        (0..n as u32).into_par_iter().try_for_each(|i| {
            self.graph
                .neighbor_set(i)
                .cleanup(i, self.params.alpha, &**store, sim)
        })
    }

    /// Build a fresh graph from scratch over every vector already present
    /// in the store: seeds the entry point, inserts every remaining
    /// ordinal concurrently, then finalizes every node's neighbor set.
    pub fn build_all(graph: Arc<Graph>, params: BuilderParams) -> Result<Builder> {
        let builder = Builder::new(graph, params)?;
        let n = builder.graph.size();
        if n == 0 {
            return Ok(builder);
        }
        let entry = builder.graph.entry_point().unwrap_or(0);
        builder.insert_node(entry)?;
        let rest: Vec<u32> = (0..n as u32).filter(|&i| i != entry).collect();
        builder.insert_all(&rest)?;
        builder.finalize()?;
        builder.graph.recompute_entry_point()?;
        Ok(builder)
    }
}
