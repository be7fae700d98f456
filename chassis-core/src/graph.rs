//! On-heap graph: a collection of nodes with neighbor sets, entry-point
//! selection, and size bookkeeping.
//!
//! Nodes are arena-allocated records addressed by dense `u32` ordinal
//! indices, never by pointer (spec §9) — this makes the naturally cyclic
//! back-edge structure trivial to own and to serialize.

use crate::error::{invalid_argument, Result};
use crate::neighbor_set::NeighborSet;
use crate::node_queue::Scored;
use crate::similarity::{squared_euclidean, SimilarityFunction};
use crate::vector_store::VectorStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const NO_ENTRY_POINT: u64 = u64::MAX;

/// What the searcher needs from a graph, satisfied by both the on-heap
/// [`Graph`] built during construction and the mmap-backed on-disk reader —
/// lets [`crate::searcher::GraphSearcher`] traverse either without knowing
/// which one it has (spec §4.4/§4.6: "the searcher consumes a graph view").
pub trait GraphView: Send + Sync {
    fn size(&self) -> usize;
    fn entry_point(&self) -> Option<u32>;
    /// Outgoing edge ordinals of `ord`, in no particular order. Errors only
    /// on an out-of-bounds ordinal or (for the on-disk reader) I/O failure.
    fn neighbor_ordinals(&self, ord: u32) -> Result<Vec<u32>>;
}

impl GraphView for Graph {
    fn size(&self) -> usize {
        self.size()
    }

    fn entry_point(&self) -> Option<u32> {
        self.entry_point()
    }

    fn neighbor_ordinals(&self, ord: u32) -> Result<Vec<u32>> {
        Ok(self.neighbors(ord).iter().map(|s| s.ord).collect())
    }
}

/// Collection of nodes with neighbor sets, addressed by dense ordinal.
///
/// The vector store is assumed fully populated at construction (every
/// ordinal `0..store.size()` has a vector); the builder wires up edges for
/// each ordinal afterward, so a freshly constructed graph has `size()`
/// nodes, all with empty neighbor sets.
pub struct Graph {
    store: Arc<dyn VectorStore>,
    similarity: SimilarityFunction,
    max_degree: usize,
    nodes: RwLock<Vec<Arc<NeighborSet>>>,
    node_count: AtomicU64,
    entry_point: AtomicU64,
}

impl Graph {
    pub fn new(store: Arc<dyn VectorStore>, similarity: SimilarityFunction, max_degree: usize) -> Result<Self> {
        if max_degree == 0 {
            invalid_argument!("max_degree (M) must be > 0");
        }
        let size = store.size();
        let nodes = (0..size).map(|_| Arc::new(NeighborSet::new(max_degree))).collect();
        let graph = Self {
            store,
            similarity,
            max_degree,
            nodes: RwLock::new(nodes),
            node_count: AtomicU64::new(size as u64),
            entry_point: AtomicU64::new(NO_ENTRY_POINT),
        };
        if size > 0 {
            graph.recompute_entry_point()?;
        }
        Ok(graph)
    }

    pub fn size(&self) -> usize {
        self.node_count.load(Ordering::Acquire) as usize
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn similarity(&self) -> SimilarityFunction {
        self.similarity
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn entry_point(&self) -> Option<u32> {
        let ep = self.entry_point.load(Ordering::Acquire);
        if ep == NO_ENTRY_POINT {
            None
        } else {
            Some(ep as u32)
        }
    }

    pub fn set_entry_point(&self, ord: u32) {
        self.entry_point.store(ord as u64, Ordering::Release);
    }

    /// Reserve a new ordinal and give it an empty neighbor set. Assumes the
    /// caller has already appended the matching vector to the backing
    /// store at the same index (spec §5: node count and vector store
    /// expansion share a single writer lock; this is that lock).
    pub fn add_node(&self) -> u32 {
        let mut nodes = self.nodes.write();
        let ord = nodes.len();
        nodes.push(Arc::new(NeighborSet::new(self.max_degree)));
        self.node_count.store(nodes.len() as u64, Ordering::Release);
        ord as u32
    }

    pub fn neighbor_set(&self, ord: u32) -> Arc<NeighborSet> {
        self.nodes.read()[ord as usize].clone()
    }

    pub fn neighbors(&self, ord: u32) -> Arc<[Scored]> {
        self.neighbor_set(ord).neighbors()
    }

    /// Recompute the entry point as the node closest to the centroid of
    /// every inserted vector (spec §3). Exact and linear in `size() *
    /// dimension` — no sampling approximation is needed since, unlike a
    /// true (sum-of-pairwise-distances) medoid, distance-to-centroid is
    /// cheap at any corpus size.
    pub fn recompute_entry_point(&self) -> Result<()> {
        let n = self.size();
        if n == 0 {
            return Ok(());
        }
        let dim = self.store.dimension();
        let mut centroid = vec![0.0_f32; dim];
        for i in 0..n {
            let v = self.store.vector_value(i)?;
            for (c, x) in centroid.iter_mut().zip(v) {
                *c += x;
            }
        }
        let inv = 1.0 / n as f32;
        for c in centroid.iter_mut() {
            *c *= inv;
        }

        let mut best_ord = 0usize;
        let mut best_dist = f32::INFINITY;
        for i in 0..n {
            let v = self.store.vector_value(i)?;
            let d = squared_euclidean(&centroid, v);
            if d < best_dist {
                best_dist = d;
                best_ord = i;
            }
        }
        self.set_entry_point(best_ord as u32);
        Ok(())
    }

    /// Check the structural invariants spec §8 requires to hold whenever
    /// the builder quiesces: bounded degree, in-bounds edges, no
    /// self-loops, no duplicate neighbors.
    pub fn check_invariants(&self) -> Result<()> {
        let n = self.size();
        for i in 0..n as u32 {
            let neighbors = self.neighbors(i);
            if neighbors.len() > self.max_degree {
                invalid_argument!("node {} has {} neighbors, exceeds M={}", i, neighbors.len(), self.max_degree);
            }
            let mut seen = std::collections::HashSet::new();
            for edge in neighbors.iter() {
                if edge.ord == i {
                    invalid_argument!("node {} has a self-loop", i);
                }
                if edge.ord >= n as u32 {
                    invalid_argument!("node {} has out-of-bounds edge to {}", i, edge.ord);
                }
                if !seen.insert(edge.ord) {
                    invalid_argument!("node {} has duplicate edge to {}", i, edge.ord);
                }
            }
        }
        Ok(())
    }
}
