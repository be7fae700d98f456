//! Concurrent per-node neighbor set with diversity-preserving insert
//! (the RobustPrune algorithm) and bounded cardinality.
//!
//! A single `RwLock<Arc<[Scored]>>` holds the published edge list: readers
//! take `neighbors()` through a snapshot clone and never block, writers
//! (`insert_diverse`/`insert_not_diverse`/`cleanup`) hold the write side for
//! the whole read-modify-write so two concurrent mutations of the same
//! owner never race each other. `insertNotDiverse` writes straight into this
//! list (spec §4.2's literal "unconditionally inserts and, if over capacity,
//! evicts the lowest-scoring member") instead of staging into a side buffer,
//! so a back-edge is visible to every subsequent `neighbors()` call the
//! instant it lands, not just once a later `cleanup()` happens to run.

use crate::error::Result;
use crate::node_queue::Scored;
use crate::similarity::SimilarityFunction;
use crate::vector_store::VectorStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-node bag of outgoing edges. Every [`Scored`] stored here carries
/// `score = sim(ord, owner)` for this set's owner, so candidates never need
/// re-scoring against the owner once admitted.
pub struct NeighborSet {
    max_degree: usize,
    active: RwLock<Arc<[Scored]>>,
}

impl NeighborSet {
    pub fn new(max_degree: usize) -> Self {
        Self {
            max_degree,
            active: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Lock-free snapshot of the current (diversified) neighbor list.
    pub fn neighbors(&self) -> Arc<[Scored]> {
        self.active.read().clone()
    }

    pub fn len(&self) -> usize {
        self.active.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `insertDiverse`: combine `candidates` (already scored against this
    /// set's owner) with the current neighbors and recompute the diverse
    /// subset under `α`.
    pub fn insert_diverse(
        &self,
        owner: u32,
        candidates: &[Scored],
        alpha: f32,
        store: &dyn VectorStore,
        sim: SimilarityFunction,
    ) -> Result<()> {
        let mut active = self.active.write();
        let mut combined: Vec<Scored> = active.iter().copied().collect();
        combined.extend_from_slice(candidates);

        let diverse = robust_prune(owner, combined, alpha, self.max_degree, store, sim)?;
        *active = Arc::from(diverse);
        Ok(())
    }

    /// `insertNotDiverse`: cheap unconditional insert straight into the
    /// active list, evicting the lowest-scoring member if that pushes the
    /// list past `max_degree * neighbor_overflow` (the elevated cap this
    /// cheap path is allowed to hold between full diversify passes). Returns
    /// whether the active size now exceeds `max_degree`, signalling the
    /// caller should trigger a `cleanup()` to restore the true degree bound.
    pub fn insert_not_diverse(&self, n: u32, score: f32, neighbor_overflow: f32) -> bool {
        let mut active = self.active.write();
        if active.iter().any(|s| s.ord == n) {
            return false;
        }
        let mut combined: Vec<Scored> = active.iter().copied().collect();
        combined.push(Scored::new(n, score));

        let elevated_cap = (self.max_degree as f32 * neighbor_overflow).ceil() as usize;
        let elevated_cap = elevated_cap.max(self.max_degree);
        if combined.len() > elevated_cap {
            if let Some((idx, _)) = combined.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)) {
                combined.remove(idx);
            }
        }

        let needs_cleanup = combined.len() > self.max_degree;
        *active = Arc::from(combined);
        needs_cleanup
    }

    /// `cleanup`: re-run RobustPrune over the current active list, shrinking
    /// it back down to `max_degree` diverse members.
    pub fn cleanup(
        &self,
        owner: u32,
        alpha: f32,
        store: &dyn VectorStore,
        sim: SimilarityFunction,
    ) -> Result<()> {
        self.insert_diverse(owner, &[], alpha, store, sim)
    }
}

/// Remove duplicate ordinals, keeping the entry with the highest score.
fn dedupe_keep_max(candidates: Vec<Scored>) -> Vec<Scored> {
    let mut best: HashMap<u32, Scored> = HashMap::with_capacity(candidates.len());
    for c in candidates {
        best.entry(c.ord)
            .and_modify(|existing| {
                if c.score > existing.score {
                    *existing = c;
                }
            })
            .or_insert(c);
    }
    best.into_values().collect()
}

/// The RobustPrune diversity selection (spec §4.2).
///
/// `candidates` must each carry `score = sim(candidate, owner)`. Self-loops
/// are dropped, duplicates resolved by max score, ties broken by lower
/// ordinal (via [`Scored`]'s `Ord`).
pub fn robust_prune(
    owner: u32,
    candidates: Vec<Scored>,
    alpha: f32,
    max_degree: usize,
    store: &dyn VectorStore,
    sim: SimilarityFunction,
) -> Result<Vec<Scored>> {
    let mut candidates: Vec<Scored> = candidates.into_iter().filter(|c| c.ord != owner).collect();
    candidates = dedupe_keep_max(candidates);
    candidates.sort_by(|a, b| b.cmp(a));

    let mut admitted: Vec<Scored> = Vec::with_capacity(max_degree);
    for c in candidates {
        if admitted.len() >= max_degree {
            break;
        }
        let c_vec = store.vector_value(c.ord as usize)?;
        let mut diverse = true;
        for r in &admitted {
            let r_vec = store.vector_value(r.ord as usize)?;
            let sim_c_r = sim.compare_checked(c_vec, r_vec)?;
            if !(alpha * c.score > sim_c_r) {
                diverse = false;
                break;
            }
        }
        if diverse {
            admitted.push(c);
        }
    }
    Ok(admitted)
}
