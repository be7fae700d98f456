//! Resumable greedy best-first graph searcher.
//!
//! Exposed as a stateful object with `search`, `resume`, and `reset` —
//! never as a generator or coroutine (spec §9): the frontier state is
//! small and discrete, and callers want synchronous control.

use crate::bitset::{AcceptOrds, FixedBitSet};
use crate::error::Result;
use crate::graph::GraphView;
use crate::node_queue::{BoundedMaxHeap, Scored};
use std::collections::BinaryHeap;

/// Result of a `search`/`resume` call: the current top-`K` nodes ordered by
/// score descending, plus how many *new* nodes were visited in this call
/// (additive across a `search`/`resume` sequence).
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub nodes: Vec<Scored>,
    pub visited_count: usize,
}

/// A scoring function consumed by the searcher: ordinal → similarity
/// (approximate or exact).
pub trait ScoreFn {
    fn score(&self, ord: u32) -> Result<f32>;
}

impl<F: Fn(u32) -> Result<f32>> ScoreFn for F {
    fn score(&self, ord: u32) -> Result<f32> {
        self(ord)
    }
}

/// Stateful greedy best-first searcher over one graph view (either an
/// on-heap [`crate::graph::Graph`] mid-construction or an mmap-backed
/// on-disk reader).
pub struct GraphSearcher<'g, G: GraphView, S: ScoreFn> {
    graph: &'g G,
    score_fn: S,
    accept: AcceptOrds,
    exclude: Option<u32>,
    candidates: BinaryHeap<Scored>,
    results: BoundedMaxHeap,
    visited: FixedBitSet,
    /// Every node the search has scored so far, not just the top-K — the
    /// full visited set the graph builder needs for RobustPrune.
    all_visited: Vec<Scored>,
    visited_count_total: usize,
}

impl<'g, G: GraphView, S: ScoreFn> GraphSearcher<'g, G, S> {
    pub fn new(graph: &'g G, score_fn: S, accept: AcceptOrds, exclude: Option<u32>) -> Self {
        let size = graph.size();
        Self {
            graph,
            score_fn,
            accept,
            exclude,
            candidates: BinaryHeap::new(),
            results: BoundedMaxHeap::new(0),
            visited: FixedBitSet::new(size),
            all_visited: Vec::new(),
            visited_count_total: 0,
        }
    }

    /// Discard all frontier state (but keep the configured score function,
    /// accept filter, and exclusion).
    pub fn reset(&mut self) {
        self.candidates.clear();
        self.results = BoundedMaxHeap::new(0);
        self.visited.clear();
        self.all_visited.clear();
        self.visited_count_total = 0;
    }

    /// Every node visited so far (scored at least once), most recent last.
    pub fn all_visited(&self) -> &[Scored] {
        &self.all_visited
    }

    /// Fresh top-`k` search from the graph's entry point.
    pub fn search(&mut self, top_k: usize) -> Result<SearchOutcome> {
        self.reset();
        self.results = BoundedMaxHeap::new(top_k);
        self.seed()?;
        self.run()
    }

    /// Continue a prior `search`/`resume` call, growing the result bound
    /// by `additional_k` and returning the (now larger) current top set.
    pub fn resume(&mut self, additional_k: usize) -> Result<SearchOutcome> {
        let new_capacity = self.results.capacity() + additional_k;
        let mut grown = BoundedMaxHeap::new(new_capacity);
        for s in self.results.iter().copied() {
            grown.push(s);
        }
        self.results = grown;
        self.run()
    }

    fn seed(&mut self) -> Result<()> {
        if let Some(entry) = self.graph.entry_point() {
            self.visit(entry)?;
        }
        Ok(())
    }

    fn visit(&mut self, ord: u32) -> Result<()> {
        if Some(ord) == self.exclude {
            return Ok(());
        }
        if !self.visited.set(ord as usize) {
            return Ok(());
        }
        self.visited_count_total += 1;
        let score = self.score_fn.score(ord)?;
        let scored = Scored::new(ord, score);
        self.all_visited.push(scored);
        self.candidates.push(scored);
        if self.accept.accepts(ord as usize) {
            self.results.push(scored);
        }
        Ok(())
    }

    fn run(&mut self) -> Result<SearchOutcome> {
        let visited_before = self.visited_count_total;
        loop {
            let Some(current) = self.candidates.pop() else {
                break;
            };
            if self.results.len() >= self.results.capacity() {
                if let Some(worst) = self.results.worst() {
                    if current.score < worst {
                        // put it back conceptually: nothing left to improve via this frontier.
                        break;
                    }
                }
            }
            let neighbors = self.graph.neighbor_ordinals(current.ord)?;
            for ord in neighbors {
                if self.visited.get(ord as usize) {
                    continue;
                }
                self.visit(ord)?;
            }
        }
        let visited_count = self.visited_count_total - visited_before;
        let mut nodes: Vec<Scored> = self.results.iter().copied().collect();
        nodes.sort_by(|a, b| b.cmp(a));
        Ok(SearchOutcome { nodes, visited_count })
    }
}

/// Approximate-scoring search followed by exact rerank (spec §4.4).
///
/// Searches with `approx_score` expanding an over-sized candidate set of
/// `top_k * rerank_factor`, then rescores those candidates with
/// `exact_score` and returns the true top `top_k`.
pub fn search_with_rerank<G, A, E>(
    graph: &G,
    approx_score: A,
    exact_score: E,
    top_k: usize,
    rerank_factor: usize,
    accept: AcceptOrds,
) -> Result<SearchOutcome>
where
    G: GraphView,
    A: ScoreFn,
    E: Fn(u32, f32) -> Result<f32>,
{
    let expanded_k = top_k.saturating_mul(rerank_factor.max(1));
    let mut searcher = GraphSearcher::new(graph, approx_score, accept, None);
    let approx_outcome = searcher.search(expanded_k)?;

    let mut reranked: Vec<Scored> = approx_outcome
        .nodes
        .iter()
        .map(|s| Ok(Scored::new(s.ord, exact_score(s.ord, s.score)?)))
        .collect::<Result<Vec<_>>>()?;
    reranked.sort_by(|a, b| b.cmp(a));
    reranked.truncate(top_k);

    Ok(SearchOutcome {
        nodes: reranked,
        visited_count: approx_outcome.visited_count,
    })
}
