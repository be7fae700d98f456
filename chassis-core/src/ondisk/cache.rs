//! LRU cache of warm nodes for the on-disk graph reader (spec §4.6).
//!
//! Keyed by ordinal, holding the already-decoded `(vector, neighbor
//! ordinals)` pair so a cache hit skips both the mmap read and the
//! big-endian conversion. Recency is tracked with a plain `Vec<u32>` rather
//! than an intrusive linked list: cache sizes here are small by design
//! (two BFS layers from the entry point), so an O(n) scan-and-move on every
//! touch is cheaper in practice than the bookkeeping an O(1) structure
//! would need, and far simpler to get right.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct CacheEntry {
    vector: Arc<[f32]>,
    neighbors: Arc<[u32]>,
}

pub struct LruCache {
    capacity: usize,
    entries: HashMap<u32, CacheEntry>,
    /// Least-recently-used at the front, most-recently-used at the back.
    order: Vec<u32>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, ord: u32) {
        if let Some(pos) = self.order.iter().position(|&o| o == ord) {
            self.order.remove(pos);
        }
        self.order.push(ord);
    }

    pub fn get(&mut self, ord: u32) -> Option<(Arc<[f32]>, Arc<[u32]>)> {
        let entry = self.entries.get(&ord)?.clone();
        self.touch(ord);
        Some((entry.vector, entry.neighbors))
    }

    pub fn insert(&mut self, ord: u32, vector: Arc<[f32]>, neighbors: Arc<[u32]>) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&ord) && self.entries.len() >= self.capacity && !self.order.is_empty() {
            let evict = self.order.remove(0);
            self.entries.remove(&evict);
        }
        self.entries.insert(ord, CacheEntry { vector, neighbors });
        self.touch(ord);
    }
}
