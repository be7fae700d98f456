//! On-disk graph wire format (spec §4.6): fixed-size node records with the
//! vector inlined, no offset table — node `i` starts at
//! `HEADER_LEN + i * record_len(dimension, max_degree)`, so the reader gets
//! O(1) random access by arithmetic alone. Always big-endian, independent
//! of host architecture, for portability.
//!
//! Grounded in the teacher's `hnsw/graph.rs` fixed-record addressing
//! (`node_offset = graph_start + node_id * record_size`), generalized from
//! HNSW's multi-layer neighbor lists and host-endian `repr(C)` casts to this
//! format's single-layer layout with explicit big-endian encode/decode —
//! the endianness requirement rules out the teacher's zero-copy cast, so
//! every read here goes through `to_be_bytes`/`from_be_bytes` instead.

use super::cache::LruCache;
use crate::error::{corruption, invalid_argument, ChassisError, Result};
use crate::graph::{Graph, GraphView};
use crate::vector_store::VectorStore;
use memmap2::Mmap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// `int32 size, int32 dimension, int32 entryPoint, int32 maxDegree`.
pub const HEADER_LEN: usize = 16;

/// Minimum warm-cache capacity even for a graph too small to have two full
/// BFS layers from the entry point.
const MIN_CACHE_CAPACITY: usize = 64;

/// Bytes occupied by one node record: the vector, a neighbor count, and
/// `max_degree` neighbor slots (unused slots hold `-1`).
pub fn record_len(dimension: usize, max_degree: usize) -> usize {
    dimension * 4 + 4 + max_degree * 4
}

/// Serialize `graph` to `path` in the spec §4.6 wire format.
pub fn write_graph_to_path<P: AsRef<Path>>(graph: &Graph, path: P) -> Result<()> {
    let file = File::create(path).map_err(ChassisError::from)?;
    let mut w = BufWriter::new(file);
    write_graph(graph, &mut w)
}

/// Serialize `graph` into any `Write` sink, in the spec §4.6 wire format.
pub fn write_graph<W: Write>(graph: &Graph, w: &mut W) -> Result<()> {
    let size = graph.size();
    let dimension = graph.store().dimension();
    let max_degree = graph.max_degree();
    let entry_point = graph.entry_point().map_or(-1, |e| e as i32);

    w.write_all(&(size as i32).to_be_bytes())?;
    w.write_all(&(dimension as i32).to_be_bytes())?;
    w.write_all(&entry_point.to_be_bytes())?;
    w.write_all(&(max_degree as i32).to_be_bytes())?;

    for i in 0..size {
        let vector = graph.store().vector_value(i)?;
        for &x in vector {
            w.write_all(&x.to_be_bytes())?;
        }
        let neighbors = graph.neighbors(i as u32);
        w.write_all(&(neighbors.len() as i32).to_be_bytes())?;
        for slot in 0..max_degree {
            let ord = neighbors.get(slot).map_or(-1, |s| s.ord as i32);
            w.write_all(&ord.to_be_bytes())?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Read-only, mmap-backed reader for a graph file written by
/// [`write_graph_to_path`]. Endianness conversion means node data can't be
/// handed back as a zero-copy `&[f32]`, so unlike [`crate::vector_store`]
/// this does not implement the `VectorStore` contract — callers needing a
/// float vector use [`OnDiskGraph::vector`], which returns an owned
/// `Arc<[f32]>` decoded through the warm-node cache.
pub struct OnDiskGraph {
    mmap: Mmap,
    size: usize,
    dimension: usize,
    entry_point: Option<u32>,
    max_degree: usize,
    record_len: usize,
    cache: Mutex<LruCache>,
}

impl OnDiskGraph {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(ChassisError::from)?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(ChassisError::from)?;
        if mmap.len() < HEADER_LEN {
            corruption!("graph file too small for header: {} bytes", mmap.len());
        }

        let size_raw = i32::from_be_bytes(mmap[0..4].try_into().unwrap());
        let dimension_raw = i32::from_be_bytes(mmap[4..8].try_into().unwrap());
        let entry_point_raw = i32::from_be_bytes(mmap[8..12].try_into().unwrap());
        let max_degree_raw = i32::from_be_bytes(mmap[12..16].try_into().unwrap());

        if size_raw < 0 || dimension_raw <= 0 || max_degree_raw < 0 {
            corruption!(
                "graph header has an invalid field: size={}, dimension={}, max_degree={}",
                size_raw,
                dimension_raw,
                max_degree_raw
            );
        }
        let size = size_raw as usize;
        let dimension = dimension_raw as usize;
        let max_degree = max_degree_raw as usize;
        let entry_point = if entry_point_raw < 0 {
            None
        } else {
            Some(entry_point_raw as u32)
        };
        if let Some(ep) = entry_point {
            if ep as usize >= size {
                corruption!("entry point {} out of bounds for size {}", ep, size);
            }
        }

        let record_len = record_len(dimension, max_degree);
        let expected_len = HEADER_LEN + size * record_len;
        if mmap.len() != expected_len {
            corruption!(
                "graph file is {} bytes, header implies {} ({} nodes x {} bytes + {}-byte header)",
                mmap.len(),
                expected_len,
                size,
                record_len,
                HEADER_LEN
            );
        }

        let graph = Self {
            mmap,
            size,
            dimension,
            entry_point,
            max_degree,
            record_len,
            cache: Mutex::new(LruCache::new(0)),
        };
        let warm = graph.two_layer_bfs()?;
        *graph.cache.lock() = LruCache::new(warm.len().max(MIN_CACHE_CAPACITY));
        for ord in warm {
            graph.read_node(ord)?;
        }
        Ok(graph)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    /// The decoded vector for `ord`, served from the warm-node cache when
    /// present.
    pub fn vector(&self, ord: u32) -> Result<Arc<[f32]>> {
        Ok(self.read_node(ord)?.0)
    }

    fn node_offset(&self, ord: u32) -> usize {
        HEADER_LEN + ord as usize * self.record_len
    }

    fn read_node(&self, ord: u32) -> Result<(Arc<[f32]>, Arc<[u32]>)> {
        if ord as usize >= self.size {
            invalid_argument!("ordinal {} out of bounds (size {})", ord, self.size);
        }
        if let Some(cached) = self.cache.lock().get(ord) {
            return Ok(cached);
        }

        let offset = self.node_offset(ord);
        let record = &self.mmap[offset..offset + self.record_len];

        let mut vector = Vec::with_capacity(self.dimension);
        for chunk in record[..self.dimension * 4].chunks_exact(4) {
            vector.push(f32::from_be_bytes(chunk.try_into().unwrap()));
        }

        let count_offset = self.dimension * 4;
        let neighbor_count = i32::from_be_bytes(record[count_offset..count_offset + 4].try_into().unwrap());
        if neighbor_count < 0 || neighbor_count as usize > self.max_degree {
            corruption!(
                "node {} has neighbor count {}, exceeds max degree {}",
                ord,
                neighbor_count,
                self.max_degree
            );
        }

        let neighbor_start = count_offset + 4;
        let mut neighbors = Vec::with_capacity(neighbor_count as usize);
        for slot in 0..neighbor_count as usize {
            let start = neighbor_start + slot * 4;
            let n = i32::from_be_bytes(record[start..start + 4].try_into().unwrap());
            if n < 0 || n as usize >= self.size {
                corruption!("node {} has out-of-bounds neighbor ordinal {}", ord, n);
            }
            neighbors.push(n as u32);
        }

        let vector: Arc<[f32]> = Arc::from(vector);
        let neighbors: Arc<[u32]> = Arc::from(neighbors);
        self.cache.lock().insert(ord, vector.clone(), neighbors.clone());
        Ok((vector, neighbors))
    }

    /// Neighbor ordinals only, read straight from the mmap (bypassing the
    /// vector decode) — used both by [`GraphView::neighbor_ordinals`] and by
    /// [`two_layer_bfs`](Self::two_layer_bfs) to size the warm cache before
    /// it exists.
    fn read_neighbor_ordinals(&self, ord: u32) -> Result<Vec<u32>> {
        Ok(self.read_node(ord)?.1.to_vec())
    }

    /// BFS two layers out from the entry point, over raw mmap reads, to
    /// decide how many nodes the warm cache should hold (spec §4.6: "default
    /// covers the first two BFS layers from the entry point").
    fn two_layer_bfs(&self) -> Result<Vec<u32>> {
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        let mut seen = std::collections::HashSet::new();
        let mut frontier = VecDeque::new();
        seen.insert(entry);
        frontier.push_back((entry, 0u8));
        let mut order = vec![entry];

        while let Some((ord, depth)) = frontier.pop_front() {
            if depth >= 2 {
                continue;
            }
            for n in self.read_neighbor_ordinals_raw(ord)? {
                if seen.insert(n) {
                    order.push(n);
                    frontier.push_back((n, depth + 1));
                }
            }
        }
        Ok(order)
    }

    /// Like [`read_neighbor_ordinals`](Self::read_neighbor_ordinals) but
    /// never touches the cache — safe to call while the cache is still
    /// being sized during [`open`](Self::open).
    fn read_neighbor_ordinals_raw(&self, ord: u32) -> Result<Vec<u32>> {
        if ord as usize >= self.size {
            invalid_argument!("ordinal {} out of bounds (size {})", ord, self.size);
        }
        let offset = self.node_offset(ord);
        let record = &self.mmap[offset..offset + self.record_len];
        let count_offset = self.dimension * 4;
        let neighbor_count = i32::from_be_bytes(record[count_offset..count_offset + 4].try_into().unwrap());
        if neighbor_count < 0 || neighbor_count as usize > self.max_degree {
            corruption!(
                "node {} has neighbor count {}, exceeds max degree {}",
                ord,
                neighbor_count,
                self.max_degree
            );
        }
        let neighbor_start = count_offset + 4;
        let mut neighbors = Vec::with_capacity(neighbor_count as usize);
        for slot in 0..neighbor_count as usize {
            let start = neighbor_start + slot * 4;
            let n = i32::from_be_bytes(record[start..start + 4].try_into().unwrap());
            if n >= 0 {
                neighbors.push(n as u32);
            }
        }
        Ok(neighbors)
    }
}

impl GraphView for OnDiskGraph {
    fn size(&self) -> usize {
        self.size
    }

    fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    fn neighbor_ordinals(&self, ord: u32) -> Result<Vec<u32>> {
        self.read_neighbor_ordinals(ord)
    }
}
